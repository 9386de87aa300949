/*
 * mod.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Traghetto, an HTTP to Gemini gateway.
 *
 * Traghetto is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Traghetto is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Traghetto.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Certificate trust: the persistent TOFU store for server certificates,
//! the in-memory store of client identities (minted and configured), and
//! self-signed leaf minting.

pub mod identity;
pub mod mint;
pub mod tofu;

pub use identity::{ClientIdentity, IdentityStore};
pub use mint::{mint_identity, KeyKind};
pub use tofu::{PinOutcome, TofuStore};
