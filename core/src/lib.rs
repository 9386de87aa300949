/*
 * lib.rs
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

//! Traghetto core: the Gemini protocol client, the TOFU server-certificate
//! store, the client-identity store and minting, and the streaming
//! gemtext-to-HTML transcoder. The HTTP side of the gateway lives in the
//! `traghetto` binary crate; everything here is plain protocol machinery
//! with constructor-injected collaborators.

pub mod certs;
pub mod error;
pub mod geminiurl;
pub mod gemtext;
pub mod net;
pub mod protocol;

pub use error::GemError;
