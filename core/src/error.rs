/*
 * error.rs
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

//! Gateway and protocol errors.

use std::fmt;
use std::io;

/// Errors from the Gemini client, the trust stores, or URL handling.
#[derive(Debug)]
pub enum GemError {
    /// DNS, TCP, or TLS failure while reaching the origin server.
    Transport(String),
    /// The response header violated the protocol (no CRLF within 1030
    /// bytes, bad status shape, or oversized META).
    MalformedHeader(String),
    /// A URL supplied by the user or by a redirect could not be parsed.
    Url(String),
    /// No client identity matched the URL given for deletion.
    NotFound(String),
    /// Certificate generation or loading failed.
    Certificate(String),
}

impl GemError {
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedHeader(msg.into())
    }
}

impl fmt::Display for GemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GemError::Transport(m) => write!(f, "could not connect: {}", m),
            GemError::MalformedHeader(m) => write!(f, "malformed response header: {}", m),
            GemError::Url(m) => write!(f, "bad URL: {}", m),
            GemError::NotFound(m) => write!(f, "{}", m),
            GemError::Certificate(m) => write!(f, "certificate error: {}", m),
        }
    }
}

impl std::error::Error for GemError {}

impl From<io::Error> for GemError {
    fn from(e: io::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

impl From<url::ParseError> for GemError {
    fn from(e: url::ParseError) -> Self {
        Self::Url(e.to_string())
    }
}
