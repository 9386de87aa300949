/*
 * geminiurl.rs
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

//! Gemini request URLs: RFC 3986 reference resolution, the on-wire form
//! (userinfo and fragment stripped, 1024-byte cap), authority strings for
//! pinning, and the percent-encoding used for gateway links and queries.
//! Gemini queries never use `+` for space, so a literal `+` is encoded as
//! `%2B` (Gemini spec 1.2).

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use url::Url;

use crate::error::GemError;

/// Default Gemini port.
pub const DEFAULT_PORT: u16 = 1965;

/// Maximum request URL length on the wire, in bytes.
pub const MAX_REQUEST_BYTES: usize = 1024;

/// Encode everything except unreserved characters. Space becomes `%20`
/// (never `+`) and a literal `+` becomes `%2B`, which is what both gateway
/// link hrefs and Gemini query strings need.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Parse an absolute URL.
pub fn parse_absolute(s: &str) -> Result<Url, GemError> {
    Url::parse(s).map_err(|e| GemError::Url(format!("{}: {}", s, e)))
}

/// Resolve a reference against a base URL (RFC 3986 section 5.3).
/// An already-absolute reference resolves to itself.
pub fn resolve(base: &Url, reference: &str) -> Result<Url, GemError> {
    base.join(reference)
        .map_err(|e| GemError::Url(format!("{}: {}", reference, e)))
}

/// The URL as sent on the wire: userinfo and fragment stripped, path and
/// query untouched. Errors if the result exceeds 1024 bytes.
pub fn wire_format(u: &Url) -> Result<String, GemError> {
    let mut wire = u.clone();
    wire.set_fragment(None);
    let _ = wire.set_username("");
    let _ = wire.set_password(None);
    let s = wire.to_string();
    if s.len() > MAX_REQUEST_BYTES {
        return Err(GemError::Url(format!(
            "request URL exceeds {} bytes",
            MAX_REQUEST_BYTES
        )));
    }
    Ok(s)
}

/// Authority string used to key server-certificate pins: the host, plus
/// `:port` when the port is explicit and non-default.
pub fn authority(u: &Url) -> String {
    let host = u.host_str().unwrap_or_default();
    match u.port() {
        Some(p) if p != DEFAULT_PORT => format!("{}:{}", host, p),
        _ => host.to_string(),
    }
}

/// Gateway href that re-enters the proxy: `/?url=<percent-encoded>`.
pub fn proxy_href(u: &Url) -> String {
    format!("/?url={}", encode_component(u.as_str()))
}

/// Percent-encode a value for use in a query string or href.
pub fn encode_component(s: &str) -> String {
    utf8_percent_encode(s, COMPONENT).to_string()
}

/// Encode user input as a Gemini query string. Space is `%20` and a
/// literal `+` is `%2B`; the result is attached verbatim to the URL.
pub fn encode_query(input: &str) -> String {
    encode_component(input)
}

/// File name for attachment delivery: the last non-empty path segment,
/// falling back to the host.
pub fn file_name(u: &Url) -> String {
    u.path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).next_back())
        .map(str::to_string)
        .unwrap_or_else(|| u.host_str().unwrap_or("download").to_string())
}
