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

//! Gemini response headers and status dispatch.
//!
//! A response header is `<STATUS><SP><META><CR><LF>`: a 2-digit status
//! and up to 1024 bytes of META whose meaning depends on the status
//! class. The CRLF must appear within the first 1030 bytes of the
//! response or the header is malformed.

mod client;

pub use client::{Fetched, GeminiBody, GeminiClient, Outcome};

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::GemError;

/// Maximum bytes scanned for the header CRLF.
pub const MAX_HEADER_BYTES: usize = 1030;

/// Maximum META length in bytes.
pub const MAX_META_BYTES: usize = 1024;

/// Parsed response header: two-digit status plus META.
#[derive(Debug, Clone)]
pub struct ResponseHeader {
    pub status: u8,
    pub meta: String,
}

impl ResponseHeader {
    /// The first digit of the status: 1 input, 2 success, 3 redirect,
    /// 4 temporary failure, 5 permanent failure, 6 client certificate.
    pub fn class(&self) -> u8 {
        self.status / 10
    }
}

/// How a successful (2x) body should be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    /// text/gemini: run through the HTML transcoder.
    Gemtext,
    /// Other text/*: escaped, preformatted.
    PlainText,
    /// Everything else: raw bytes, delivered as a download.
    Attachment,
}

/// Classify a 2x META. An empty META means text/gemini.
pub fn classify_meta(meta: &str) -> BodyKind {
    let meta = meta.trim();
    if meta.is_empty() || meta.contains("text/gemini") {
        BodyKind::Gemtext
    } else if meta.starts_with("text/") {
        BodyKind::PlainText
    } else {
        BodyKind::Attachment
    }
}

/// Read and validate the response header. Reads byte-at-a-time so no
/// body bytes are consumed past the CRLF.
pub async fn read_header<S>(stream: &mut S) -> Result<ResponseHeader, GemError>
where
    S: AsyncRead + Unpin,
{
    let mut buf: Vec<u8> = Vec::with_capacity(128);
    loop {
        let mut byte = [0u8; 1];
        let n = stream.read(&mut byte).await.map_err(GemError::from)?;
        if n == 0 {
            return Err(GemError::malformed("connection closed before header"));
        }
        buf.push(byte[0]);
        if buf.len() >= 2 && buf[buf.len() - 2..] == *b"\r\n" {
            break;
        }
        if buf.len() > MAX_HEADER_BYTES {
            return Err(GemError::malformed(format!(
                "no CRLF within the first {} bytes",
                MAX_HEADER_BYTES
            )));
        }
    }

    let line = &buf[..buf.len() - 2];
    if line.len() < 3
        || !line[0].is_ascii_digit()
        || !line[1].is_ascii_digit()
        || line[2] != b' '
    {
        return Err(GemError::malformed(format!(
            "status line: {}",
            String::from_utf8_lossy(line)
        )));
    }

    let status = (line[0] - b'0') * 10 + (line[1] - b'0');
    let meta_bytes = &line[3..];
    if meta_bytes.len() > MAX_META_BYTES {
        return Err(GemError::malformed("META exceeds 1024 bytes"));
    }
    let meta = String::from_utf8_lossy(meta_bytes).into_owned();

    Ok(ResponseHeader { status, meta })
}

/// Write the request line `<url>\r\n`.
pub async fn write_request<S>(stream: &mut S, wire_url: &str) -> io::Result<()>
where
    S: tokio::io::AsyncWrite + Unpin,
{
    use tokio::io::AsyncWriteExt;
    stream.write_all(wire_url.as_bytes()).await?;
    stream.write_all(b"\r\n").await?;
    stream.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    async fn parse(bytes: &[u8]) -> Result<ResponseHeader, GemError> {
        let mut cursor = Cursor::new(bytes.to_vec());
        read_header(&mut cursor).await
    }

    #[tokio::test]
    async fn parses_success_header() {
        let h = parse(b"20 text/gemini; charset=utf-8\r\nbody").await.unwrap();
        assert_eq!(h.status, 20);
        assert_eq!(h.class(), 2);
        assert_eq!(h.meta, "text/gemini; charset=utf-8");
    }

    #[tokio::test]
    async fn parses_empty_meta() {
        let h = parse(b"51 \r\n").await.unwrap();
        assert_eq!(h.status, 51);
        assert_eq!(h.meta, "");
    }

    #[tokio::test]
    async fn rejects_missing_space() {
        assert!(parse(b"20\r\n").await.is_err());
        assert!(parse(b"20text/gemini\r\n").await.is_err());
    }

    #[tokio::test]
    async fn rejects_non_digit_status() {
        assert!(parse(b"2x text/gemini\r\n").await.is_err());
        assert!(parse(b"hello world\r\n").await.is_err());
    }

    #[tokio::test]
    async fn rejects_header_without_crlf_in_bound() {
        let mut long = vec![b'a'; 2000];
        long.extend_from_slice(b"\r\n");
        let err = parse(&long).await.unwrap_err();
        assert!(matches!(err, GemError::MalformedHeader(_)));
    }

    #[tokio::test]
    async fn meta_at_limit_is_accepted() {
        let mut bytes = b"20 ".to_vec();
        bytes.extend(std::iter::repeat(b'm').take(MAX_META_BYTES));
        bytes.extend_from_slice(b"\r\n");
        let h = parse(&bytes).await.unwrap();
        assert_eq!(h.meta.len(), MAX_META_BYTES);
    }

    #[tokio::test]
    async fn rejects_truncated_header() {
        assert!(parse(b"20 text/gemini").await.is_err());
    }

    #[test]
    fn meta_classification() {
        assert_eq!(classify_meta("text/gemini"), BodyKind::Gemtext);
        assert_eq!(classify_meta("text/gemini; lang=en"), BodyKind::Gemtext);
        assert_eq!(classify_meta(""), BodyKind::Gemtext);
        assert_eq!(classify_meta("text/plain"), BodyKind::PlainText);
        assert_eq!(classify_meta("image/png"), BodyKind::Attachment);
        assert_eq!(classify_meta("application/pdf"), BodyKind::Attachment);
    }
}
