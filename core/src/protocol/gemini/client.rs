/*
 * client.rs
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

//! Async Gemini client: TLS dial through the TOFU verifier, request
//! framing, header parse, and status dispatch. One connection serves
//! exactly one request; the connection closes when the returned body is
//! consumed or dropped.
//!
//! Redirects are not followed here: a 3x header returns
//! `Outcome::Redirect` with the resolved target and the caller re-invokes
//! `fetch` up to its hop budget.

use std::io;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use url::Url;

use super::{classify_meta, read_header, write_request, BodyKind};
use crate::certs::{IdentityStore, PinOutcome, TofuStore};
use crate::error::GemError;
use crate::gemtext::{escape_html, HtmlStream};
use crate::geminiurl;
use crate::net::GeminiStream;

/// Result of one protocol exchange, before any body is consumed.
#[derive(Debug)]
pub enum Outcome {
    /// 2x: the body follows. `meta` is the MIME type.
    Success { meta: String, body: GeminiBody },
    /// 3x: the server redirected to the resolved URL. No body.
    Redirect(Url),
    /// 1x: the server wants user input. `sensitive` for status 11.
    Input { prompt: String, sensitive: bool },
    /// 60: a client certificate is required.
    CertRequired,
    /// 4x, 5x, 61-69, or an unknown status class.
    Failure { status: u8, meta: String },
}

/// A completed exchange: the URL it was served from, the TOFU warning if
/// the server's certificate changed, and the protocol outcome.
#[derive(Debug)]
pub struct Fetched {
    pub url: Url,
    pub warning: Option<String>,
    pub outcome: Outcome,
}

/// Gemini protocol client. Holds handles to the two trust stores; cheap
/// to clone.
#[derive(Clone)]
pub struct GeminiClient {
    tofu: Arc<TofuStore>,
    identities: Arc<IdentityStore>,
}

impl GeminiClient {
    pub fn new(tofu: Arc<TofuStore>, identities: Arc<IdentityStore>) -> Self {
        Self { tofu, identities }
    }

    /// Perform one request. Dials `host:port` (default 1965), presents a
    /// matching client identity when one exists, pins or checks the
    /// server certificate, sends the request line, and parses the header.
    pub async fn fetch(&self, url: &Url) -> Result<Fetched, GemError> {
        if url.scheme() != "gemini" {
            return Err(GemError::Url(format!(
                "refusing to proxy scheme '{}'",
                url.scheme()
            )));
        }
        let host = url
            .host_str()
            .ok_or_else(|| GemError::Url(format!("no host in {}", url)))?
            .to_string();
        let port = url.port().unwrap_or(geminiurl::DEFAULT_PORT);
        let wire = geminiurl::wire_format(url)?;

        let identity = self.identities.best_match(url).await;
        let mut stream = GeminiStream::connect(&host, port, identity)
            .await
            .map_err(|e| GemError::transport(format!("{}: {}", url, e)))?;

        let warning = match stream.peer_leaf() {
            Some(leaf) => {
                match self
                    .tofu
                    .verify_or_pin(&geminiurl::authority(url), &leaf)
                    .await
                {
                    PinOutcome::Trusted => None,
                    PinOutcome::Changed(warning) => {
                        tracing::warn!(url = %url, "server certificate changed");
                        Some(warning)
                    }
                }
            }
            None => None,
        };

        tracing::debug!(url = %wire, "sending request");
        write_request(&mut stream, &wire).await?;
        let header = read_header(&mut stream).await?;
        tracing::debug!(status = header.status, meta = %header.meta, "response header");

        let outcome = match header.class() {
            1 => Outcome::Input {
                prompt: header.meta,
                sensitive: header.status == 11,
            },
            2 => Outcome::Success {
                meta: header.meta,
                body: GeminiBody {
                    reader: BufReader::new(stream),
                },
            },
            3 => {
                // Relative targets and targets missing scheme or host
                // inherit them from the request URL.
                let target = geminiurl::resolve(url, header.meta.trim())?;
                Outcome::Redirect(target)
            }
            6 if header.status == 60 => Outcome::CertRequired,
            _ => Outcome::Failure {
                status: header.status,
                meta: header.meta,
            },
        };

        Ok(Fetched {
            url: url.clone(),
            warning,
            outcome,
        })
    }
}

/// The body of a 2x response. Dropping it closes the connection.
pub struct GeminiBody {
    reader: BufReader<GeminiStream>,
}

impl std::fmt::Debug for GeminiBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiBody").finish_non_exhaustive()
    }
}

impl GeminiBody {
    /// How this body should be delivered for the given META.
    pub fn kind(meta: &str) -> BodyKind {
        classify_meta(meta)
    }

    /// Read the next line, without its terminator. `None` at end of
    /// stream. Invalid UTF-8 is replaced, never fatal.
    async fn next_line(&mut self, buf: &mut Vec<u8>) -> io::Result<Option<String>> {
        buf.clear();
        let n = self.reader.read_until(b'\n', buf).await?;
        if n == 0 {
            return Ok(None);
        }
        if buf.last() == Some(&b'\n') {
            buf.pop();
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }
        }
        Ok(Some(String::from_utf8_lossy(buf).into_owned()))
    }

    /// Stream the body through the gemtext transcoder, writing HTML
    /// fragments to `out` as each line arrives.
    pub async fn stream_html<W>(mut self, base: &Url, out: &mut W) -> io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let mut transcoder = HtmlStream::new(base.clone());
        let mut buf = Vec::with_capacity(1024);
        let mut html = String::new();
        while let Some(line) = self.next_line(&mut buf).await? {
            html.clear();
            transcoder.push(&line, &mut html);
            out.write_all(html.as_bytes()).await?;
        }
        html.clear();
        transcoder.finish(&mut html);
        out.write_all(html.as_bytes()).await?;
        out.flush().await?;
        Ok(())
    }

    /// Stream the body as escaped preformatted text (text/* other than
    /// gemtext, and the source view of gemtext pages).
    pub async fn stream_preformatted<W>(mut self, out: &mut W) -> io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        out.write_all(b"<pre>\n").await?;
        let mut buf = Vec::with_capacity(1024);
        while let Some(line) = self.next_line(&mut buf).await? {
            out.write_all(escape_html(&line).as_bytes()).await?;
            out.write_all(b"\n").await?;
        }
        out.write_all(b"</pre>\n").await?;
        out.flush().await?;
        Ok(())
    }

    /// Copy the raw body (attachment delivery). Returns the byte count.
    pub async fn copy_raw<W>(mut self, out: &mut W) -> io::Result<u64>
    where
        W: AsyncWrite + Unpin,
    {
        let n = tokio::io::copy(&mut self.reader, out).await?;
        out.flush().await?;
        Ok(n)
    }
}
