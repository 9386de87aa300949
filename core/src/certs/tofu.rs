/*
 * tofu.rs
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

//! Trust-on-first-use store for Gemini server certificates.
//!
//! The first certificate seen for a host is pinned. A later certificate
//! that differs replaces the pin and produces a warning for the rendered
//! page; it never fails the handshake (the Gemini community norm is
//! warn-on-change, not hard-pin). At most one pin per host.
//!
//! File format, one record per line:
//! `<host> <expires-RFC3339> <base64 cert-DER>`. Lines with fewer than
//! three fields or an unparseable timestamp are skipped silently. A
//! background task rewrites the file every ~10 minutes while the store is
//! dirty, and once more at shutdown; expired pins are dropped at flush.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, SecondsFormat, Utc};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use x509_parser::parse_x509_certificate;

/// Interval between flush checks.
const FLUSH_INTERVAL: Duration = Duration::from_secs(600);

/// One pinned server certificate.
#[derive(Debug, Clone)]
pub struct ServerCertPin {
    pub host: String,
    pub expires: DateTime<Utc>,
    /// Base64 of the leaf certificate DER.
    pub cert: String,
}

/// Result of checking a presented leaf against the store.
#[derive(Debug)]
pub enum PinOutcome {
    /// First sight (now pinned) or a match with the existing pin.
    Trusted,
    /// The certificate changed; the pin was replaced. Carries the warning
    /// text to surface in the rendered page.
    Changed(String),
}

/// Server-certificate pin store. Many concurrent readers, exclusive
/// writers; the lock is never held across network I/O.
pub struct TofuStore {
    pins: RwLock<HashMap<String, ServerCertPin>>,
    dirty: AtomicBool,
    trust_all: bool,
    path: Option<PathBuf>,
}

impl TofuStore {
    /// `path` is the backing file (`None` keeps the store memory-only);
    /// `trust_all` disables pinning entirely.
    pub fn new(path: Option<PathBuf>, trust_all: bool) -> Self {
        Self {
            pins: RwLock::new(HashMap::new()),
            dirty: AtomicBool::new(false),
            trust_all,
            path,
        }
    }

    /// Load pins from the backing file. Missing file is not an error.
    pub async fn load(&self) -> io::Result<usize> {
        let Some(path) = &self.path else {
            return Ok(0);
        };
        let content = match tokio::fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };
        let mut pins = self.pins.write().await;
        let mut loaded = 0;
        for line in content.lines() {
            let mut fields = line.split_whitespace();
            let (Some(host), Some(expires), Some(cert)) =
                (fields.next(), fields.next(), fields.next())
            else {
                continue;
            };
            let Ok(expires) = DateTime::parse_from_rfc3339(expires) else {
                continue;
            };
            pins.insert(
                host.to_string(),
                ServerCertPin {
                    host: host.to_string(),
                    expires: expires.with_timezone(&Utc),
                    cert: cert.to_string(),
                },
            );
            loaded += 1;
        }
        Ok(loaded)
    }

    /// Check the leaf certificate presented by `host` against the pin
    /// store, pinning it on first sight and replacing it on change.
    pub async fn verify_or_pin(&self, host: &str, leaf_der: &[u8]) -> PinOutcome {
        if self.trust_all {
            return PinOutcome::Trusted;
        }

        let expires = match parse_x509_certificate(leaf_der) {
            Ok((_, cert)) => {
                let ts = cert.validity().not_after.timestamp();
                DateTime::from_timestamp(ts, 0).unwrap_or_else(Utc::now)
            }
            Err(e) => {
                tracing::warn!(host, error = %e, "server leaf certificate did not parse; not pinning");
                return PinOutcome::Trusted;
            }
        };
        let encoded = BASE64.encode(leaf_der);

        let mut pins = self.pins.write().await;
        match pins.entry(host.to_string()) {
            Entry::Occupied(mut entry) => {
                let pin = entry.get_mut();
                if pin.cert == encoded {
                    return PinOutcome::Trusted;
                }
                let warning = format!(
                    "The TLS certificate {} sent does not match the certificate it sent \
                     last time, which was set to expire on {}. However, we will proceed \
                     with the request, and trust the new certificate in the future.",
                    host,
                    pin.expires.to_rfc3339_opts(SecondsFormat::Secs, true)
                );
                pin.cert = encoded;
                pin.expires = expires;
                self.dirty.store(true, Ordering::SeqCst);
                PinOutcome::Changed(warning)
            }
            Entry::Vacant(entry) => {
                entry.insert(ServerCertPin {
                    host: host.to_string(),
                    expires,
                    cert: encoded,
                });
                self.dirty.store(true, Ordering::SeqCst);
                PinOutcome::Trusted
            }
        }
    }

    /// The pin currently held for a host, if any.
    pub async fn pin_for(&self, host: &str) -> Option<ServerCertPin> {
        self.pins.read().await.get(host).cloned()
    }

    pub async fn len(&self) -> usize {
        self.pins.read().await.len()
    }

    /// Write the store to its backing file: evict expired pins, snapshot
    /// under the lock, then write a temp file and rename it into place.
    pub async fn flush(&self) -> io::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let snapshot: Vec<ServerCertPin> = {
            let now = Utc::now();
            let mut pins = self.pins.write().await;
            pins.retain(|_, pin| pin.expires > now);
            self.dirty.store(false, Ordering::SeqCst);
            let mut pins: Vec<_> = pins.values().cloned().collect();
            pins.sort_by(|a, b| a.host.cmp(&b.host));
            pins
        };

        let mut content = String::new();
        for pin in &snapshot {
            content.push_str(&pin.host);
            content.push(' ');
            content.push_str(&pin.expires.to_rfc3339_opts(SecondsFormat::Secs, true));
            content.push(' ');
            content.push_str(&pin.cert);
            content.push('\n');
        }

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, path).await?;
        tracing::debug!(pins = snapshot.len(), path = %path.display(), "flushed TOFU store");
        Ok(())
    }

    /// Background flusher: rewrite the file whenever the store has been
    /// marked dirty, every ten minutes, and once at shutdown.
    pub async fn run_flusher(self: Arc<Self>, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(FLUSH_INTERVAL) => {}
                _ = shutdown.cancelled() => {
                    if let Err(e) = self.flush().await {
                        tracing::warn!(error = %e, "final TOFU flush failed");
                    }
                    return;
                }
            }
            if self.dirty.load(Ordering::SeqCst) {
                if let Err(e) = self.flush().await {
                    tracing::warn!(error = %e, "TOFU flush failed");
                }
            }
        }
    }
}
