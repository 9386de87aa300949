/*
 * identity.rs
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

//! Client certificate identities: transient (minted on demand) and
//! persistent (loaded from a configuration file). The store is an
//! append-ordered list; it never deduplicates, and a lookup scores each
//! identity by host equality plus index-aligned path-segment overlap.
//! The first identity reaching the highest score wins ties. Expired
//! identities are filtered on match and removed by an hourly sweep.

use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::sync::RwLock;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_util::sync::CancellationToken;
use url::Url;
use x509_parser::parse_x509_certificate;

use crate::error::GemError;
use crate::geminiurl;

/// Interval between expiry sweeps.
const SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

/// One client identity: certificate chain, private key, and the URL scope
/// it was created for.
pub struct ClientIdentity {
    /// Origin URL the identity is scoped to.
    pub url: String,
    /// Authority the identity applies to.
    pub host: String,
    /// Path split on `/`, used for best-match scoring.
    pub path_segments: Vec<String>,
    /// Subject common name of the leaf.
    pub cert_name: String,
    /// Leaf NotAfter.
    pub expires: DateTime<Utc>,
    /// Full certificate chain, leaf first.
    pub chain: Vec<CertificateDer<'static>>,
    /// Private key for the leaf.
    pub key: PrivateKeyDer<'static>,
}

/// Metadata row for the settings page.
#[derive(Debug, Clone)]
pub struct IdentitySummary {
    pub url: String,
    pub cert_name: String,
    pub expires: DateTime<Utc>,
}

/// Record shape of the persistent identity file: a JSON array of these.
#[derive(Deserialize)]
struct PersistentRecord {
    url: String,
    cert_pem: String,
    key_pem: String,
}

/// Split a URL path the way scoring expects: on `/`, keeping the leading
/// empty segment so that two absolute paths align by index.
pub fn path_segments(path: &str) -> Vec<String> {
    path.split('/').map(str::to_string).collect()
}

/// Score an identity against a request path: 1 for the host match plus
/// one per index-aligned equal segment.
fn score(request: &[String], candidate: &[String]) -> usize {
    1 + request
        .iter()
        .zip(candidate.iter())
        .take_while(|(a, b)| a == b)
        .count()
}

/// In-memory store of client identities.
pub struct IdentityStore {
    identities: RwLock<Vec<ClientIdentity>>,
}

impl Default for IdentityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityStore {
    pub fn new() -> Self {
        Self {
            identities: RwLock::new(Vec::new()),
        }
    }

    /// Append an identity. Most recently saved identities shadow older
    /// ones only by scoring higher; ties keep the earlier entry.
    pub async fn insert(&self, identity: ClientIdentity) {
        self.identities.write().await.push(identity);
    }

    /// Index of the best-scoring unexpired identity for `u`, under an
    /// already-held lock.
    fn best_index(identities: &[ClientIdentity], u: &Url, now: DateTime<Utc>) -> Option<usize> {
        let host = geminiurl::authority(u);
        let request = path_segments(u.path());
        let mut best: Option<(usize, usize)> = None;
        for (i, identity) in identities.iter().enumerate() {
            if identity.host != host || identity.expires <= now {
                continue;
            }
            let s = score(&request, &identity.path_segments);
            if best.map_or(true, |(_, bs)| s > bs) {
                best = Some((i, s));
            }
        }
        best.map(|(i, _)| i)
    }

    /// The certificate chain and key to present for `u`, if any identity
    /// matches its host.
    pub async fn best_match(
        &self,
        u: &Url,
    ) -> Option<(Vec<CertificateDer<'static>>, PrivateKeyDer<'static>)> {
        let identities = self.identities.read().await;
        let i = Self::best_index(&identities, u, Utc::now())?;
        let identity = &identities[i];
        tracing::debug!(url = %u, cert = %identity.cert_name, "matched client identity");
        Some((identity.chain.clone(), identity.key.clone_key()))
    }

    /// Remove the identity that best matches `u`.
    pub async fn delete(&self, u: &Url) -> Result<(), GemError> {
        let mut identities = self.identities.write().await;
        match Self::best_index(&identities, u, Utc::now()) {
            Some(i) => {
                let removed = identities.remove(i);
                tracing::info!(url = %removed.url, "deleted client identity");
                Ok(())
            }
            None => Err(GemError::NotFound(format!(
                "no certificate found matching URL '{}'",
                u
            ))),
        }
    }

    /// Drop identities whose leaf has expired. Returns (removed, kept).
    pub async fn sweep_expired(&self) -> (usize, usize) {
        let now = Utc::now();
        let mut identities = self.identities.write().await;
        let before = identities.len();
        identities.retain(|identity| identity.expires > now);
        (before - identities.len(), identities.len())
    }

    /// Load persistent identities from a JSON file of
    /// `{url, cert_pem, key_pem}` records. Invalid records are logged and
    /// skipped; only an unreadable file is an error.
    pub async fn load_persistent(&self, path: &Path) -> Result<usize, GemError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| GemError::Certificate(format!("{}: {}", path.display(), e)))?;
        let records: Vec<PersistentRecord> = serde_json::from_str(&content)
            .map_err(|e| GemError::Certificate(format!("{}: {}", path.display(), e)))?;

        let mut loaded = 0;
        for record in records {
            match identity_from_record(&record) {
                Ok(identity) => {
                    self.insert(identity).await;
                    loaded += 1;
                }
                Err(e) => {
                    tracing::warn!(url = %record.url, error = %e, "skipping persistent identity");
                }
            }
        }
        Ok(loaded)
    }

    pub async fn list(&self) -> Vec<IdentitySummary> {
        self.identities
            .read()
            .await
            .iter()
            .map(|identity| IdentitySummary {
                url: identity.url.clone(),
                cert_name: identity.cert_name.clone(),
                expires: identity.expires,
            })
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.identities.read().await.len()
    }

    /// Background sweeper: drop expired identities once an hour.
    pub async fn run_sweeper(self: Arc<Self>, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(SWEEP_INTERVAL) => {}
                _ = shutdown.cancelled() => return,
            }
            let (removed, kept) = self.sweep_expired().await;
            tracing::info!(removed, kept, "swept expired client identities");
        }
    }
}

/// Build an identity out of one persistent record.
fn identity_from_record(record: &PersistentRecord) -> Result<ClientIdentity, GemError> {
    let u = geminiurl::parse_absolute(&record.url)?;

    let chain: Vec<CertificateDer<'static>> =
        rustls_pemfile::certs(&mut record.cert_pem.as_bytes())
            .collect::<Result<_, io::Error>>()
            .map_err(|e| GemError::Certificate(format!("bad cert_pem: {}", e)))?;
    if chain.is_empty() {
        return Err(GemError::Certificate("cert_pem holds no certificate".into()));
    }
    let key = rustls_pemfile::private_key(&mut record.key_pem.as_bytes())
        .map_err(|e| GemError::Certificate(format!("bad key_pem: {}", e)))?
        .ok_or_else(|| GemError::Certificate("key_pem holds no private key".into()))?;

    let (expires, cert_name) = leaf_details(chain[0].as_ref())?;

    Ok(ClientIdentity {
        url: u.to_string(),
        host: geminiurl::authority(&u),
        path_segments: path_segments(u.path()),
        cert_name,
        expires,
        chain,
        key,
    })
}

/// NotAfter and subject common name of a leaf certificate.
pub fn leaf_details(der: &[u8]) -> Result<(DateTime<Utc>, String), GemError> {
    let (_, cert) = parse_x509_certificate(der)
        .map_err(|e| GemError::Certificate(format!("leaf did not parse: {}", e)))?;
    let expires = DateTime::from_timestamp(cert.validity().not_after.timestamp(), 0)
        .ok_or_else(|| GemError::Certificate("leaf NotAfter out of range".into()))?;
    let cert_name = cert
        .subject()
        .iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .unwrap_or_default()
        .to_string();
    Ok((expires, cert_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certs::mint::{mint_identity, KeyKind};

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    async fn store_with(urls: &[&str]) -> IdentityStore {
        let store = IdentityStore::new();
        for u in urls {
            let identity =
                mint_identity(&url(u), &format!("id-{}", u), 24, KeyKind::Ed25519, "127.0.0.1")
                    .unwrap();
            store.insert(identity).await;
        }
        store
    }

    #[tokio::test]
    async fn longest_path_overlap_wins() {
        let store = store_with(&[
            "gemini://example.org/",
            "gemini://example.org/users/alice",
            "gemini://example.org/users",
        ])
        .await;

        let (chain, _) = store
            .best_match(&url("gemini://example.org/users/alice/posts"))
            .await
            .unwrap();
        let (expires, name) = leaf_details(chain[0].as_ref()).unwrap();
        assert!(expires > Utc::now());
        assert_eq!(name, "id-gemini://example.org/users/alice");
    }

    #[tokio::test]
    async fn ties_keep_the_first_inserted() {
        let store = store_with(&["gemini://example.org/a", "gemini://example.org/b"]).await;
        // Request path matches neither /a nor /b beyond the leading
        // empty segment, so both score the same; the first wins.
        let (chain, _) = store
            .best_match(&url("gemini://example.org/c"))
            .await
            .unwrap();
        let (_, name) = leaf_details(chain[0].as_ref()).unwrap();
        assert_eq!(name, "id-gemini://example.org/a");
    }

    #[tokio::test]
    async fn host_must_match() {
        let store = store_with(&["gemini://example.org/"]).await;
        assert!(store.best_match(&url("gemini://other.org/")).await.is_none());
        // Port is part of the authority.
        assert!(store
            .best_match(&url("gemini://example.org:1966/"))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn delete_removes_the_best_match() {
        let store = store_with(&[
            "gemini://example.org/keep",
            "gemini://example.org/gone/deep",
        ])
        .await;
        store
            .delete(&url("gemini://example.org/gone/deep"))
            .await
            .unwrap();
        assert_eq!(store.len().await, 1);
        let (chain, _) = store
            .best_match(&url("gemini://example.org/gone/deep"))
            .await
            .unwrap();
        let (_, name) = leaf_details(chain[0].as_ref()).unwrap();
        assert_eq!(name, "id-gemini://example.org/keep");
    }

    #[tokio::test]
    async fn delete_without_match_is_not_found() {
        let store = store_with(&["gemini://example.org/"]).await;
        let err = store.delete(&url("gemini://other.org/")).await.unwrap_err();
        assert!(matches!(err, GemError::NotFound(_)));
    }

    #[tokio::test]
    async fn expired_identities_are_filtered_and_swept() {
        let store = IdentityStore::new();
        let mut expired =
            mint_identity(&url("gemini://example.org/"), "old", 24, KeyKind::Ed25519, "127.0.0.1")
                .unwrap();
        expired.expires = Utc::now() - chrono::Duration::hours(1);
        store.insert(expired).await;

        assert!(store.best_match(&url("gemini://example.org/")).await.is_none());
        let (removed, kept) = store.sweep_expired().await;
        assert_eq!((removed, kept), (1, 0));
    }

    #[tokio::test]
    async fn persistent_file_skips_invalid_records() {
        let minted = mint_identity(
            &url("gemini://example.org/app"),
            "loaded",
            24,
            KeyKind::Ed25519,
            "127.0.0.1",
        )
        .unwrap();
        let cert_pem = crate::certs::mint::chain_to_pem(&minted.chain);
        let key_pem = crate::certs::mint::key_to_pem(&minted.key);

        let json = serde_json::json!([
            { "url": "gemini://example.org/app", "cert_pem": cert_pem.clone(), "key_pem": key_pem.clone() },
            { "url": "not a url", "cert_pem": cert_pem, "key_pem": key_pem },
            { "url": "gemini://x/", "cert_pem": "garbage", "key_pem": "garbage" },
        ]);
        let path = std::env::temp_dir().join(format!(
            "traghetto-identities-{}.json",
            std::process::id()
        ));
        tokio::fs::write(&path, json.to_string()).await.unwrap();

        let store = IdentityStore::new();
        let loaded = store.load_persistent(&path).await.unwrap();
        assert_eq!(loaded, 1);
        assert_eq!(store.len().await, 1);
        let summaries = store.list().await;
        assert_eq!(summaries[0].cert_name, "loaded");
        let _ = tokio::fs::remove_file(&path).await;
    }
}
