/*
 * mint.rs
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

//! Self-signed leaf minting for transient client identities.
//!
//! Keys are ed25519 unless RSA-2048 is requested. The subject CN and O
//! carry the user-chosen display name (or a random 8-digit number). The
//! NotBefore instant is backdated by a random 1-100 days so minted
//! certificates do not all begin at the moment of first contact; NotAfter
//! is the configured lifetime. Gemini servers do not chain-validate, so
//! the leaf is its own trust root and no CA bit is set.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Utc};
use rand::Rng;
use rcgen::{CertificateParams, DistinguishedName, DnType, ExtendedKeyUsagePurpose, KeyPair, KeyUsagePurpose};
use rsa::pkcs8::EncodePrivateKey;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use url::Url;

use crate::certs::identity::{path_segments, ClientIdentity};
use crate::error::GemError;
use crate::geminiurl;

/// Key algorithm for minted identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Ed25519,
    Rsa2048,
}

fn generate_key(kind: KeyKind) -> Result<KeyPair, GemError> {
    match kind {
        KeyKind::Ed25519 => KeyPair::generate_for(&rcgen::PKCS_ED25519)
            .map_err(|e| GemError::Certificate(format!("ed25519 key generation failed: {}", e))),
        KeyKind::Rsa2048 => {
            let key = rsa::RsaPrivateKey::new(&mut rand::rngs::OsRng, 2048)
                .map_err(|e| GemError::Certificate(format!("RSA key generation failed: {}", e)))?;
            let der = key
                .to_pkcs8_der()
                .map_err(|e| GemError::Certificate(format!("RSA key encoding failed: {}", e)))?;
            KeyPair::try_from(der.as_bytes())
                .map_err(|e| GemError::Certificate(format!("RSA key not usable: {}", e)))
        }
    }
}

/// Mint a self-signed identity for `u`, valid for `hours` from now.
/// `bind_host` is added to the SANs alongside `localhost`.
pub fn mint_identity(
    u: &Url,
    display_name: &str,
    hours: u32,
    kind: KeyKind,
    bind_host: &str,
) -> Result<ClientIdentity, GemError> {
    let mut rng = rand::thread_rng();

    let name = if display_name.trim().is_empty() {
        rng.gen_range(10_000_000u32..100_000_000).to_string()
    } else {
        display_name.trim().to_string()
    };

    let key_pair = generate_key(kind)?;

    let mut san = vec!["localhost".to_string()];
    if !bind_host.is_empty() && bind_host != "localhost" {
        san.push(bind_host.to_string());
    }
    let mut params = CertificateParams::new(san)
        .map_err(|e| GemError::Certificate(format!("bad certificate names: {}", e)))?;

    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, name.clone());
    dn.push(DnType::OrganizationName, name.clone());
    params.distinguished_name = dn;

    let backdate_days: i64 = rng.gen_range(1..=100);
    let now = time::OffsetDateTime::now_utc();
    params.not_before = now - time::Duration::days(backdate_days);
    params.not_after = now + time::Duration::hours(i64::from(hours));

    params.key_usages = vec![KeyUsagePurpose::DigitalSignature];
    if kind == KeyKind::Rsa2048 {
        params.key_usages.push(KeyUsagePurpose::KeyEncipherment);
    }
    params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ClientAuth];

    let cert = params
        .self_signed(&key_pair)
        .map_err(|e| GemError::Certificate(format!("certificate generation failed: {}", e)))?;

    let chain = vec![cert.der().clone().into_owned()];
    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key_pair.serialize_der()));
    let expires = Utc::now() + chrono::Duration::hours(i64::from(hours));

    tracing::info!(url = %u, cert = %name, hours, "minted transient client identity");

    Ok(ClientIdentity {
        url: u.to_string(),
        host: geminiurl::authority(u),
        path_segments: path_segments(u.path()),
        cert_name: name,
        expires,
        chain,
        key,
    })
}

fn pem_block(label: &str, der: &[u8]) -> String {
    let encoded = BASE64.encode(der);
    let mut out = format!("-----BEGIN {}-----\n", label);
    for chunk in encoded.as_bytes().chunks(64) {
        out.push_str(std::str::from_utf8(chunk).unwrap_or_default());
        out.push('\n');
    }
    out.push_str(&format!("-----END {}-----\n", label));
    out
}

/// PEM-encode a certificate chain, leaf first.
pub fn chain_to_pem(chain: &[CertificateDer<'_>]) -> String {
    chain
        .iter()
        .map(|cert| pem_block("CERTIFICATE", cert.as_ref()))
        .collect()
}

/// PEM-encode a PKCS#8 private key.
pub fn key_to_pem(key: &PrivateKeyDer<'_>) -> String {
    pem_block("PRIVATE KEY", key.secret_der())
}

/// NotAfter for display on the confirmation page.
pub fn lifetime_end(hours: u32) -> DateTime<Utc> {
    Utc::now() + chrono::Duration::hours(i64::from(hours))
}
