/*
 * gemini_integration.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * Integration tests for the Gemini client. A scripted Gemini server runs
 * in-process on loopback TLS (self-signed certificate), so the full dial
 * path is exercised: TOFU pinning, request framing, header parsing,
 * status dispatch, client-certificate presentation, and body streaming.
 *
 * Run with:
 *   cargo test -p traghetto-core --test gemini_integration
 */

use std::net::SocketAddr;
use std::sync::Arc;

use rcgen::{CertificateParams, KeyPair};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_rustls::rustls;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer, UnixTime};
use tokio_rustls::rustls::server::danger::{ClientCertVerified, ClientCertVerifier};
use tokio_rustls::rustls::{DigitallySignedStruct, DistinguishedName, SignatureScheme};
use tokio_rustls::TlsAcceptor;
use traghetto_core::certs::{mint_identity, IdentityStore, KeyKind, TofuStore};
use traghetto_core::protocol::gemini::{GeminiClient, Outcome};
use url::Url;

/// Self-signed server certificate for loopback.
fn server_cert() -> (Vec<CertificateDer<'static>>, PrivateKeyDer<'static>) {
    let key = KeyPair::generate_for(&rcgen::PKCS_ED25519).unwrap();
    let mut params =
        CertificateParams::new(vec!["localhost".to_string(), "127.0.0.1".to_string()]).unwrap();
    params.not_after = time::OffsetDateTime::now_utc() + time::Duration::days(1);
    let cert = params.self_signed(&key).unwrap();
    (
        vec![cert.der().clone().into_owned()],
        PrivateKeyDer::Pkcs8(key.serialize_der().into()),
    )
}

/// Client certificate verifier that accepts anything presented; Gemini
/// identities are self-signed, so there is no chain to validate.
#[derive(Debug)]
struct AcceptAnyClient;

impl ClientCertVerifier for AcceptAnyClient {
    fn offer_client_auth(&self) -> bool {
        true
    }

    fn client_auth_mandatory(&self) -> bool {
        false
    }

    fn root_hint_subjects(&self) -> &[DistinguishedName] {
        &[]
    }

    fn verify_client_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _now: UnixTime,
    ) -> Result<ClientCertVerified, rustls::Error> {
        Ok(ClientCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        use SignatureScheme::*;
        vec![
            RSA_PKCS1_SHA256,
            ECDSA_NISTP256_SHA256,
            RSA_PSS_SHA256,
            ED25519,
        ]
    }
}

fn server_config(request_client_cert: bool) -> Arc<rustls::ServerConfig> {
    let (chain, key) = server_cert();
    let builder = rustls::ServerConfig::builder();
    let config = if request_client_cert {
        builder
            .with_client_cert_verifier(Arc::new(AcceptAnyClient))
            .with_single_cert(chain, key)
            .unwrap()
    } else {
        builder.with_no_client_auth().with_single_cert(chain, key).unwrap()
    };
    Arc::new(config)
}

type Reply = Box<dyn Fn(usize, &str, bool) -> Vec<u8> + Send + Sync>;

/// Scripted server: connection `i` handshakes with `configs[min(i, last)]`
/// and answers with `reply(i, request_line, client_cert_present)`.
async fn spawn_server(configs: Vec<Arc<rustls::ServerConfig>>, reply: Reply) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut index = 0usize;
        loop {
            let Ok((tcp, _)) = listener.accept().await else {
                break;
            };
            let config = configs[index.min(configs.len() - 1)].clone();
            let acceptor = TlsAcceptor::from(config);
            let Ok(mut tls) = acceptor.accept(tcp).await else {
                index += 1;
                continue;
            };
            let mut line = Vec::new();
            loop {
                let mut byte = [0u8; 1];
                match tls.read(&mut byte).await {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {
                        line.push(byte[0]);
                        if line.ends_with(b"\r\n") {
                            break;
                        }
                    }
                }
            }
            let request = String::from_utf8_lossy(&line).trim_end().to_string();
            let has_cert = tls.get_ref().1.peer_certificates().is_some();
            let response = reply(index, &request, has_cert);
            let _ = tls.write_all(&response).await;
            let _ = tls.shutdown().await;
            index += 1;
        }
    });
    addr
}

fn client() -> (GeminiClient, Arc<TofuStore>, Arc<IdentityStore>) {
    let tofu = Arc::new(TofuStore::new(None, false));
    let identities = Arc::new(IdentityStore::new());
    (
        GeminiClient::new(tofu.clone(), identities.clone()),
        tofu,
        identities,
    )
}

fn url_for(addr: SocketAddr, path: &str) -> Url {
    Url::parse(&format!("gemini://127.0.0.1:{}{}", addr.port(), path)).unwrap()
}

#[tokio::test]
async fn gemtext_success_streams_html() {
    let addr = spawn_server(
        vec![server_config(false)],
        Box::new(|_, _, _| {
            b"20 text/gemini\r\n# Title\n=> gemini://x/ hi\n* a\n* b\n".to_vec()
        }),
    )
    .await;

    let (client, _, _) = client();
    let url = url_for(addr, "/");
    let fetched = client.fetch(&url).await.unwrap();
    assert!(fetched.warning.is_none());

    let Outcome::Success { meta, body } = fetched.outcome else {
        panic!("expected success");
    };
    assert_eq!(meta, "text/gemini");

    let mut out: Vec<u8> = Vec::new();
    body.stream_html(&url, &mut out).await.unwrap();
    let html = String::from_utf8(out).unwrap();

    assert!(html.contains("<h1>Title</h1>"));
    assert!(html.contains("<a href=\"/?url=gemini%3A%2F%2Fx%2F\">hi</a>"));
    assert!(html.contains("<li>a</li>"));
    assert!(html.contains("<li>b</li>"));
    assert!(html.trim_end().ends_with("</ul>"));
}

#[tokio::test]
async fn request_line_never_carries_fragment_or_userinfo() {
    let addr = spawn_server(
        vec![server_config(false)],
        Box::new(|_, request, _| {
            format!("20 text/gemini\r\n{}\n", request).into_bytes()
        }),
    )
    .await;

    let (client, _, _) = client();
    let url = Url::parse(&format!(
        "gemini://user:pw@127.0.0.1:{}/page?q=1#section",
        addr.port()
    ))
    .unwrap();
    let fetched = client.fetch(&url).await.unwrap();
    let Outcome::Success { body, .. } = fetched.outcome else {
        panic!("expected success");
    };
    let mut out: Vec<u8> = Vec::new();
    body.stream_preformatted(&mut out).await.unwrap();
    let echoed = String::from_utf8(out).unwrap();
    assert!(echoed.contains("/page?q=1"));
    assert!(!echoed.contains('#'));
    assert!(!echoed.contains("user"));
    assert!(!echoed.contains("pw@"));
}

#[tokio::test]
async fn redirect_returns_target_and_second_fetch_succeeds() {
    let addr = spawn_server(
        vec![server_config(false)],
        Box::new(|index, request, _| {
            if index == 0 {
                let target = request.replace("/start", "/moved");
                format!("31 {}\r\n", target).into_bytes()
            } else {
                assert!(request.ends_with("/moved"));
                b"20 text/gemini\r\nredirected ok\n".to_vec()
            }
        }),
    )
    .await;

    let (client, _, _) = client();
    let fetched = client.fetch(&url_for(addr, "/start")).await.unwrap();
    let Outcome::Redirect(next) = fetched.outcome else {
        panic!("expected redirect");
    };
    assert_eq!(next, url_for(addr, "/moved"));

    let fetched = client.fetch(&next).await.unwrap();
    let Outcome::Success { body, .. } = fetched.outcome else {
        panic!("expected success after one hop");
    };
    let mut out: Vec<u8> = Vec::new();
    body.stream_html(&next, &mut out).await.unwrap();
    assert!(String::from_utf8(out).unwrap().contains("redirected ok"));
}

#[tokio::test]
async fn relative_redirect_inherits_scheme_and_host() {
    let addr = spawn_server(
        vec![server_config(false)],
        Box::new(|_, _, _| b"30 /elsewhere\r\n".to_vec()),
    )
    .await;

    let (client, _, _) = client();
    let fetched = client.fetch(&url_for(addr, "/start")).await.unwrap();
    let Outcome::Redirect(next) = fetched.outcome else {
        panic!("expected redirect");
    };
    assert_eq!(next, url_for(addr, "/elsewhere"));
}

#[tokio::test]
async fn redirect_loop_exhausts_caller_budget() {
    let addr = spawn_server(
        vec![server_config(false)],
        Box::new(|_, request, _| format!("30 {}\r\n", request).into_bytes()),
    )
    .await;

    let (client, _, _) = client();
    let max_redirects = 5;
    let mut current = url_for(addr, "/");
    let mut hops = 0;
    // The gateway's loop: re-invoke on redirect up to the budget.
    for _ in 0..=max_redirects {
        let fetched = client.fetch(&current).await.unwrap();
        match fetched.outcome {
            Outcome::Redirect(next) => {
                hops += 1;
                current = next;
            }
            _ => panic!("server should always redirect"),
        }
    }
    assert_eq!(hops, max_redirects + 1);
    assert_eq!(current, url_for(addr, "/"));
}

#[tokio::test]
async fn certificate_change_warns_once_then_trusts() {
    // First connection presents one certificate, later connections a
    // different one: warn on the change, then accept the new pin.
    let addr = spawn_server(
        vec![
            server_config(false),
            server_config(false),
        ],
        Box::new(|_, _, _| b"20 text/gemini\r\nok\n".to_vec()),
    )
    .await;

    let (client, tofu, _) = client();
    let url = url_for(addr, "/");

    let first = client.fetch(&url).await.unwrap();
    assert!(first.warning.is_none());
    assert_eq!(tofu.len().await, 1);

    let second = client.fetch(&url).await.unwrap();
    let warning = second.warning.expect("certificate change should warn");
    assert!(warning.contains(&format!("127.0.0.1:{}", addr.port())));

    let third = client.fetch(&url).await.unwrap();
    assert!(third.warning.is_none());
}

#[tokio::test]
async fn cert_required_then_minted_identity_is_presented() {
    let addr = spawn_server(
        vec![server_config(true)],
        Box::new(|_, _, has_cert| {
            if has_cert {
                b"20 text/gemini\r\nwelcome\n".to_vec()
            } else {
                b"60 need cert\r\n".to_vec()
            }
        }),
    )
    .await;

    let (client, _, identities) = client();
    let url = url_for(addr, "/private/area");

    let fetched = client.fetch(&url).await.unwrap();
    assert!(matches!(fetched.outcome, Outcome::CertRequired));

    // The gateway's confirmation flow: mint, store, retry.
    let identity = mint_identity(&url, "me", 72, KeyKind::Ed25519, "127.0.0.1").unwrap();
    identities.insert(identity).await;

    let fetched = client.fetch(&url).await.unwrap();
    let Outcome::Success { body, .. } = fetched.outcome else {
        panic!("expected success with client certificate");
    };
    let mut out: Vec<u8> = Vec::new();
    body.stream_html(&url, &mut out).await.unwrap();
    assert!(String::from_utf8(out).unwrap().contains("welcome"));
}

#[tokio::test]
async fn input_and_failure_statuses_dispatch() {
    let addr = spawn_server(
        vec![server_config(false)],
        Box::new(|index, _, _| match index {
            0 => b"10 Search terms\r\n".to_vec(),
            1 => b"11 Passphrase\r\n".to_vec(),
            2 => b"51 Not found\r\n".to_vec(),
            _ => b"61 Certificate not authorised\r\n".to_vec(),
        }),
    )
    .await;

    let (client, _, _) = client();
    let url = url_for(addr, "/");

    match client.fetch(&url).await.unwrap().outcome {
        Outcome::Input { prompt, sensitive } => {
            assert_eq!(prompt, "Search terms");
            assert!(!sensitive);
        }
        _ => panic!("expected input"),
    }
    match client.fetch(&url).await.unwrap().outcome {
        Outcome::Input { sensitive, .. } => assert!(sensitive),
        _ => panic!("expected sensitive input"),
    }
    match client.fetch(&url).await.unwrap().outcome {
        Outcome::Failure { status, meta } => {
            assert_eq!(status, 51);
            assert_eq!(meta, "Not found");
        }
        _ => panic!("expected failure"),
    }
    // 61 is a failure, not a certificate request.
    match client.fetch(&url).await.unwrap().outcome {
        Outcome::Failure { status, .. } => assert_eq!(status, 61),
        _ => panic!("expected failure for 61"),
    }
}

#[tokio::test]
async fn malformed_header_is_rejected() {
    let addr = spawn_server(
        vec![server_config(false)],
        Box::new(|_, _, _| b"twenty text/gemini\r\nbody\n".to_vec()),
    )
    .await;

    let (client, _, _) = client();
    let err = client.fetch(&url_for(addr, "/")).await.unwrap_err();
    assert!(matches!(
        err,
        traghetto_core::GemError::MalformedHeader(_)
    ));
}
