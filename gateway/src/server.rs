/*
 * server.rs
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

//! Router assembly and serving, plain HTTP or HTTPS. The HTTPS path
//! accepts TCP itself and hands each TLS stream to hyper, since axum's
//! own serve loop only covers plain TCP.

use std::io;
use std::sync::Arc;

use axum::middleware;
use axum::routing::get;
use axum::Router;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::service::TowerToHyperService;
use tokio::net::TcpListener;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::rustls::ServerConfig;
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::{handlers, session, AppState};

pub fn router(app: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::home_get).post(handlers::home_post))
        .route(
            "/certificate",
            get(handlers::certificate_get).post(handlers::certificate_post),
        )
        .route(
            "/settings/certificates",
            get(handlers::certificates_get).post(handlers::certificates_post),
        )
        .route("/traghetto.css", get(handlers::stylesheet))
        .route(
            "/login",
            get(session::login_form).post(session::login_submit),
        )
        .layer(middleware::from_fn_with_state(
            app.clone(),
            session::require_session,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(app)
}

/// Serve until the shutdown token fires.
pub async fn serve(
    config: &Config,
    router: Router,
    shutdown: CancellationToken,
) -> io::Result<()> {
    let listener = TcpListener::bind(config.bind_address()).await?;
    tracing::info!(address = %config.bind_address(), "listening");

    match (&config.cert, &config.key) {
        (Some(cert), Some(key)) => {
            let tls_config = load_tls_config(cert, key)?;
            serve_tls(listener, router, tls_config, shutdown).await
        }
        _ => {
            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown.cancelled_owned())
                .await
        }
    }
}

fn load_tls_config(
    cert_path: &std::path::Path,
    key_path: &std::path::Path,
) -> io::Result<Arc<ServerConfig>> {
    let cert_pem = std::fs::read(cert_path)?;
    let key_pem = std::fs::read(key_path)?;
    let chain: Vec<CertificateDer<'static>> =
        rustls_pemfile::certs(&mut &cert_pem[..]).collect::<Result<_, _>>()?;
    let key: PrivateKeyDer<'static> = rustls_pemfile::private_key(&mut &key_pem[..])?
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "no private key in key file"))?;
    let config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(chain, key)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    Ok(Arc::new(config))
}

async fn serve_tls(
    listener: TcpListener,
    router: Router,
    tls_config: Arc<ServerConfig>,
    shutdown: CancellationToken,
) -> io::Result<()> {
    let acceptor = TlsAcceptor::from(tls_config);
    loop {
        let (tcp, peer) = tokio::select! {
            accepted = listener.accept() => accepted?,
            _ = shutdown.cancelled() => return Ok(()),
        };
        let acceptor = acceptor.clone();
        let service = TowerToHyperService::new(router.clone());
        tokio::spawn(async move {
            let tls = match acceptor.accept(tcp).await {
                Ok(tls) => tls,
                Err(e) => {
                    tracing::debug!(peer = %peer, error = %e, "TLS accept failed");
                    return;
                }
            };
            let result = hyper_util::server::conn::auto::Builder::new(TokioExecutor::new())
                .serve_connection_with_upgrades(TokioIo::new(tls), service)
                .await;
            if let Err(e) = result {
                tracing::debug!(peer = %peer, error = %e, "connection ended with error");
            }
        });
    }
}
