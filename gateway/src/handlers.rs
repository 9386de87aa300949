/*
 * handlers.rs
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

//! HTTP handlers: the proxy endpoint with its redirect loop, the input
//! re-submission, the certificate confirmation and settings pages, and
//! the stylesheet. Successful bodies are streamed: the fetch task writes
//! into one half of a duplex pipe while the response body drains the
//! other, so a disconnected browser aborts the upstream transfer.

use std::time::Duration;

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use traghetto_core::certs::{mint_identity, KeyKind};
use traghetto_core::gemtext::HtmlStream;
use traghetto_core::geminiurl;
use traghetto_core::protocol::gemini::{BodyKind, GeminiBody, Outcome};
use traghetto_core::GemError;
use url::Url;

use crate::pages;
use crate::AppState;

/// Overall deadline for one proxied request, body included.
const REQUEST_DEADLINE: Duration = Duration::from_secs(120);

#[derive(serde::Deserialize)]
pub struct ProxyParams {
    pub url: Option<String>,
    pub source: Option<String>,
}

#[derive(serde::Deserialize)]
pub struct ProxyForm {
    pub url: String,
    pub input: Option<String>,
    pub secret: Option<String>,
}

#[derive(serde::Deserialize)]
pub struct CertificateParams {
    pub url: String,
}

#[derive(serde::Deserialize)]
pub struct CertificateForm {
    pub url: String,
    #[serde(default)]
    pub name: String,
}

#[derive(serde::Deserialize)]
pub struct DeleteForm {
    pub url: String,
    #[serde(default)]
    pub delete: String,
}

fn html(status: StatusCode, body: String) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        body,
    )
        .into_response()
}

fn found(location: &str) -> Response {
    (
        StatusCode::FOUND,
        [(header::LOCATION, location.to_string())],
    )
        .into_response()
}

fn error_page(app: &AppState, url: &str, message: &str) -> Response {
    html(StatusCode::OK, pages::error_page(&app.config.lang, url, message))
}

/// GET /?url= : proxy a Gemini URL, or serve the landing page.
pub async fn home_get(State(app): State<AppState>, Query(params): Query<ProxyParams>) -> Response {
    let Some(raw_url) = params.url.filter(|u| !u.trim().is_empty()) else {
        return landing_page(&app).await;
    };
    let url = match geminiurl::parse_absolute(raw_url.trim()) {
        Ok(u) => u,
        Err(e) => return html(StatusCode::INTERNAL_SERVER_ERROR, pages::error_page(&app.config.lang, raw_url.trim(), &e.to_string())),
    };
    if url.scheme() != "gemini" {
        return error_page(
            &app,
            url.as_str(),
            &format!("refusing to proxy scheme '{}'", url.scheme()),
        );
    }
    proxy(app, url, params.source.is_some()).await
}

/// POST / : re-submit as a Gemini query and redirect to GET.
pub async fn home_post(
    State(app): State<AppState>,
    axum::Form(form): axum::Form<ProxyForm>,
) -> Response {
    let mut url = match geminiurl::parse_absolute(form.url.trim()) {
        Ok(u) => u,
        Err(e) => {
            return html(
                StatusCode::INTERNAL_SERVER_ERROR,
                pages::error_page(&app.config.lang, form.url.trim(), &e.to_string()),
            )
        }
    };
    // The sensitive field is never logged; it only flows into the query.
    if let Some(value) = form.secret.as_deref().or(form.input.as_deref()) {
        url.set_query(Some(&geminiurl::encode_query(value)));
    }
    found(&geminiurl::proxy_href(&url))
}

/// The redirect loop around the protocol client. Gemini targets are
/// followed up to the hop budget; anything else leaves the gateway.
async fn proxy(app: AppState, url: Url, view_source: bool) -> Response {
    let mut current = url;
    for _hop in 0..=app.config.max_redirects {
        let fetched = match app.client.fetch(&current).await {
            Ok(f) => f,
            Err(GemError::Url(e)) => {
                return html(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    pages::error_page(&app.config.lang, current.as_str(), &e),
                )
            }
            Err(e) => return error_page(&app, current.as_str(), &e.to_string()),
        };
        match fetched.outcome {
            Outcome::Redirect(next) => {
                tracing::info!(from = %current, to = %next, "redirect");
                match next.scheme() {
                    "gemini" => {
                        current = next;
                        continue;
                    }
                    "file" => {
                        return error_page(
                            &app,
                            current.as_str(),
                            &format!("refusing redirect to {}", next),
                        )
                    }
                    _ => return found(next.as_str()),
                }
            }
            Outcome::Input { prompt, sensitive } => {
                return html(
                    StatusCode::OK,
                    pages::input_page(&app.config.lang, &fetched.url, &prompt, sensitive),
                );
            }
            Outcome::CertRequired => {
                if app.config.client_certs_enabled() {
                    return found(&format!(
                        "/certificate?url={}",
                        geminiurl::encode_component(fetched.url.as_str())
                    ));
                }
                return error_page(
                    &app,
                    fetched.url.as_str(),
                    "the server requires a client certificate, but client certificates are disabled",
                );
            }
            Outcome::Failure { status, meta } => {
                return error_page(
                    &app,
                    fetched.url.as_str(),
                    &format!("server says: {} {}", status, meta),
                );
            }
            Outcome::Success { meta, body } => {
                return serve_body(app, fetched.url, fetched.warning, meta, body, view_source);
            }
        }
    }
    error_page(
        &app,
        current.as_str(),
        &format!("too many redirects, ending at {}", current),
    )
}

/// Route a 2x body to the browser: transcoded gemtext, escaped plain
/// text, the raw source view, or an attachment download.
fn serve_body(
    app: AppState,
    url: Url,
    warning: Option<String>,
    meta: String,
    body: GeminiBody,
    view_source: bool,
) -> Response {
    let kind = GeminiBody::kind(&meta);

    if kind == BodyKind::Attachment {
        if app.config.textonly {
            return error_page(
                &app,
                url.as_str(),
                &format!("refusing non-text content ({})", meta),
            );
        }
        return serve_attachment(url, meta, body);
    }

    let preformatted = view_source || kind == BodyKind::PlainText;
    let lang = app.config.lang.clone();
    let title = format!("Traghetto {}", url);

    let (mut writer, reader) = tokio::io::duplex(16 * 1024);
    tokio::spawn(async move {
        let work = async {
            writer
                .write_all(pages::head(&lang, &title, url.as_str(), warning.as_deref()).as_bytes())
                .await?;
            if preformatted {
                body.stream_preformatted(&mut writer).await?;
            } else {
                body.stream_html(&url, &mut writer).await?;
            }
            writer.write_all(pages::foot().as_bytes()).await?;
            writer.shutdown().await
        };
        match tokio::time::timeout(REQUEST_DEADLINE, work).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!(error = %e, "body stream ended early"),
            Err(_) => tracing::warn!("request deadline exceeded"),
        }
    });

    (
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        Body::from_stream(ReaderStream::new(reader)),
    )
        .into_response()
}

fn serve_attachment(url: Url, meta: String, body: GeminiBody) -> Response {
    let filename = geminiurl::file_name(&url).replace('"', "");
    let content_type = if meta.trim().is_empty() {
        "application/octet-stream".to_string()
    } else {
        meta.trim().to_string()
    };

    let (mut writer, reader) = tokio::io::duplex(16 * 1024);
    tokio::spawn(async move {
        match tokio::time::timeout(REQUEST_DEADLINE, body.copy_raw(&mut writer)).await {
            Ok(Ok(bytes)) => tracing::debug!(bytes, "attachment delivered"),
            Ok(Err(e)) => tracing::debug!(error = %e, "attachment stream ended early"),
            Err(_) => tracing::warn!("request deadline exceeded"),
        }
        let _ = writer.shutdown().await;
    });

    (
        [
            (header::CONTENT_TYPE, content_type),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        Body::from_stream(ReaderStream::new(reader)),
    )
        .into_response()
}

/// The landing page: the configured home document, or the start page.
async fn landing_page(app: &AppState) -> Response {
    let Some(home) = &app.config.home else {
        return html(StatusCode::OK, pages::start_page(&app.config.lang));
    };
    let content = match tokio::fs::read_to_string(home).await {
        Ok(c) => c,
        Err(e) => {
            return error_page(
                app,
                &home.display().to_string(),
                &format!("cannot read home document: {}", e),
            )
        }
    };
    let Some(base) = home
        .canonicalize()
        .ok()
        .and_then(|p| Url::from_file_path(p).ok())
    else {
        return error_page(
            app,
            &home.display().to_string(),
            "cannot resolve home document path",
        );
    };

    let mut out = pages::head(&app.config.lang, "Traghetto", "", None);
    let mut transcoder = HtmlStream::new(base);
    for line in content.lines() {
        transcoder.push(line, &mut out);
    }
    transcoder.finish(&mut out);
    out.push_str(&pages::foot());
    html(StatusCode::OK, out)
}

/// GET /certificate : confirmation page before minting.
pub async fn certificate_get(
    State(app): State<AppState>,
    Query(params): Query<CertificateParams>,
) -> Response {
    if !app.config.client_certs_enabled() {
        return error_page(&app, &params.url, "client certificates are disabled");
    }
    let url = match geminiurl::parse_absolute(params.url.trim()) {
        Ok(u) => u,
        Err(e) => return error_page(&app, params.url.trim(), &e.to_string()),
    };
    let expires = traghetto_core::certs::mint::lifetime_end(app.config.hours);
    html(
        StatusCode::OK,
        pages::certificate_page(&app.config.lang, &url, app.config.hours, expires),
    )
}

/// POST /certificate : mint the identity and retry the original URL.
pub async fn certificate_post(
    State(app): State<AppState>,
    axum::Form(form): axum::Form<CertificateForm>,
) -> Response {
    if !app.config.client_certs_enabled() {
        return error_page(&app, &form.url, "client certificates are disabled");
    }
    let url = match geminiurl::parse_absolute(form.url.trim()) {
        Ok(u) => u,
        Err(e) => return error_page(&app, form.url.trim(), &e.to_string()),
    };
    let kind = if app.config.rsa {
        KeyKind::Rsa2048
    } else {
        KeyKind::Ed25519
    };
    match mint_identity(&url, &form.name, app.config.hours, kind, &app.config.addr) {
        Ok(identity) => {
            app.identities.insert(identity).await;
            found(&geminiurl::proxy_href(&url))
        }
        Err(e) => error_page(&app, url.as_str(), &e.to_string()),
    }
}

/// GET /settings/certificates : list identities.
pub async fn certificates_get(State(app): State<AppState>) -> Response {
    let identities = app.identities.list().await;
    html(
        StatusCode::OK,
        pages::certificates_page(&app.config.lang, &identities),
    )
}

/// POST /settings/certificates : delete an identity by URL.
pub async fn certificates_post(
    State(app): State<AppState>,
    axum::Form(form): axum::Form<DeleteForm>,
) -> Response {
    if form.delete != "delete" {
        return found("/settings/certificates");
    }
    let url = match geminiurl::parse_absolute(form.url.trim()) {
        Ok(u) => u,
        Err(e) => return error_page(&app, form.url.trim(), &e.to_string()),
    };
    match app.identities.delete(&url).await {
        Ok(()) => found("/settings/certificates"),
        Err(e) => error_page(&app, url.as_str(), &e.to_string()),
    }
}

/// GET /traghetto.css
pub async fn stylesheet() -> Response {
    ([(header::CONTENT_TYPE, "text/css")], pages::CSS).into_response()
}
