/*
 * session.rs
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

//! Password gate. When a password is configured, every page except the
//! login form and the stylesheet requires a session cookie. Sessions are
//! random tokens held in memory behind the same reader/writer discipline
//! as the trust stores.

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use rand::distributions::Alphanumeric;
use rand::Rng;
use tokio::sync::RwLock;

use crate::AppState;

pub const SESSION_COOKIE: &str = "traghetto_session";

/// In-memory session list.
pub struct SessionStore {
    password: Option<String>,
    tokens: RwLock<Vec<String>>,
}

impl SessionStore {
    pub fn new(password: Option<String>) -> Self {
        Self {
            password,
            tokens: RwLock::new(Vec::new()),
        }
    }

    pub fn enabled(&self) -> bool {
        self.password.is_some()
    }

    /// Check the password; on success issue and remember a new token.
    pub async fn log_in(&self, password: &str) -> Option<String> {
        match &self.password {
            Some(expected) if expected == password => {
                let token: String = rand::thread_rng()
                    .sample_iter(&Alphanumeric)
                    .take(32)
                    .map(char::from)
                    .collect();
                self.tokens.write().await.push(token.clone());
                Some(token)
            }
            _ => None,
        }
    }

    pub async fn is_valid(&self, token: &str) -> bool {
        self.tokens.read().await.iter().any(|t| t == token)
    }
}

/// The session token from the Cookie header, if present.
fn cookie_token(headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    for cookie in cookies.split(';') {
        let cookie = cookie.trim();
        if let Some(value) = cookie.strip_prefix(SESSION_COOKIE) {
            if let Some(value) = value.strip_prefix('=') {
                return Some(value.to_string());
            }
        }
    }
    None
}

/// Middleware: redirect to the login form unless the request carries a
/// valid session cookie.
pub async fn require_session(
    State(app): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if !app.sessions.enabled() {
        return next.run(request).await;
    }
    let path = request.uri().path();
    if path == "/login" || path == "/traghetto.css" {
        return next.run(request).await;
    }
    if let Some(token) = cookie_token(request.headers()) {
        if app.sessions.is_valid(&token).await {
            return next.run(request).await;
        }
    }
    Redirect::to("/login").into_response()
}

/// GET /login
pub async fn login_form(State(app): State<AppState>) -> Response {
    html_page(pages_login(&app, false))
}

/// POST /login
pub async fn login_submit(
    State(app): State<AppState>,
    axum::Form(form): axum::Form<LoginForm>,
) -> Response {
    match app.sessions.log_in(&form.password).await {
        Some(token) => {
            let cookie = format!("{}={}; HttpOnly; SameSite=Strict; Path=/", SESSION_COOKIE, token);
            (
                StatusCode::FOUND,
                [
                    (header::SET_COOKIE, cookie),
                    (header::LOCATION, "/".to_string()),
                ],
            )
                .into_response()
        }
        None => html_page(pages_login(&app, true)),
    }
}

#[derive(serde::Deserialize)]
pub struct LoginForm {
    pub password: String,
}

fn pages_login(app: &AppState, failed: bool) -> String {
    crate::pages::login_page(&app.config.lang, failed)
}

fn html_page(html: String) -> Response {
    (
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        html,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn login_issues_token_only_on_match() {
        let store = SessionStore::new(Some("secret".into()));
        assert!(store.log_in("wrong").await.is_none());
        let token = store.log_in("secret").await.unwrap();
        assert!(store.is_valid(&token).await);
        assert!(!store.is_valid("forged").await);
    }

    #[tokio::test]
    async fn disabled_store_accepts_nothing() {
        let store = SessionStore::new(None);
        assert!(!store.enabled());
        assert!(store.log_in("anything").await.is_none());
    }

    #[test]
    fn cookie_parsing_finds_session_token() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            "other=1; traghetto_session=abc123; more=2".parse().unwrap(),
        );
        assert_eq!(cookie_token(&headers), Some("abc123".to_string()));
    }
}
