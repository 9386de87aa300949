/*
 * main.rs
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

//! Traghetto: browse the Gemini network through a web browser.
//!
//! Startup wires the trust stores into the protocol client and the
//! handlers (no process-wide state), spawns the two maintenance tasks
//! (TOFU flusher, identity sweeper), and serves until interrupted. The
//! TOFU store is flushed once more on the way out.

mod config;
mod handlers;
mod pages;
mod server;
mod session;

use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use traghetto_core::certs::{IdentityStore, TofuStore};
use traghetto_core::protocol::gemini::GeminiClient;

use crate::config::Config;
use crate::session::SessionStore;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub client: GeminiClient,
    pub identities: Arc<IdentityStore>,
    pub sessions: Arc<SessionStore>,
}

fn init_tracing(loglevel: u8) {
    let default = match loglevel {
        0 => "traghetto=error,traghetto_core=error",
        1 => "traghetto=warn,traghetto_core=warn",
        2 => "traghetto=info,traghetto_core=info",
        _ => "traghetto=debug,traghetto_core=debug,tower_http=debug",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();
    init_tracing(config.loglevel);

    let tofu = Arc::new(TofuStore::new(config.tofu_path(), config.trust));
    match tofu.load().await {
        Ok(pins) => tracing::info!(pins, "loaded TOFU store"),
        Err(e) => tracing::warn!(error = %e, "could not load TOFU store"),
    }

    let identities = Arc::new(IdentityStore::new());
    if let Some(path) = &config.clientcerts {
        match identities.load_persistent(path).await {
            Ok(loaded) => tracing::info!(loaded, path = %path.display(), "loaded client certificates"),
            Err(e) => tracing::warn!(error = %e, "could not load client certificates"),
        }
    }

    let sessions = Arc::new(SessionStore::new(config.password.clone()));
    if sessions.enabled() {
        tracing::info!("password gate enabled");
    }

    let client = GeminiClient::new(tofu.clone(), identities.clone());
    let app = AppState {
        config: Arc::new(config),
        client,
        identities: identities.clone(),
        sessions,
    };

    let shutdown = CancellationToken::new();
    let flusher = tokio::spawn(tofu.clone().run_flusher(shutdown.clone()));
    let sweeper = tokio::spawn(identities.run_sweeper(shutdown.clone()));

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupt received, shutting down");
                shutdown.cancel();
            }
        });
    }

    let router = server::router(app.clone());
    server::serve(&app.config, router, shutdown.clone()).await?;

    shutdown.cancel();
    let _ = flusher.await;
    let _ = sweeper.await;
    tracing::info!("shutdown complete");
    Ok(())
}
