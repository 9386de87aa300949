/*
 * config.rs
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

//! Command-line configuration. Parsed once at startup and read-only
//! afterwards.

use std::path::PathBuf;

use clap::Parser;

/// Browse the Gemini network through a conventional web browser.
#[derive(Parser, Debug)]
#[command(name = "traghetto", version, about)]
pub struct Config {
    /// IP address on which to serve the web interface.
    #[arg(long, default_value = "127.0.0.1")]
    pub addr: String,

    /// Port on which to serve the web interface.
    #[arg(long, default_value_t = 8065)]
    pub port: u16,

    /// TLS certificate file for serving the gateway itself over HTTPS.
    #[arg(long, requires = "key")]
    pub cert: Option<PathBuf>,

    /// TLS key file for serving the gateway itself over HTTPS.
    #[arg(long, requires = "cert")]
    pub key: Option<PathBuf>,

    /// Local gemtext file served as the landing page.
    #[arg(long)]
    pub home: Option<PathBuf>,

    /// Lifetime in hours of transient client certificates; 0 disables
    /// client certificates entirely.
    #[arg(long, default_value_t = 24)]
    pub hours: u32,

    /// Mint RSA-2048 client certificates instead of ed25519.
    #[arg(long)]
    pub rsa: bool,

    /// Trust all server certificates (disables TOFU pinning and change
    /// warnings).
    #[arg(long)]
    pub trust: bool,

    /// Refuse non-text response bodies instead of delivering attachments.
    #[arg(long)]
    pub textonly: bool,

    /// Maximum redirects to follow.
    #[arg(short = 'r', long = "redirects", default_value_t = 5)]
    pub max_redirects: u32,

    /// Log level: 0 errors, 1 warnings, 2 info, 3 debug.
    #[arg(long, default_value_t = 1)]
    pub loglevel: u8,

    /// JSON file of persistent client certificates
    /// (array of {url, cert_pem, key_pem}).
    #[arg(long)]
    pub clientcerts: Option<PathBuf>,

    /// Default page language.
    #[arg(long, default_value = "en")]
    pub lang: String,

    /// When set, gate all pages behind this password (session cookie).
    #[arg(long, env = "PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

impl Config {
    /// Where the TOFU pin file lives: `~/.traghetto/tofu.txt`.
    pub fn tofu_path(&self) -> Option<PathBuf> {
        std::env::var_os("HOME")
            .map(PathBuf::from)
            .map(|home| home.join(".traghetto").join("tofu.txt"))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.addr, self.port)
    }

    pub fn client_certs_enabled(&self) -> bool {
        self.hours > 0
    }
}
