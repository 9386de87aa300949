/*
 * pages.rs
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

//! Page chrome: the shared header/footer every response is wrapped in,
//! and the small self-contained pages (errors, input prompts, the
//! certificate confirmation, settings, login). Plain string assembly;
//! body content is produced by the streaming transcoder.

use chrono::{DateTime, SecondsFormat, Utc};
use traghetto_core::certs::identity::IdentitySummary;
use traghetto_core::gemtext::escape_html;
use traghetto_core::geminiurl;
use url::Url;

pub const CSS: &str = "\
body { max-width: 48rem; margin: 1rem auto; padding: 0 1rem;\n\
  font-family: sans-serif; line-height: 1.5; }\n\
header form { display: flex; gap: 0.5rem; }\n\
header input[type=text] { flex: 1; }\n\
pre { overflow-x: auto; background: #f4f4f4; padding: 0.5rem; }\n\
blockquote { border-left: 3px solid #aaa; margin-left: 0; padding-left: 1rem; }\n\
p { margin: 0.2rem 0; }\n\
.scheme a { color: #777; text-decoration: none; font-size: 0.85em; }\n\
.warning { background: #fff3cd; border: 1px solid #ffe08a; padding: 0.5rem; }\n\
.error { background: #f8d7da; border: 1px solid #f1aeb5; padding: 0.5rem; }\n\
footer { margin-top: 2rem; color: #777; font-size: 0.85em; }\n";

/// Opening chrome: document head, the URL bar, and the optional
/// certificate-change warning banner. Everything up to the page content.
pub fn head(lang: &str, title: &str, current_url: &str, warning: Option<&str>) -> String {
    let mut out = format!(
        "<!DOCTYPE html>\n<html lang=\"{}\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{}</title>\n\
         <link rel=\"stylesheet\" href=\"/traghetto.css\">\n\
         </head>\n<body>\n<header>\n\
         <form method=\"get\" action=\"/\">\n\
         <input type=\"text\" name=\"url\" value=\"{}\" placeholder=\"gemini://\">\n\
         <input type=\"submit\" value=\"Go\">\n\
         </form>\n</header>\n",
        escape_html(lang),
        escape_html(title),
        escape_html(current_url),
    );
    if let Some(warning) = warning {
        out.push_str("<div class=\"warning\">");
        out.push_str(&escape_html(warning));
        out.push_str("</div>\n");
    }
    out.push_str("<main>\n");
    out
}

/// Closing chrome.
pub fn foot() -> String {
    "</main>\n<footer><a href=\"/settings/certificates\">certificates</a></footer>\n\
     </body>\n</html>\n"
        .to_string()
}

/// A complete non-streamed page.
pub fn page(lang: &str, title: &str, current_url: &str, warning: Option<&str>, body: &str) -> String {
    let mut out = head(lang, title, current_url, warning);
    out.push_str(body);
    out.push_str(&foot());
    out
}

/// Error page: the message and the URL it arose from.
pub fn error_page(lang: &str, url: &str, message: &str) -> String {
    let body = format!(
        "<div class=\"error\"><p>{}</p></div>\n",
        escape_html(message)
    );
    page(lang, "Traghetto error", url, None, &body)
}

/// Input form for a 1x response. Sensitive input (status 11) posts a
/// password field named `secret`; its value is never logged.
pub fn input_page(lang: &str, url: &Url, prompt: &str, sensitive: bool) -> String {
    let field = if sensitive {
        "<input type=\"password\" name=\"secret\" autofocus>"
    } else {
        "<input type=\"text\" name=\"input\" autofocus>"
    };
    let body = format!(
        "<p>{}</p>\n<form method=\"post\" action=\"/\">\n\
         <input type=\"hidden\" name=\"url\" value=\"{}\">\n\
         {}\n<input type=\"submit\" value=\"Submit\">\n</form>\n",
        escape_html(prompt),
        escape_html(url.as_str()),
        field,
    );
    page(lang, prompt, url.as_str(), None, &body)
}

/// Confirmation page before minting a transient identity.
pub fn certificate_page(lang: &str, url: &Url, hours: u32, expires: DateTime<Utc>) -> String {
    let body = format!(
        "<p>The server at <strong>{}</strong> requests a client certificate.</p>\n\
         <p>Traghetto can create a temporary identity for this site, valid for \
         {} hours (until {}). The certificate is kept in memory only.</p>\n\
         <form method=\"post\" action=\"/certificate\">\n\
         <input type=\"hidden\" name=\"url\" value=\"{}\">\n\
         <label>Display name <input type=\"text\" name=\"name\"></label>\n\
         <input type=\"submit\" value=\"Create certificate\">\n</form>\n",
        escape_html(url.as_str()),
        hours,
        expires.to_rfc3339_opts(SecondsFormat::Secs, true),
        escape_html(url.as_str()),
    );
    page(lang, "Client certificate", url.as_str(), None, &body)
}

/// Identity list for the settings page, with a delete button per row.
pub fn certificates_page(lang: &str, identities: &[IdentitySummary]) -> String {
    let mut body = String::from("<h1>Client certificates</h1>\n");
    if identities.is_empty() {
        body.push_str("<p>No client certificates.</p>\n");
    } else {
        body.push_str("<table>\n<tr><th>URL</th><th>Name</th><th>Expires</th><th></th></tr>\n");
        for identity in identities {
            body.push_str(&format!(
                "<tr><td><a href=\"{}\">{}</a></td><td>{}</td><td>{}</td>\n\
                 <td><form method=\"post\" action=\"/settings/certificates\">\n\
                 <input type=\"hidden\" name=\"url\" value=\"{}\">\n\
                 <button type=\"submit\" name=\"delete\" value=\"delete\">delete</button>\n\
                 </form></td></tr>\n",
                escape_html(&proxy_href_for(&identity.url)),
                escape_html(&identity.url),
                escape_html(&identity.cert_name),
                identity.expires.to_rfc3339_opts(SecondsFormat::Secs, true),
                escape_html(&identity.url),
            ));
        }
        body.push_str("</table>\n");
    }
    page(lang, "Client certificates", "", None, &body)
}

fn proxy_href_for(url: &str) -> String {
    match Url::parse(url) {
        Ok(u) => geminiurl::proxy_href(&u),
        Err(_) => "/".to_string(),
    }
}

/// Start page shown when no home document is configured.
pub fn start_page(lang: &str) -> String {
    let body = "<h1>Traghetto</h1>\n\
                <p>Enter a <code>gemini://</code> URL above to start browsing.</p>\n";
    page(lang, "Traghetto", "", None, body)
}

/// Login form for the password gate.
pub fn login_page(lang: &str, failed: bool) -> String {
    let mut body = String::new();
    if failed {
        body.push_str("<div class=\"error\"><p>Wrong password.</p></div>\n");
    }
    body.push_str(
        "<form method=\"post\" action=\"/login\">\n\
         <label>Password <input type=\"password\" name=\"password\" autofocus></label>\n\
         <input type=\"submit\" value=\"Log in\">\n</form>\n",
    );
    page(lang, "Log in", "", None, &body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_page_escapes_message() {
        let html = error_page("en", "gemini://x/", "boom <script>");
        assert!(html.contains("boom &lt;script>"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn sensitive_input_uses_password_field() {
        let u = Url::parse("gemini://example.org/login").unwrap();
        let html = input_page("en", &u, "Passphrase", true);
        assert!(html.contains("type=\"password\""));
        assert!(html.contains("name=\"secret\""));
        let html = input_page("en", &u, "Search", false);
        assert!(html.contains("name=\"input\""));
    }

    #[test]
    fn warning_banner_renders_in_head() {
        let html = head("en", "t", "gemini://x/", Some("cert changed"));
        assert!(html.contains("class=\"warning\""));
        assert!(html.contains("cert changed"));
    }
}
