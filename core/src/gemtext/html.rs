/*
 * html.rs
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

//! Streaming gemtext-to-HTML transcoder. One line in, a fragment out;
//! never holds more than the current line. Two flags (`in_list`,
//! `in_pre`) carry the state between lines; `finish` closes whatever is
//! still open so the output always has balanced `<ul>`/`<pre>`.

use url::Url;

use super::{classify, GemLine};
use crate::geminiurl;

/// HTML-escape `&`, `'`, `<` and `"`. Used for all user-visible text,
/// preformatted content included.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '\'' => out.push_str("&#39;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Streaming transcoder state.
pub struct HtmlStream {
    base: Url,
    in_list: bool,
    in_pre: bool,
}

impl HtmlStream {
    pub fn new(base: Url) -> Self {
        Self {
            base,
            in_list: false,
            in_pre: false,
        }
    }

    fn close_list(&mut self, out: &mut String) {
        if self.in_list {
            self.in_list = false;
            out.push_str("</ul>\n");
        }
    }

    /// Transcode one line, appending HTML fragments to `out`.
    pub fn push(&mut self, line: &str, out: &mut String) {
        if let GemLine::PreToggle { alt } = classify(line) {
            self.close_list(out);
            if self.in_pre {
                self.in_pre = false;
                out.push_str("</pre>\n");
            } else {
                self.in_pre = true;
                match alt {
                    Some(a) => {
                        out.push_str("<pre aria-label=\"");
                        out.push_str(&escape_html(a));
                        out.push_str("\">\n");
                    }
                    None => out.push_str("<pre>\n"),
                }
            }
            return;
        }

        if self.in_pre {
            out.push_str(&escape_html(line));
            out.push('\n');
            return;
        }

        match classify(line) {
            GemLine::Blank => out.push_str("<br>\n"),
            GemLine::Heading { level, text } => {
                self.close_list(out);
                let text = escape_html(text);
                match level {
                    1 => out.push_str("<h1>"),
                    2 => out.push_str("<h2>"),
                    _ => out.push_str("<h3>"),
                }
                out.push_str(&text);
                match level {
                    1 => out.push_str("</h1>\n"),
                    2 => out.push_str("</h2>\n"),
                    _ => out.push_str("</h3>\n"),
                }
            }
            GemLine::Link { href, label } => {
                self.close_list(out);
                self.push_link(href, label, line, out);
            }
            GemLine::ListItem(text) => {
                if !self.in_list {
                    self.in_list = true;
                    out.push_str("<ul>\n");
                }
                out.push_str("<li>");
                out.push_str(&escape_html(text));
                out.push_str("</li>\n");
            }
            GemLine::Quote(text) => {
                self.close_list(out);
                out.push_str("<blockquote>");
                out.push_str(&escape_html(text));
                out.push_str("</blockquote>\n");
            }
            GemLine::Text(text) => {
                self.close_list(out);
                out.push_str(&escape_html(text));
                out.push_str("<br>\n");
            }
            GemLine::PreToggle { .. } => unreachable!("handled above"),
        }
    }

    /// A link line. Gemini targets point back into the gateway via
    /// `/?url=`, with a secondary link to the raw URL; other schemes link
    /// straight out. An unresolvable href degrades to a paragraph.
    fn push_link(&self, href: &str, label: &str, raw_line: &str, out: &mut String) {
        let target = match geminiurl::resolve(&self.base, href) {
            Ok(u) => u,
            Err(_) => {
                out.push_str("<p>");
                out.push_str(&escape_html(raw_line));
                out.push_str("</p>\n");
                return;
            }
        };

        let text = if label.is_empty() {
            escape_html(target.as_str())
        } else {
            escape_html(label)
        };
        let raw = escape_html(target.as_str());
        let scheme = target.scheme().to_string();

        out.push_str("<p><a href=\"");
        if scheme == "gemini" {
            out.push_str(&geminiurl::proxy_href(&target));
        } else {
            out.push_str(&raw);
        }
        out.push_str("\">");
        out.push_str(&text);
        out.push_str("</a> <span class=\"scheme\"><a href=\"");
        out.push_str(&raw);
        out.push_str("\">[");
        out.push_str(&escape_html(&scheme));
        out.push_str("]</a></span></p>\n");
    }

    /// End of input: close any open list or preformatted block.
    pub fn finish(&mut self, out: &mut String) {
        self.close_list(out);
        if self.in_pre {
            self.in_pre = false;
            out.push_str("</pre>\n");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transcode(lines: &[&str]) -> String {
        let base = Url::parse("gemini://example.org/dir/").unwrap();
        let mut t = HtmlStream::new(base);
        let mut out = String::new();
        for line in lines {
            t.push(line, &mut out);
        }
        t.finish(&mut out);
        out
    }

    #[test]
    fn document_with_heading_link_and_list() {
        let html = transcode(&["# Title", "=> gemini://x/ hi", "* a", "* b"]);
        assert!(html.contains("<h1>Title</h1>"));
        assert!(html.contains("<a href=\"/?url=gemini%3A%2F%2Fx%2F\">hi</a>"));
        assert!(html.contains("<ul>\n<li>a</li>\n<li>b</li>\n"));
        assert!(html.trim_end().ends_with("</ul>"));
    }

    #[test]
    fn non_gemini_link_is_direct() {
        let html = transcode(&["=> https://example/ ex"]);
        assert!(html.contains("<a href=\"https://example/\">ex</a>"));
        assert!(html.contains("[https]"));
        assert!(!html.contains("/?url="));
    }

    #[test]
    fn relative_link_resolves_against_base() {
        let html = transcode(&["=> sub/page.gmi deeper"]);
        assert!(html.contains("url=gemini%3A%2F%2Fexample.org%2Fdir%2Fsub%2Fpage.gmi"));
    }

    #[test]
    fn link_label_defaults_to_href() {
        let html = transcode(&["=> gemini://x/"]);
        assert!(html.contains(">gemini://x/</a>"));
    }

    #[test]
    fn preformatted_passes_through_escaped() {
        let html = transcode(&["```", "# not a heading", "<tag> & so", "```"]);
        assert!(html.contains("<pre>\n# not a heading\n&lt;tag&gt; &amp; so\n</pre>"));
        assert!(!html.contains("<h1>"));
    }

    #[test]
    fn pre_alt_text_becomes_aria_label() {
        let html = transcode(&["``` diagram \"a\"", "x", "```"]);
        assert!(html.contains("<pre aria-label=\"diagram &quot;a&quot;\">"));
    }

    #[test]
    fn unterminated_structures_close_at_eof() {
        let html = transcode(&["* open list"]);
        assert!(html.trim_end().ends_with("</ul>"));
        let html = transcode(&["```", "still open"]);
        assert!(html.trim_end().ends_with("</pre>"));
    }

    #[test]
    fn blank_does_not_close_list() {
        let html = transcode(&["* a", "", "* b"]);
        // One list wrapping both items; the blank becomes <br> inside it.
        assert_eq!(html.matches("<ul>").count(), 1);
        assert_eq!(html.matches("</ul>").count(), 1);
    }

    #[test]
    fn quote_and_paragraph() {
        let html = transcode(&["> wise words", "plain text"]);
        assert!(html.contains("<blockquote>wise words</blockquote>"));
        assert!(html.contains("plain text<br>"));
    }

    #[test]
    fn escaping_covers_quotes_and_amp() {
        let html = transcode(&["Tom & Jerry's \"show\" <live>"]);
        assert!(html.contains("Tom &amp; Jerry&#39;s &quot;show&quot; &lt;live>"));
    }
}
