/*
 * mod.rs
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

//! Gemtext line classification and the streaming HTML transcoder.

mod html;

pub use html::{escape_html, HtmlStream};

/// One classified gemtext line. Borrowed from the input line.
#[derive(Debug, PartialEq)]
pub enum GemLine<'a> {
    /// Empty or whitespace-only line.
    Blank,
    /// A ``` line, with optional alt text after the backticks.
    PreToggle { alt: Option<&'a str> },
    /// `#`, `##`, or `###` heading (level 1..=3).
    Heading { level: u8, text: &'a str },
    /// `=> href label` link line. The label may be empty.
    Link { href: &'a str, label: &'a str },
    /// `* ` list item.
    ListItem(&'a str),
    /// `> ` quote line.
    Quote(&'a str),
    /// Anything else: a plain paragraph line.
    Text(&'a str),
}

/// Text after a one-character marker followed by a single whitespace
/// character (list items and quotes require the whitespace).
fn after_marker(line: &str, marker: char) -> Option<&str> {
    let rest = line.strip_prefix(marker)?;
    let mut chars = rest.chars();
    match chars.next() {
        Some(c) if c.is_whitespace() => Some(chars.as_str()),
        _ => None,
    }
}

/// Classify one line of gemtext. First match wins, in the order the
/// renderer dispatches: preformatted toggle, blank, headings, links,
/// list items, quotes, paragraph.
pub fn classify(line: &str) -> GemLine<'_> {
    if let Some(rest) = line.strip_prefix("```") {
        let alt = rest.trim();
        return GemLine::PreToggle {
            alt: if alt.is_empty() { None } else { Some(alt) },
        };
    }

    if line.trim().is_empty() {
        return GemLine::Blank;
    }

    if let Some(rest) = line.strip_prefix('#') {
        let (level, rest) = match rest.strip_prefix('#') {
            Some(r2) => match r2.strip_prefix('#') {
                Some(r3) => (3, r3),
                None => (2, r2),
            },
            None => (1, rest),
        };
        let text = rest.trim_start();
        // A fourth # (or nothing after the marker) is not a heading.
        if !text.is_empty() && !text.starts_with('#') {
            return GemLine::Heading { level, text };
        }
        return GemLine::Text(line);
    }

    if let Some(rest) = line.strip_prefix("=>") {
        let rest = rest.trim_start();
        if !rest.is_empty() {
            return match rest.find(char::is_whitespace) {
                Some(i) => GemLine::Link {
                    href: &rest[..i],
                    label: rest[i..].trim_start(),
                },
                None => GemLine::Link {
                    href: rest,
                    label: "",
                },
            };
        }
        return GemLine::Text(line);
    }

    if let Some(rest) = after_marker(line, '*') {
        return GemLine::ListItem(rest);
    }

    if let Some(rest) = after_marker(line, '>') {
        return GemLine::Quote(rest);
    }

    GemLine::Text(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_headings() {
        assert_eq!(
            classify("# Title"),
            GemLine::Heading {
                level: 1,
                text: "Title"
            }
        );
        assert_eq!(
            classify("##Sub"),
            GemLine::Heading {
                level: 2,
                text: "Sub"
            }
        );
        assert_eq!(
            classify("###  deep"),
            GemLine::Heading {
                level: 3,
                text: "deep"
            }
        );
        // Four hashes and bare markers fall through to paragraph.
        assert_eq!(classify("####x"), GemLine::Text("####x"));
        assert_eq!(classify("#"), GemLine::Text("#"));
        assert_eq!(classify("# "), GemLine::Text("# "));
    }

    #[test]
    fn classify_links() {
        assert_eq!(
            classify("=> gemini://x/ hi"),
            GemLine::Link {
                href: "gemini://x/",
                label: "hi"
            }
        );
        assert_eq!(
            classify("=>bare"),
            GemLine::Link {
                href: "bare",
                label: ""
            }
        );
        assert_eq!(classify("=>"), GemLine::Text("=>"));
        assert_eq!(classify("=>   "), GemLine::Text("=>   "));
    }

    #[test]
    fn classify_lists_and_quotes_need_whitespace() {
        assert_eq!(classify("* item"), GemLine::ListItem("item"));
        assert_eq!(classify("*item"), GemLine::Text("*item"));
        assert_eq!(classify("> words"), GemLine::Quote("words"));
        assert_eq!(classify(">words"), GemLine::Text(">words"));
    }

    #[test]
    fn classify_pre_toggle_alt() {
        assert_eq!(classify("```"), GemLine::PreToggle { alt: None });
        assert_eq!(
            classify("``` ascii art"),
            GemLine::PreToggle {
                alt: Some("ascii art")
            }
        );
    }

    #[test]
    fn classify_blank() {
        assert_eq!(classify(""), GemLine::Blank);
        assert_eq!(classify("   \t"), GemLine::Blank);
    }
}
