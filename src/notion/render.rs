//! Block and rich-text rendering for the Notion API.
//!
//! Notion rejects several things markdown allows, so rendering is lossy in
//! a few well-defined ways:
//!
//! - text longer than 2000 characters is split into several segments;
//! - links that are not absolute `http(s)`/`mailto` URLs are kept as text;
//! - images with a relative URL become a paragraph with the alt text;
//! - code languages Notion does not know become `plain text`.

use serde_json::{json, Value};

use notion_sync_core::block::{Block, RichText, TextSpan};

/// Notion's per-segment limit on `text.content`.
pub const MAX_TEXT_LEN: usize = 2000;

const LANGUAGES: &[&str] = &[
    "abap", "arduino", "bash", "basic", "c", "c#", "c++", "clojure", "coffeescript", "css",
    "dart", "diff", "docker", "elixir", "elm", "erlang", "f#", "flow", "fortran", "gherkin",
    "glsl", "go", "graphql", "groovy", "haskell", "html", "java", "javascript", "json", "julia",
    "kotlin", "latex", "less", "lisp", "livescript", "lua", "makefile", "markdown", "markup",
    "matlab", "mermaid", "nix", "objective-c", "ocaml", "pascal", "perl", "php", "plain text",
    "powershell", "prolog", "protobuf", "python", "r", "reason", "ruby", "rust", "sass",
    "scala", "scheme", "scss", "shell", "sql", "swift", "typescript", "vb.net", "verilog",
    "vhdl", "visual basic", "webassembly", "xml", "yaml",
];

/// Map a fence info string onto a Notion code language.
pub fn normalize_language(language: &str) -> &'static str {
    let lower = language.trim().to_ascii_lowercase();
    let alias = match lower.as_str() {
        "" | "text" | "txt" | "plaintext" | "plain" => "plain text",
        "sh" | "zsh" | "console" => "shell",
        "js" | "jsx" | "mjs" => "javascript",
        "ts" | "tsx" => "typescript",
        "py" => "python",
        "rs" => "rust",
        "rb" => "ruby",
        "yml" => "yaml",
        "md" => "markdown",
        "cpp" | "cc" | "cxx" | "hpp" => "c++",
        "cs" | "csharp" => "c#",
        "fs" | "fsharp" => "f#",
        "kt" => "kotlin",
        "dockerfile" => "docker",
        "make" => "makefile",
        "ps1" | "pwsh" => "powershell",
        "proto" => "protobuf",
        "tex" => "latex",
        "objc" => "objective-c",
        "golang" => "go",
        "wasm" => "webassembly",
        "htm" => "html",
        other => other,
    };
    LANGUAGES
        .iter()
        .find(|l| **l == alias)
        .copied()
        .unwrap_or("plain text")
}

/// Whether Notion will accept `url` as a link or external file.
pub fn is_absolute_url(url: &str) -> bool {
    let lower = url.trim().to_ascii_lowercase();
    lower.starts_with("https://") || lower.starts_with("http://") || lower.starts_with("mailto:")
}

/// Split `text` into pieces of at most `max` characters.
fn split_text(text: &str, max: usize) -> Vec<&str> {
    if text.chars().count() <= max {
        return vec![text];
    }
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut count = 0;
    for (idx, _) in text.char_indices() {
        if count == max {
            pieces.push(&text[start..idx]);
            start = idx;
            count = 0;
        }
        count += 1;
    }
    pieces.push(&text[start..]);
    pieces
}

fn span_to_json(span: &TextSpan) -> Vec<Value> {
    let link = span
        .link
        .as_deref()
        .filter(|url| is_absolute_url(url))
        .map(|url| json!({ "url": url }));

    split_text(&span.text, MAX_TEXT_LEN)
        .into_iter()
        .map(|piece| {
            json!({
                "type": "text",
                "text": { "content": piece, "link": link },
                "annotations": {
                    "bold": span.bold,
                    "italic": span.italic,
                    "code": span.code,
                },
            })
        })
        .collect()
}

pub fn rich_text_to_json(text: &RichText) -> Value {
    Value::Array(
        text.spans()
            .iter()
            .filter(|s| !s.text.is_empty())
            .flat_map(span_to_json)
            .collect(),
    )
}

/// Plain-text rich text, used for titles and code bodies.
pub fn plain_text_to_json(text: &str) -> Value {
    rich_text_to_json(&RichText::plain(text))
}

fn text_block(kind: &str, text: &RichText) -> Value {
    json!({
        "object": "block",
        "type": kind,
        kind: { "rich_text": rich_text_to_json(text) },
    })
}

/// Render one block as a Notion block object.
pub fn block_to_json(block: &Block) -> Value {
    let kind = block.kind();
    match block {
        Block::Paragraph { text }
        | Block::Heading { text, .. }
        | Block::BulletedListItem { text }
        | Block::NumberedListItem { text }
        | Block::Quote { text } => text_block(kind, text),
        Block::ToDo { text, checked } => json!({
            "object": "block",
            "type": kind,
            kind: { "rich_text": rich_text_to_json(text), "checked": checked },
        }),
        Block::Code { language, text } => json!({
            "object": "block",
            "type": kind,
            kind: {
                "rich_text": plain_text_to_json(text),
                "language": normalize_language(language),
            },
        }),
        Block::Callout { text, icon } => {
            let mut body = json!({ "rich_text": rich_text_to_json(text) });
            if let Some(emoji) = icon {
                body["icon"] = json!({ "type": "emoji", "emoji": emoji });
            }
            json!({ "object": "block", "type": kind, kind: body })
        }
        Block::Image { url, caption } if is_absolute_url(url) => json!({
            "object": "block",
            "type": kind,
            kind: {
                "type": "external",
                "external": { "url": url },
                "caption": rich_text_to_json(caption),
            },
        }),
        Block::Image { url, caption } => {
            let label = if caption.is_empty() {
                url.clone()
            } else {
                caption.to_plain_text()
            };
            text_block("paragraph", &RichText::plain(format!("[image: {}]", label)))
        }
        Block::Divider => json!({ "object": "block", "type": kind, kind: {} }),
        Block::Table { has_header, rows } => {
            let width = rows.iter().map(Vec::len).max().unwrap_or(0).max(1);
            let children: Vec<Value> = rows
                .iter()
                .map(|row| {
                    let cells: Vec<Value> = (0..width)
                        .map(|i| {
                            row.get(i)
                                .map(rich_text_to_json)
                                .unwrap_or_else(|| json!([]))
                        })
                        .collect();
                    json!({
                        "object": "block",
                        "type": "table_row",
                        "table_row": { "cells": cells },
                    })
                })
                .collect();
            json!({
                "object": "block",
                "type": kind,
                kind: {
                    "table_width": width,
                    "has_column_header": has_header,
                    "has_row_header": false,
                    "children": children,
                },
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heading_and_paragraph_shape() {
        let h = block_to_json(&Block::heading(2, "Title"));
        assert_eq!(h["type"], "heading_2");
        assert_eq!(h["heading_2"]["rich_text"][0]["text"]["content"], "Title");

        let p = block_to_json(&Block::paragraph("body"));
        assert_eq!(p["object"], "block");
        assert_eq!(p["paragraph"]["rich_text"][0]["annotations"]["bold"], false);
    }

    #[test]
    fn test_long_text_is_split() {
        let long = "x".repeat(4500);
        let json = rich_text_to_json(&RichText::plain(long));
        let segments = json.as_array().unwrap();
        assert_eq!(segments.len(), 3);
        assert_eq!(
            segments[0]["text"]["content"].as_str().unwrap().len(),
            MAX_TEXT_LEN
        );
        assert_eq!(segments[2]["text"]["content"].as_str().unwrap().len(), 500);
    }

    #[test]
    fn test_split_respects_char_boundaries() {
        let text = "é".repeat(2001);
        let pieces = split_text(&text, MAX_TEXT_LEN);
        assert_eq!(pieces.len(), 2);
        assert_eq!(pieces[1], "é");
    }

    #[test]
    fn test_relative_links_are_dropped() {
        let text = RichText(vec![
            TextSpan::link("guide", "./guide.md"),
            TextSpan::link("site", "https://example.com"),
        ]);
        let json = rich_text_to_json(&text);
        assert!(json[0]["text"]["link"].is_null());
        assert_eq!(json[0]["text"]["content"], "guide");
        assert_eq!(json[1]["text"]["link"]["url"], "https://example.com");
    }

    #[test]
    fn test_code_language_normalized() {
        let code = |lang: &str| Block::Code {
            language: lang.to_string(),
            text: "x".to_string(),
        };
        assert_eq!(block_to_json(&code("rs"))["code"]["language"], "rust");
        assert_eq!(block_to_json(&code(""))["code"]["language"], "plain text");
        assert_eq!(block_to_json(&code("Python"))["code"]["language"], "python");
        assert_eq!(block_to_json(&code("toml"))["code"]["language"], "plain text");
    }

    #[test]
    fn test_relative_image_degrades_to_paragraph() {
        let block = Block::Image {
            url: "img/diagram.png".to_string(),
            caption: RichText::plain("Diagram"),
        };
        let json = block_to_json(&block);
        assert_eq!(json["type"], "paragraph");
        assert_eq!(
            json["paragraph"]["rich_text"][0]["text"]["content"],
            "[image: Diagram]"
        );

        let external = block_to_json(&Block::Image {
            url: "https://example.com/a.png".to_string(),
            caption: RichText::default(),
        });
        assert_eq!(external["image"]["external"]["url"], "https://example.com/a.png");
    }

    #[test]
    fn test_table_rows_padded_to_width() {
        let block = Block::Table {
            has_header: true,
            rows: vec![
                vec![RichText::plain("a"), RichText::plain("b")],
                vec![RichText::plain("1")],
            ],
        };
        let json = block_to_json(&block);
        assert_eq!(json["table"]["table_width"], 2);
        assert_eq!(json["table"]["has_column_header"], true);
        let second = &json["table"]["children"][1]["table_row"]["cells"];
        assert_eq!(second.as_array().unwrap().len(), 2);
        assert_eq!(second[1], json!([]));
    }

    #[test]
    fn test_callout_icon_and_divider() {
        let callout = block_to_json(&Block::Callout {
            text: RichText::plain("note"),
            icon: Some("🔗".to_string()),
        });
        assert_eq!(callout["callout"]["icon"]["emoji"], "🔗");
        assert_eq!(block_to_json(&Block::Divider)["divider"], json!({}));
    }
}
