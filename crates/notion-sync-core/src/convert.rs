//! Line-oriented markdown → [`Block`] conversion.
//!
//! Pure and stateless: the same body always yields the same block list.
//! Each markdown construct maps to exactly one block variant; anything not
//! recognized becomes a [`Block::Paragraph`].
//!
//! # Recognized syntax
//!
//! | Markdown | Block |
//! |----------|-------|
//! | ```` ```lang ```` fences (and `~~~`) | `Code` |
//! | `#` … `######` | `Heading` (levels above 3 clamp to 3) |
//! | `- [ ]`, `- [x]` | `ToDo` |
//! | `-`, `*`, `+` | `BulletedListItem` |
//! | `1.`, `1)` | `NumberedListItem` |
//! | `>` | `Quote` (consecutive lines merge) |
//! | `---`, `***`, `___` | `Divider` |
//! | `![alt](url)` on its own line | `Image` |
//! | pipe tables | `Table` |
//!
//! Inline `[text](url)`, `**bold**`, `*italic*` / `_italic_` and `` `code` ``
//! become styled [`TextSpan`]s. Nested lists are flattened.
//!
//! # Example
//!
//! ```rust
//! use notion_sync_core::block::Block;
//! use notion_sync_core::convert::markdown_to_blocks;
//!
//! let blocks = markdown_to_blocks("# Title\n\nHello\nworld.");
//! assert_eq!(blocks.len(), 2);
//! assert_eq!(blocks[1], Block::paragraph("Hello world."));
//! ```

use crate::block::{Block, RichText, TextSpan};

/// Convert a markdown body into an ordered block list.
pub fn markdown_to_blocks(markdown: &str) -> Vec<Block> {
    let lines: Vec<&str> = markdown.lines().collect();
    let mut blocks = Vec::new();
    let mut paragraph: Vec<&str> = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let trimmed = lines[i].trim();

        if trimmed.is_empty() {
            flush_paragraph(&mut paragraph, &mut blocks);
            i += 1;
            continue;
        }

        if let Some(fence) = fence_marker(trimmed) {
            flush_paragraph(&mut paragraph, &mut blocks);
            let language = trimmed[fence.len()..].trim().to_ascii_lowercase();
            let mut body = Vec::new();
            i += 1;
            while i < lines.len() && !lines[i].trim_start().starts_with(fence) {
                body.push(lines[i]);
                i += 1;
            }
            // Skip the closing fence; an unterminated fence runs to the end.
            i += 1;
            blocks.push(Block::Code {
                language,
                text: body.join("\n"),
            });
            continue;
        }

        if let Some((level, text)) = parse_heading(trimmed) {
            flush_paragraph(&mut paragraph, &mut blocks);
            blocks.push(Block::Heading {
                level: level.clamp(1, 3),
                text: parse_inline(text),
            });
            i += 1;
            continue;
        }

        if is_divider(trimmed) {
            flush_paragraph(&mut paragraph, &mut blocks);
            blocks.push(Block::Divider);
            i += 1;
            continue;
        }

        if let Some((checked, text)) = parse_task(trimmed) {
            flush_paragraph(&mut paragraph, &mut blocks);
            blocks.push(Block::ToDo {
                text: parse_inline(text),
                checked,
            });
            i += 1;
            continue;
        }

        if let Some(text) = parse_bullet(trimmed) {
            flush_paragraph(&mut paragraph, &mut blocks);
            blocks.push(Block::BulletedListItem {
                text: parse_inline(text),
            });
            i += 1;
            continue;
        }

        if let Some(text) = parse_numbered(trimmed) {
            flush_paragraph(&mut paragraph, &mut blocks);
            blocks.push(Block::NumberedListItem {
                text: parse_inline(text),
            });
            i += 1;
            continue;
        }

        if trimmed.starts_with('>') {
            flush_paragraph(&mut paragraph, &mut blocks);
            let mut quoted = Vec::new();
            while i < lines.len() {
                let Some(rest) = lines[i].trim().strip_prefix('>') else {
                    break;
                };
                quoted.push(rest.strip_prefix(' ').unwrap_or(rest));
                i += 1;
            }
            blocks.push(Block::Quote {
                text: parse_inline(&quoted.join("\n")),
            });
            continue;
        }

        if let Some((alt, url)) = parse_standalone_image(trimmed) {
            flush_paragraph(&mut paragraph, &mut blocks);
            blocks.push(Block::Image {
                url: url.to_string(),
                caption: if alt.is_empty() {
                    RichText::default()
                } else {
                    RichText::plain(alt)
                },
            });
            i += 1;
            continue;
        }

        if trimmed.starts_with('|') {
            flush_paragraph(&mut paragraph, &mut blocks);
            let has_header = lines
                .get(i + 1)
                .map(|next| is_table_separator(next.trim()))
                .unwrap_or(false);
            let mut rows = Vec::new();
            while i < lines.len() && lines[i].trim().starts_with('|') {
                let row = lines[i].trim();
                if !is_table_separator(row) {
                    rows.push(parse_table_row(row));
                }
                i += 1;
            }
            let width = rows.iter().map(Vec::len).max().unwrap_or(0);
            for row in &mut rows {
                row.resize(width, RichText::default());
            }
            blocks.push(Block::Table { has_header, rows });
            continue;
        }

        paragraph.push(trimmed);
        i += 1;
    }

    flush_paragraph(&mut paragraph, &mut blocks);
    blocks
}

fn flush_paragraph(lines: &mut Vec<&str>, blocks: &mut Vec<Block>) {
    if lines.is_empty() {
        return;
    }
    let text = lines.join(" ");
    lines.clear();
    blocks.push(Block::Paragraph {
        text: parse_inline(&text),
    });
}

fn fence_marker(line: &str) -> Option<&'static str> {
    if line.starts_with("```") {
        Some("```")
    } else if line.starts_with("~~~") {
        Some("~~~")
    } else {
        None
    }
}

fn parse_heading(line: &str) -> Option<(u8, &str)> {
    let hashes = line.chars().take_while(|c| *c == '#').count();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    let rest = &line[hashes..];
    if !rest.is_empty() && !rest.starts_with(' ') {
        return None;
    }
    Some((hashes as u8, rest.trim()))
}

fn is_divider(line: &str) -> bool {
    let compact: String = line.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.len() < 3 {
        return false;
    }
    ['-', '*', '_']
        .iter()
        .any(|marker| compact.chars().all(|c| c == *marker))
}

fn parse_bullet(line: &str) -> Option<&str> {
    ["- ", "* ", "+ "]
        .iter()
        .find_map(|marker| line.strip_prefix(marker))
        .map(str::trim)
}

fn parse_task(line: &str) -> Option<(bool, &str)> {
    let item = parse_bullet(line)?;
    if let Some(rest) = item.strip_prefix("[ ]") {
        return Some((false, rest.trim()));
    }
    item.strip_prefix("[x]")
        .or_else(|| item.strip_prefix("[X]"))
        .map(|rest| (true, rest.trim()))
}

fn parse_numbered(line: &str) -> Option<&str> {
    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits == 0 || digits > 9 {
        return None;
    }
    let rest = &line[digits..];
    rest.strip_prefix(". ")
        .or_else(|| rest.strip_prefix(") "))
        .map(str::trim)
}

fn parse_standalone_image(line: &str) -> Option<(&str, &str)> {
    let rest = line.strip_prefix('!')?;
    let (alt, url, consumed) = parse_link(rest)?;
    if consumed == rest.len() {
        Some((alt, url))
    } else {
        None
    }
}

fn is_table_separator(line: &str) -> bool {
    if !line.contains('-') {
        return false;
    }
    split_table_cells(line).iter().all(|cell| {
        let cell = cell.trim();
        let inner = cell.trim_start_matches(':').trim_end_matches(':');
        !inner.is_empty() && inner.chars().all(|c| c == '-')
    })
}

fn split_table_cells(line: &str) -> Vec<&str> {
    let inner = line.trim();
    let inner = inner.strip_prefix('|').unwrap_or(inner);
    let inner = inner.strip_suffix('|').unwrap_or(inner);
    inner.split('|').collect()
}

fn parse_table_row(line: &str) -> Vec<RichText> {
    split_table_cells(line)
        .into_iter()
        .map(|cell| parse_inline(cell.trim()))
        .collect()
}

/// Parse `[text](url)` at the start of `s`.
///
/// Returns the link text, the URL (without an optional title) and the
/// number of bytes consumed.
fn parse_link(s: &str) -> Option<(&str, &str, usize)> {
    if !s.starts_with('[') {
        return None;
    }
    let close = s.find(']')?;
    let after = &s[close + 1..];
    if !after.starts_with('(') {
        return None;
    }
    let url_end = after.find(')')?;
    let target = after[1..url_end].trim();
    let url = target.split_whitespace().next().unwrap_or("");
    if url.is_empty() {
        return None;
    }
    Some((&s[1..close], url, close + 1 + url_end + 1))
}

/// Parse inline markdown into styled spans.
pub fn parse_inline(input: &str) -> RichText {
    let mut spans: Vec<TextSpan> = Vec::new();
    let mut plain = String::new();
    let mut prev: Option<char> = None;
    let mut rest = input;

    while let Some(ch) = rest.chars().next() {
        match ch {
            '`' => {
                if let Some(end) = rest[1..].find('`') {
                    if end > 0 {
                        flush_plain(&mut plain, &mut spans);
                        spans.push(TextSpan {
                            text: rest[1..1 + end].to_string(),
                            code: true,
                            ..Default::default()
                        });
                        prev = Some('`');
                        rest = &rest[end + 2..];
                        continue;
                    }
                }
            }
            '*' if rest.starts_with("**") => {
                if let Some(end) = rest[2..].find("**") {
                    if end > 0 {
                        flush_plain(&mut plain, &mut spans);
                        spans.push(TextSpan {
                            text: rest[2..2 + end].to_string(),
                            bold: true,
                            ..Default::default()
                        });
                        prev = Some('*');
                        rest = &rest[end + 4..];
                        continue;
                    }
                }
            }
            '*' | '_' if prev.map_or(true, is_emphasis_boundary) => {
                if let Some(end) = rest[1..].find(ch) {
                    let inner = &rest[1..1 + end];
                    if !inner.is_empty() && !inner.starts_with(' ') {
                        flush_plain(&mut plain, &mut spans);
                        spans.push(TextSpan {
                            text: inner.to_string(),
                            italic: true,
                            ..Default::default()
                        });
                        prev = Some(ch);
                        rest = &rest[end + 2..];
                        continue;
                    }
                }
            }
            '[' => {
                if let Some((text, url, consumed)) = parse_link(rest) {
                    flush_plain(&mut plain, &mut spans);
                    spans.push(TextSpan::link(text, url));
                    prev = Some(')');
                    rest = &rest[consumed..];
                    continue;
                }
            }
            '!' if rest.starts_with("![") => {
                if let Some((alt, url, consumed)) = parse_link(&rest[1..]) {
                    flush_plain(&mut plain, &mut spans);
                    let label = if alt.is_empty() { url } else { alt };
                    spans.push(TextSpan::link(label, url));
                    prev = Some(')');
                    rest = &rest[1 + consumed..];
                    continue;
                }
            }
            _ => {}
        }

        plain.push(ch);
        prev = Some(ch);
        rest = &rest[ch.len_utf8()..];
    }

    flush_plain(&mut plain, &mut spans);
    RichText(spans)
}

fn is_emphasis_boundary(c: char) -> bool {
    c.is_whitespace() || matches!(c, '(' | '[' | '{' | '"' | '\'')
}

fn flush_plain(plain: &mut String, spans: &mut Vec<TextSpan>) {
    if !plain.is_empty() {
        spans.push(TextSpan::plain(std::mem::take(plain)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_body() {
        assert!(markdown_to_blocks("").is_empty());
        assert!(markdown_to_blocks("\n\n  \n").is_empty());
    }

    #[test]
    fn test_headings_and_paragraphs() {
        let blocks = markdown_to_blocks("# One\n\ntext line\nmore\n\n#### Deep\n#nospace");
        assert_eq!(blocks[0], Block::heading(1, "One"));
        assert_eq!(blocks[1], Block::paragraph("text line more"));
        assert_eq!(blocks[2], Block::heading(3, "Deep"));
        assert_eq!(blocks[3], Block::paragraph("#nospace"));
    }

    #[test]
    fn test_code_fence_preserves_body() {
        let md = "```Rust\nfn main() {\n    # not a heading\n}\n```\nafter";
        let blocks = markdown_to_blocks(md);
        assert_eq!(
            blocks[0],
            Block::Code {
                language: "rust".to_string(),
                text: "fn main() {\n    # not a heading\n}".to_string(),
            }
        );
        assert_eq!(blocks[1], Block::paragraph("after"));
    }

    #[test]
    fn test_unterminated_fence_runs_to_end() {
        let blocks = markdown_to_blocks("~~~\na\nb");
        assert_eq!(blocks.len(), 1);
        assert!(matches!(&blocks[0], Block::Code { text, .. } if text == "a\nb"));
    }

    #[test]
    fn test_lists_and_tasks() {
        let md = "- one\n* two\n- [ ] todo\n- [x] done\n1. first\n2) second";
        let kinds: Vec<&str> = markdown_to_blocks(md).iter().map(Block::kind).collect();
        assert_eq!(
            kinds,
            vec![
                "bulleted_list_item",
                "bulleted_list_item",
                "to_do",
                "to_do",
                "numbered_list_item",
                "numbered_list_item"
            ]
        );
        let blocks = markdown_to_blocks("- [x] done");
        assert!(matches!(&blocks[0], Block::ToDo { checked: true, .. }));
    }

    #[test]
    fn test_quote_merges_lines() {
        let blocks = markdown_to_blocks("> first\n> second\n\nplain");
        assert_eq!(
            blocks[0],
            Block::Quote {
                text: RichText::plain("first\nsecond")
            }
        );
        assert_eq!(blocks.len(), 2);
    }

    #[test]
    fn test_divider_variants() {
        for md in ["---", "***", "___", "- - -"] {
            assert_eq!(markdown_to_blocks(md), vec![Block::Divider], "{}", md);
        }
    }

    #[test]
    fn test_standalone_image() {
        let blocks = markdown_to_blocks("![Diagram](https://example.com/d.png)");
        assert_eq!(
            blocks[0],
            Block::Image {
                url: "https://example.com/d.png".to_string(),
                caption: RichText::plain("Diagram"),
            }
        );
    }

    #[test]
    fn test_table_with_header_is_padded() {
        let md = "| a | b |\n|---|:-:|\n| 1 |\n| 2 | 3 |";
        let blocks = markdown_to_blocks(md);
        match &blocks[0] {
            Block::Table { has_header, rows } => {
                assert!(*has_header);
                assert_eq!(rows.len(), 3);
                assert!(rows.iter().all(|r| r.len() == 2));
                assert!(rows[1][1].is_empty());
            }
            other => panic!("expected table, got {:?}", other),
        }
    }

    #[test]
    fn test_inline_styles() {
        let text = parse_inline("see [docs](https://x.io \"t\") and **bold**, *it* `code`");
        let spans = text.spans();
        assert_eq!(spans[0], TextSpan::plain("see "));
        assert_eq!(spans[1], TextSpan::link("docs", "https://x.io"));
        assert!(spans.iter().any(|s| s.bold && s.text == "bold"));
        assert!(spans.iter().any(|s| s.italic && s.text == "it"));
        assert!(spans.iter().any(|s| s.code && s.text == "code"));
    }

    #[test]
    fn test_snake_case_is_not_italic() {
        let text = parse_inline("use file_name_here please");
        assert_eq!(text.spans().len(), 1);
        assert_eq!(text.to_plain_text(), "use file_name_here please");
    }

    #[test]
    fn test_unmatched_markers_stay_literal() {
        assert_eq!(parse_inline("a ** b").to_plain_text(), "a ** b");
        assert_eq!(parse_inline("[not a link]").to_plain_text(), "[not a link]");
        assert_eq!(parse_inline("tick ` alone").to_plain_text(), "tick ` alone");
    }

    #[test]
    fn test_deterministic() {
        let md = "# T\n\n- a\n- b\n\n```\nx\n```";
        assert_eq!(markdown_to_blocks(md), markdown_to_blocks(md));
    }
}
