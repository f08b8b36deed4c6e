//! YAML frontmatter parsing for markdown sources.
//!
//! A source file is an optional frontmatter block followed by the body:
//!
//! ```markdown
//! ---
//! title: Deployment
//! notion_url: https://www.notion.so/0f1e2d3c4b5a69788796a5b4c3d2e1f0
//! ---
//!
//! # Deployment
//! ```
//!
//! Only the body is fingerprinted, so rewriting the frontmatter never makes
//! a document look changed.

use anyhow::{bail, Context, Result};

use notion_sync_core::models::{Document, Metadata};

/// Split raw file content into the frontmatter YAML (without delimiters)
/// and the body. Returns `(None, raw)` when there is no well-formed block.
pub fn split_frontmatter(raw: &str) -> (Option<&str>, &str) {
    let Some(after_opening) = raw.strip_prefix("---") else {
        return (None, raw);
    };

    let yaml_start = if let Some(rest) = after_opening.strip_prefix('\n') {
        rest
    } else if let Some(rest) = after_opening.strip_prefix("\r\n") {
        rest
    } else {
        return (None, raw);
    };

    let Some(close) = find_closing_delimiter(yaml_start) else {
        return (None, raw);
    };

    let yaml = &yaml_start[..close];
    let after_close = &yaml_start[close + 3..];
    let body = after_close
        .strip_prefix("\r\n")
        .or_else(|| after_close.strip_prefix('\n'))
        .unwrap_or(after_close);

    (Some(yaml), body)
}

/// Byte offset of a `---` line in `s`.
fn find_closing_delimiter(s: &str) -> Option<usize> {
    let mut pos = 0;
    for line in s.split_inclusive('\n') {
        if line.trim_end_matches(['\n', '\r']) == "---" {
            return Some(pos);
        }
        pos += line.len();
    }
    None
}

/// Parse frontmatter YAML into document metadata.
///
/// Malformed YAML is an error rather than "no metadata": writing links
/// back would otherwise replace whatever the author had there.
pub fn parse_metadata(yaml: &str) -> Result<Metadata> {
    if yaml.trim().is_empty() {
        return Ok(Metadata::new());
    }
    let value: serde_yaml::Value =
        serde_yaml::from_str(yaml).context("invalid YAML frontmatter")?;
    match value {
        serde_yaml::Value::Mapping(_) => {
            serde_json::from_value(serde_json::to_value(&value)?)
                .context("frontmatter keys must be strings")
        }
        serde_yaml::Value::Null => Ok(Metadata::new()),
        _ => bail!("frontmatter must be a mapping"),
    }
}

/// Build a [`Document`] from a file's raw content.
pub fn parse_document(path: &str, raw: &str) -> Result<Document> {
    let (yaml, body) = split_frontmatter(raw);
    let metadata = match yaml {
        Some(yaml) => parse_metadata(yaml).with_context(|| format!("in {}", path))?,
        None => Metadata::new(),
    };
    Ok(Document::new(path, body, metadata))
}

/// Render a document back to file content. Documents without metadata
/// are written without a frontmatter block.
pub fn render_document(document: &Document) -> Result<String> {
    if document.metadata().is_empty() {
        return Ok(document.content().to_string());
    }
    let yaml = serde_yaml::to_string(document.metadata())
        .with_context(|| format!("failed to serialize frontmatter for {}", document.path()))?;
    Ok(format!("---\n{}---\n{}", yaml, document.content()))
}
