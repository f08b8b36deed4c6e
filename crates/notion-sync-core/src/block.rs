//! Typed page content.
//!
//! A page body is an ordered `Vec<Block>`. Each variant carries only the
//! fields its kind needs; text-bearing variants hold [`RichText`], an ordered
//! list of styled spans.

use serde::{Deserialize, Serialize};

/// One styled run of text.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TextSpan {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default)]
    pub code: bool,
}

impl TextSpan {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn link(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            link: Some(url.into()),
            ..Default::default()
        }
    }
}

/// Ordered sequence of spans making up one block's text.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RichText(pub Vec<TextSpan>);

impl RichText {
    pub fn plain(text: impl Into<String>) -> Self {
        RichText(vec![TextSpan::plain(text)])
    }

    pub fn spans(&self) -> &[TextSpan] {
        &self.0
    }

    /// Concatenated text of all spans, without styling.
    pub fn to_plain_text(&self) -> String {
        self.0.iter().map(|s| s.text.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|s| s.text.is_empty())
    }
}

impl From<Vec<TextSpan>> for RichText {
    fn from(spans: Vec<TextSpan>) -> Self {
        RichText(spans)
    }
}

/// A single unit of remote page content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Block {
    Paragraph {
        text: RichText,
    },
    /// Levels are clamped to `1..=3`.
    Heading {
        level: u8,
        text: RichText,
    },
    BulletedListItem {
        text: RichText,
    },
    NumberedListItem {
        text: RichText,
    },
    ToDo {
        text: RichText,
        checked: bool,
    },
    Quote {
        text: RichText,
    },
    Code {
        language: String,
        text: String,
    },
    Callout {
        text: RichText,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        icon: Option<String>,
    },
    Image {
        url: String,
        #[serde(default)]
        caption: RichText,
    },
    Divider,
    Table {
        has_header: bool,
        rows: Vec<Vec<RichText>>,
    },
}

impl Block {
    pub fn paragraph(text: impl Into<String>) -> Self {
        Block::Paragraph {
            text: RichText::plain(text),
        }
    }

    pub fn heading(level: u8, text: impl Into<String>) -> Self {
        Block::Heading {
            level: level.clamp(1, 3),
            text: RichText::plain(text),
        }
    }

    /// Snake-case kind name, matching the remote block type names.
    pub fn kind(&self) -> &'static str {
        match self {
            Block::Paragraph { .. } => "paragraph",
            Block::Heading { level: 1, .. } => "heading_1",
            Block::Heading { level: 2, .. } => "heading_2",
            Block::Heading { .. } => "heading_3",
            Block::BulletedListItem { .. } => "bulleted_list_item",
            Block::NumberedListItem { .. } => "numbered_list_item",
            Block::ToDo { .. } => "to_do",
            Block::Quote { .. } => "quote",
            Block::Code { .. } => "code",
            Block::Callout { .. } => "callout",
            Block::Image { .. } => "image",
            Block::Divider => "divider",
            Block::Table { .. } => "table",
        }
    }
}
