//! Delta: the change description emitted with every committed transaction
//!
//! A delta is an ordered list of entries walking the document from the start:
//! - `Retain`: skip over unchanged content (optionally re-formatting it)
//! - `Insert`: new content at the current position
//! - `Delete`: remove content at the current position
//!
//! Deltas are normalized: adjacent entries of the same kind and attributes
//! are merged and a trailing plain retain is dropped.

use crate::util::text_len;
use serde::{Deserialize, Serialize};

/// Formatting attributes attached to inserted or retained content
pub type Attributes = serde_json::Map<String, serde_json::Value>;

/// Inserted content: plain text or a single embedded object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Embed(serde_json::Value),
}

impl Content {
    /// Number of positions this content occupies in the document.
    ///
    /// Text counts UTF-16 code units; an embed occupies one position.
    pub fn len(&self) -> usize {
        match self {
            Content::Text(text) => text_len(text),
            Content::Embed(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Content::Text(text) => text.is_empty(),
            Content::Embed(_) => false,
        }
    }
}

/// A single delta entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Delta {
    Insert {
        content: Content,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attributes: Option<Attributes>,
    },
    Delete(usize),
    Retain {
        len: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attributes: Option<Attributes>,
    },
}

impl Delta {
    /// Plain text insertion without attributes
    pub fn insert(text: impl Into<String>) -> Self {
        Delta::Insert {
            content: Content::Text(text.into()),
            attributes: None,
        }
    }

    /// Plain retain without attributes
    pub fn retain(len: usize) -> Self {
        Delta::Retain {
            len,
            attributes: None,
        }
    }

    /// Retain that applies formatting attributes
    pub fn format(len: usize, attributes: Attributes) -> Self {
        Delta::Retain {
            len,
            attributes: Some(attributes),
        }
    }

    /// True for a retain that carries no attribute change
    pub fn is_plain_retain(&self) -> bool {
        matches!(
            self,
            Delta::Retain {
                attributes: None,
                ..
            }
        )
    }

    fn is_empty(&self) -> bool {
        match self {
            Delta::Insert { content, .. } => content.is_empty(),
            Delta::Delete(len) | Delta::Retain { len, .. } => *len == 0,
        }
    }

    /// Fold `next` into `self` when both are the same kind with equal attributes
    fn absorb(&mut self, next: &Delta) -> bool {
        match (self, next) {
            (Delta::Delete(len), Delta::Delete(more)) => {
                *len += more;
                true
            }
            (
                Delta::Retain { len, attributes },
                Delta::Retain {
                    len: more,
                    attributes: next_attrs,
                },
            ) if attributes == next_attrs => {
                *len += more;
                true
            }
            (
                Delta::Insert {
                    content: Content::Text(text),
                    attributes,
                },
                Delta::Insert {
                    content: Content::Text(more),
                    attributes: next_attrs,
                },
            ) if attributes == next_attrs => {
                text.push_str(more);
                true
            }
            _ => false,
        }
    }
}

/// Merge adjacent entries and drop empty ones and a trailing plain retain
pub fn normalize(entries: impl IntoIterator<Item = Delta>) -> Vec<Delta> {
    let mut normalized: Vec<Delta> = Vec::new();

    for entry in entries {
        if entry.is_empty() {
            continue;
        }
        if let Some(last) = normalized.last_mut() {
            if last.absorb(&entry) {
                continue;
            }
        }
        normalized.push(entry);
    }

    if normalized.last().is_some_and(Delta::is_plain_retain) {
        normalized.pop();
    }
    normalized
}
