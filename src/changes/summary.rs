//! Delta classification and rendering

use super::OperationKind;
use crate::text::{Content, Delta};

/// Compact description of one notification's delta
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeltaSummary {
    pub operation: OperationKind,
    /// Plain retain count before the first substantive entry
    pub position: usize,
    /// Inserted + deleted + re-formatted UTF-16 units
    pub length: usize,
    /// Human-readable rendering, not a reapplicable format
    pub rendered: String,
}

impl DeltaSummary {
    /// Summary of a notification carrying no changes
    pub fn initial() -> Self {
        Self {
            operation: OperationKind::Initial,
            position: 0,
            length: 0,
            rendered: String::new(),
        }
    }
}

/// Classify an entry list by the kinds of substantive entries it holds.
///
/// Plain retains only move the cursor and are ignored; a retain carrying
/// attributes is a change of its own.
pub fn classify(delta: &[Delta]) -> OperationKind {
    let (mut inserts, mut deletes, mut formats) = (false, false, false);

    for entry in delta {
        match entry {
            Delta::Insert { .. } => inserts = true,
            Delta::Delete(_) => deletes = true,
            Delta::Retain {
                attributes: Some(_),
                ..
            } => formats = true,
            Delta::Retain {
                attributes: None, ..
            } => {}
        }
    }

    match (inserts, deletes, formats) {
        (false, false, false) => OperationKind::Initial,
        (true, false, false) => OperationKind::Insert,
        (false, true, false) => OperationKind::Delete,
        _ => OperationKind::Mixed,
    }
}

/// Classify, locate, size and render a delta.
///
/// # Errors
///
/// Fails only if an inserted embed or attribute set cannot be rendered as JSON.
pub fn summarize_delta(delta: &[Delta]) -> Result<DeltaSummary, serde_json::Error> {
    let operation = classify(delta);
    if operation == OperationKind::Initial {
        return Ok(DeltaSummary::initial());
    }

    let position: usize = delta
        .iter()
        .take_while(|entry| entry.is_plain_retain())
        .map(|entry| match entry {
            Delta::Retain { len, .. } => *len,
            _ => 0,
        })
        .sum();

    let mut length = 0;
    let mut rendered = String::new();

    for entry in delta {
        match entry {
            Delta::Insert { content, .. } => {
                length += content.len();
                match content {
                    Content::Text(text) => rendered.push_str(&serde_json::to_string(text)?),
                    Content::Embed(value) => rendered.push_str(&serde_json::to_string(value)?),
                }
            }
            Delta::Delete(count) => {
                length += count;
                rendered.push_str(&format!("[deleted {} characters]", count));
            }
            Delta::Retain {
                len,
                attributes: Some(attributes),
            } => {
                length += len;
                rendered.push_str(&format!(
                    "[formatted {} characters: {}]",
                    len,
                    serde_json::to_string(attributes)?
                ));
            }
            Delta::Retain {
                attributes: None, ..
            } => {}
        }
    }

    Ok(DeltaSummary {
        operation,
        position,
        length,
        rendered,
    })
}
