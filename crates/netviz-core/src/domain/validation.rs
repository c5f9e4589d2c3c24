//! Local validation that runs before anything is sent to the backend.

use thiserror::Error;

use super::tree::Forest;

/// Longest label accepted, in characters.
pub const MAX_LABEL_LEN: usize = 50;

/// Reasons a label edit is rejected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LabelError {
    #[error("label must not be empty")]
    Empty,
    #[error("label is {len} characters long, the limit is {max}")]
    TooLong { len: usize, max: usize },
}

/// Reasons a parent change is rejected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReparentError {
    #[error("node not found: {0}")]
    UnknownNode(String),
    #[error("new parent not found: {0}")]
    UnknownParent(String),
    #[error("a node cannot be its own parent: {0}")]
    SelfParent(String),
    #[error("the sentinel root cannot be moved")]
    SentinelImmovable,
    #[error("cannot move {node} under its own descendant {parent}")]
    WouldCreateCycle { node: String, parent: String },
}

/// Validates a label and returns it trimmed.
///
/// # Errors
///
/// [`LabelError::Empty`] for empty or whitespace-only input,
/// [`LabelError::TooLong`] for more than [`MAX_LABEL_LEN`] characters.
pub fn validate_label(label: &str) -> Result<&str, LabelError> {
    let trimmed = label.trim();
    if trimmed.is_empty() {
        return Err(LabelError::Empty);
    }
    let len = trimmed.chars().count();
    if len > MAX_LABEL_LEN {
        return Err(LabelError::TooLong {
            len,
            max: MAX_LABEL_LEN,
        });
    }
    Ok(trimmed)
}

/// Checks that `node` may be re-attached under `new_parent`.
///
/// Every operation that changes a parent goes through this check, so a cycle
/// can never be introduced from the client side.
///
/// # Errors
///
/// See [`ReparentError`].
pub fn validate_reparent(forest: &Forest, node: &str, new_parent: &str) -> Result<(), ReparentError> {
    let slot = forest
        .slot_of(node)
        .ok_or_else(|| ReparentError::UnknownNode(node.to_string()))?;
    if node == new_parent {
        return Err(ReparentError::SelfParent(node.to_string()));
    }
    if forest.sentinel() == Some(slot) {
        return Err(ReparentError::SentinelImmovable);
    }
    let parent_slot = forest
        .slot_of(new_parent)
        .ok_or_else(|| ReparentError::UnknownParent(new_parent.to_string()))?;
    if forest.is_ancestor(slot, parent_slot) {
        return Err(ReparentError::WouldCreateCycle {
            node: node.to_string(),
            parent: new_parent.to_string(),
        });
    }
    Ok(())
}
