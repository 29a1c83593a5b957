//! Stable ID newtypes for workspace entities.
//!
//! Top-level block stacks and procedure definitions are addressed by
//! [`BlockId`]; listeners registered on a workspace are addressed by
//! [`ListenerId`]. Both wrap a `u32` so the two cannot be confused.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identifier of a top-level block (a statement stack or a
/// procedure definition) inside a workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId(pub u32);

/// Handle returned when subscribing to workspace change notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListenerId(pub u32);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_id_display() {
        assert_eq!(format!("{}", BlockId(7)), "7");
    }

    #[test]
    fn listener_id_display() {
        assert_eq!(format!("{}", ListenerId(3)), "3");
    }

    #[test]
    fn block_id_serializes_as_plain_number() {
        let json = serde_json::to_string(&BlockId(42)).unwrap();
        assert_eq!(json, "42");
        let back: BlockId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, BlockId(42));
    }
}
