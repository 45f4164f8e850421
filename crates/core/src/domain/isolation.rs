// Transaction Isolation Levels

use serde::{Deserialize, Serialize};

/// SQL-style isolation level requested at `begin`.
///
/// Engines that have no notion of isolation (e.g. the in-memory reference
/// engine) may ignore it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl Default for IsolationLevel {
    fn default() -> Self {
        IsolationLevel::ReadCommitted
    }
}

impl std::fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IsolationLevel::ReadUncommitted => write!(f, "READ_UNCOMMITTED"),
            IsolationLevel::ReadCommitted => write!(f, "READ_COMMITTED"),
            IsolationLevel::RepeatableRead => write!(f, "REPEATABLE_READ"),
            IsolationLevel::Serializable => write!(f, "SERIALIZABLE"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_read_committed() {
        assert_eq!(IsolationLevel::default(), IsolationLevel::ReadCommitted);
    }

    #[test]
    fn test_serde_screaming_snake_case() {
        let json = serde_json::to_string(&IsolationLevel::RepeatableRead).unwrap();
        assert_eq!(json, "\"REPEATABLE_READ\"");

        let level: IsolationLevel = serde_json::from_str("\"SERIALIZABLE\"").unwrap();
        assert_eq!(level, IsolationLevel::Serializable);
    }

    #[test]
    fn test_display_matches_serde() {
        assert_eq!(IsolationLevel::ReadUncommitted.to_string(), "READ_UNCOMMITTED");
    }
}
