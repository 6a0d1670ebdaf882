//! Message grammar definitions
//!
//! The controller firmware emits free-text status lines. A grammar pins down
//! the exact phrases this monitor reacts to, so a firmware wording change is a
//! new grammar version rather than a silent mismatch.

use serde::{Deserialize, Serialize};

/// A versioned set of message templates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageGrammar {
    /// Short identifier (e.g., "v1")
    pub id: String,
    /// Human-readable description
    pub description: String,
    /// Phrase that clears every area
    pub reset_phrase: String,
    /// Phrase immediately followed by the decimal area number
    pub alarm_prefix: String,
}

impl MessageGrammar {
    #[cfg(test)]
    pub fn new(id: &str, reset_phrase: &str, alarm_prefix: &str) -> Self {
        Self {
            id: id.to_string(),
            description: String::new(),
            reset_phrase: reset_phrase.to_string(),
            alarm_prefix: alarm_prefix.to_string(),
        }
    }

    /// Length of the longest template, used to size buffer limits
    pub fn longest_template(&self) -> usize {
        self.reset_phrase.len().max(self.alarm_prefix.len())
    }

    /// Format an alarm message as the controller would send it
    pub fn alarm_message(&self, area: usize) -> String {
        format!("{}{}", self.alarm_prefix, area)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_longest_template() {
        let grammar = MessageGrammar::new("t", "reset", "alarm in zone ");
        assert_eq!(grammar.longest_template(), "alarm in zone ".len());
    }

    #[test]
    fn test_alarm_message() {
        let grammar = MessageGrammar::new("t", "reset", "zone ");
        assert_eq!(grammar.alarm_message(12), "zone 12");
    }
}
