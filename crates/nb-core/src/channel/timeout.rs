//! Per-request response budgets.

use nb_config::ResponseTimeouts;
use std::time::Duration;

/// Decides how long `Channel::send` waits for the sentinel.
pub trait TimeoutPolicy: Send + Sync {
    fn budget(&self, text: &str) -> Duration;
}

/// `min(cap, base + chars / rate)`.
impl TimeoutPolicy for ResponseTimeouts {
    fn budget(&self, text: &str) -> Duration {
        self.budget_for(text.chars().count())
    }
}

/// A fixed budget regardless of input length.
impl TimeoutPolicy for Duration {
    fn budget(&self, _text: &str) -> Duration {
        *self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_grows_then_caps() {
        let policy = ResponseTimeouts::default();
        assert_eq!(policy.budget(&"a".repeat(20)), Duration::from_secs(4));
        assert_eq!(policy.budget(&"a".repeat(40)), Duration::from_secs(5));
        assert_eq!(policy.budget(""), Duration::from_secs(3));
    }

    #[test]
    fn policy_counts_characters_not_bytes() {
        let policy = ResponseTimeouts::default();
        // 20 two-byte characters
        assert_eq!(policy.budget(&"é".repeat(20)), Duration::from_secs(4));
    }

    #[test]
    fn fixed_duration_ignores_text() {
        let fixed = Duration::from_millis(250);
        assert_eq!(fixed.budget("anything at all"), fixed);
    }
}
