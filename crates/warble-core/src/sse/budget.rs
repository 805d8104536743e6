//! Code-point reply budget.

/// Running count of code points already relayed in one session.
///
/// The ceiling is measured in Unicode code points: one logical character
/// counts once whether it encodes to one byte or four. Clipping never
/// splits a character, so every emitted prefix is valid text.
#[derive(Debug, Clone)]
pub struct ReplyBudget {
    limit: usize,
    used: usize,
}

impl ReplyBudget {
    /// Reply ceiling for companion chat sessions.
    pub const DEFAULT_LIMIT: usize = 120;

    pub fn new(limit: usize) -> Self {
        Self { limit, used: 0 }
    }

    /// Clip `token` to the remaining allowance and account for it.
    ///
    /// Returns the longest prefix that fits, measured in code points; the
    /// empty string once the budget is spent.
    pub fn clip<'a>(&mut self, token: &'a str) -> &'a str {
        let room = self.limit.saturating_sub(self.used);
        if room == 0 {
            return "";
        }
        let mut taken = 0;
        let mut end = token.len();
        for (idx, _) in token.char_indices() {
            if taken == room {
                end = idx;
                break;
            }
            taken += 1;
        }
        self.used += taken;
        &token[..end]
    }

    pub fn used(&self) -> usize {
        self.used
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn exhausted(&self) -> bool {
        self.used >= self.limit
    }
}

impl Default for ReplyBudget {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::ReplyBudget;

    #[test]
    fn token_within_budget_passes_unmodified() {
        let mut budget = ReplyBudget::new(10);
        assert_eq!(budget.clip("hello"), "hello");
        assert_eq!(budget.used(), 5);
    }

    #[test]
    fn token_clipped_at_remaining_room() {
        let mut budget = ReplyBudget::new(3);
        assert_eq!(budget.clip("abcdef"), "abc");
        assert_eq!(budget.used(), 3);
        assert!(budget.exhausted());
    }

    #[test]
    fn exhausted_budget_returns_empty() {
        let mut budget = ReplyBudget::new(2);
        assert_eq!(budget.clip("ab"), "ab");
        assert_eq!(budget.clip("more"), "");
        assert_eq!(budget.clip(""), "");
        assert_eq!(budget.used(), 2);
    }

    #[test]
    fn wide_characters_count_once() {
        // Three code points, nine encoded bytes.
        let mut budget = ReplyBudget::new(120);
        assert_eq!(budget.clip("你好吗"), "你好吗");
        assert_eq!(budget.used(), 3);
    }

    #[test]
    fn clip_never_splits_a_character() {
        let mut budget = ReplyBudget::new(2);
        let out = budget.clip("a🦀b");
        assert_eq!(out, "a🦀");
        assert_eq!(budget.used(), 2);
        // Round-trips: the prefix is valid UTF-8 by construction.
        assert_eq!(String::from_utf8(out.as_bytes().to_vec()).unwrap(), "a🦀");
    }

    #[test]
    fn used_is_monotonic_and_capped() {
        let mut budget = ReplyBudget::new(7);
        let mut previous = 0;
        for token in ["ab", "", "cde", "fghij", "k", "🦀🦀🦀"] {
            budget.clip(token);
            assert!(budget.used() >= previous);
            assert!(budget.used() <= budget.limit());
            previous = budget.used();
        }
        assert_eq!(budget.used(), 7);
    }
}
