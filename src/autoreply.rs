//! Auto-reply matcher — first active rule wins.
//!
//! Rules are loaded from the store on every invocation so a rule added or
//! deactivated by an admin is visible to the very next message.

use std::sync::Arc;

use crate::error::StoreError;
use crate::store::Store;

pub struct AutoReplyMatcher {
    store: Arc<dyn Store>,
}

impl AutoReplyMatcher {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Return the reply of the first active rule (by insertion order) whose
    /// trigger is a case-insensitive substring of `text`, if any.
    pub async fn match_text(&self, text: &str) -> Result<Option<String>, StoreError> {
        let rules = self.store.list_active_auto_replies().await?;
        let lower = text.to_lowercase();

        Ok(rules
            .into_iter()
            .find(|rule| lower.contains(&rule.trigger_text.to_lowercase()))
            .map(|rule| rule.reply_text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LibSqlStore;

    async fn matcher_with_rules(rules: &[(&str, &str)]) -> (Arc<LibSqlStore>, AutoReplyMatcher) {
        let store = Arc::new(LibSqlStore::new_memory().await.unwrap());
        for (trigger, reply) in rules {
            store.add_auto_reply(trigger, reply).await.unwrap();
        }
        (Arc::clone(&store), AutoReplyMatcher::new(store))
    }

    #[tokio::test]
    async fn matches_case_insensitive_substring() {
        let (_, matcher) = matcher_with_rules(&[("hello", "Hi!")]).await;
        assert_eq!(
            matcher.match_text("well HELLO there").await.unwrap(),
            Some("Hi!".to_string())
        );
    }

    #[tokio::test]
    async fn first_inserted_rule_wins_on_tie() {
        let (_, matcher) =
            matcher_with_rules(&[("hello", "first"), ("hello there", "second")]).await;
        assert_eq!(
            matcher.match_text("hello there").await.unwrap(),
            Some("first".to_string())
        );
    }

    #[tokio::test]
    async fn no_match_returns_none() {
        let (_, matcher) = matcher_with_rules(&[("hello", "Hi!")]).await;
        assert_eq!(matcher.match_text("goodbye").await.unwrap(), None);
    }

    #[tokio::test]
    async fn deactivated_rule_is_skipped() {
        let (store, matcher) = matcher_with_rules(&[("hello", "first")]).await;
        let rules = store.list_active_auto_replies().await.unwrap();
        store.deactivate_auto_reply(rules[0].id).await.unwrap();
        store.add_auto_reply("hello", "second").await.unwrap();

        // The deactivated rule must be invisible to the very next invocation.
        assert_eq!(
            matcher.match_text("hello").await.unwrap(),
            Some("second".to_string())
        );
    }
}
