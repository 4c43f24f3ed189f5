//! Term resolution: free-text labels to vocabulary terms.
//!
//! Each label is matched against the stored labels of its category exactly
//! as written. `"Foo"` and `"foo"` therefore become two distinct terms, even
//! though [`crate::fingerprint`] later folds both to the same key.

use anyhow::Result;
use tracing::debug;

use crate::models::{Term, TermCategory, TermId};
use crate::store::TermStore;

/// Get-or-create resolver over a [`TermStore`].
pub struct TermResolver<'a, S: TermStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: TermStore + ?Sized> TermResolver<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Resolve `labels` to terms, creating any that do not exist yet.
    ///
    /// The output has the same length and order as `labels`. Repeated labels
    /// are resolved one at a time, so a label seen twice yields the same term
    /// twice (the first occurrence creates it, the second finds it).
    pub async fn resolve_terms(&self, labels: &[String], category: TermCategory) -> Result<Vec<Term>> {
        let mut terms = Vec::with_capacity(labels.len());
        for label in labels {
            let existing = self.store.find_terms(category, label).await?;
            let term = match existing.into_iter().next() {
                Some(term) => term,
                None => {
                    let term = self.store.create_term(category, label).await?;
                    debug!(category = %category, label = %label, id = %term.id, "created term");
                    term
                }
            };
            terms.push(term);
        }
        Ok(terms)
    }

    /// Like [`resolve_terms`](Self::resolve_terms), returning only the ids.
    pub async fn resolve(&self, labels: &[String], category: TermCategory) -> Result<Vec<TermId>> {
        Ok(self
            .resolve_terms(labels, category)
            .await?
            .into_iter()
            .map(|t| t.id)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryStore;

    fn labels(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_unseen_label_creates_one_term() {
        let store = InMemoryStore::new();
        let resolver = TermResolver::new(&store);

        let ids = resolver
            .resolve(&labels(&["rust"]), TermCategory::Tag)
            .await
            .unwrap();
        assert_eq!(ids.len(), 1);
        assert_eq!(store.term_count(TermCategory::Tag), 1);
    }

    #[tokio::test]
    async fn test_same_label_resolves_to_same_id() {
        let store = InMemoryStore::new();
        let resolver = TermResolver::new(&store);

        let first = resolver.resolve(&labels(&["rust"]), TermCategory::Tag).await.unwrap();
        let second = resolver.resolve(&labels(&["rust"]), TermCategory::Tag).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(store.term_count(TermCategory::Tag), 1);
    }

    #[tokio::test]
    async fn test_different_case_creates_distinct_term() {
        // Term identity is case-sensitive while fingerprints are not.
        let store = InMemoryStore::new();
        let resolver = TermResolver::new(&store);

        let upper = resolver.resolve(&labels(&["Foo"]), TermCategory::Tag).await.unwrap();
        let lower = resolver.resolve(&labels(&["foo"]), TermCategory::Tag).await.unwrap();
        assert_ne!(upper, lower);
        assert_eq!(store.term_count(TermCategory::Tag), 2);
    }

    #[tokio::test]
    async fn test_order_preserved_and_duplicates_kept() {
        let store = InMemoryStore::new();
        let resolver = TermResolver::new(&store);

        let terms = resolver
            .resolve_terms(&labels(&["b", "a", "b"]), TermCategory::Agent)
            .await
            .unwrap();
        let got: Vec<&str> = terms.iter().map(|t| t.label.as_str()).collect();
        assert_eq!(got, vec!["b", "a", "b"]);
        assert_eq!(terms[0].id, terms[2].id);
        assert_eq!(store.term_count(TermCategory::Agent), 2);
    }

    #[tokio::test]
    async fn test_categories_are_separate() {
        let store = InMemoryStore::new();
        let resolver = TermResolver::new(&store);

        let tag = resolver.resolve(&labels(&["ops"]), TermCategory::Tag).await.unwrap();
        let agent = resolver.resolve(&labels(&["ops"]), TermCategory::Agent).await.unwrap();
        assert_ne!(tag, agent);
        assert_eq!(store.term_count(TermCategory::Tag), 1);
        assert_eq!(store.term_count(TermCategory::Agent), 1);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let store = InMemoryStore::new();
        let resolver = TermResolver::new(&store);
        let ids = resolver.resolve(&[], TermCategory::Tag).await.unwrap();
        assert!(ids.is_empty());
    }
}
