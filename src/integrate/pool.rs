//! Candidate pool and consumption ledger.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::model::ExternalCandidate;

/// External candidates owned by one integration run.
///
/// Claims go through a single mutex so that, under concurrent scheduling,
/// no candidate is ever assigned to two sections.
#[derive(Debug, Default)]
pub struct CandidatePool {
    candidates: Vec<ExternalCandidate>,
    index: HashMap<u32, usize>,
    claims: Mutex<BTreeMap<u32, usize>>,
}

impl CandidatePool {
    /// Create a pool, rejecting duplicate placeholder numbers.
    pub fn new(candidates: Vec<ExternalCandidate>) -> Result<Self> {
        let mut index = HashMap::with_capacity(candidates.len());
        for (i, candidate) in candidates.iter().enumerate() {
            if index.insert(candidate.placeholder, i).is_some() {
                return Err(Error::DuplicatePlaceholder(candidate.placeholder));
            }
        }
        Ok(Self {
            candidates,
            index,
            claims: Mutex::new(BTreeMap::new()),
        })
    }

    /// Create an empty pool.
    pub fn empty() -> Self {
        Self::default()
    }

    fn ledger(&self) -> std::sync::MutexGuard<'_, BTreeMap<u32, usize>> {
        // A panic while holding the lock cannot leave the map half-written.
        self.claims.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// All candidates, selected or not.
    pub fn candidates(&self) -> &[ExternalCandidate] {
        &self.candidates
    }

    /// Look up a candidate by placeholder.
    pub fn get(&self, placeholder: u32) -> Option<&ExternalCandidate> {
        self.index.get(&placeholder).map(|&i| &self.candidates[i])
    }

    /// All placeholder numbers.
    pub fn placeholders(&self) -> BTreeSet<u32> {
        self.index.keys().copied().collect()
    }

    /// Selected candidates in pool order.
    pub fn selected(&self) -> impl Iterator<Item = &ExternalCandidate> {
        self.candidates.iter().filter(|c| c.selected)
    }

    /// Number of selected candidates.
    pub fn selected_total(&self) -> usize {
        self.selected().count()
    }

    /// Check whether a candidate has been claimed.
    pub fn is_consumed(&self, placeholder: u32) -> bool {
        self.ledger().contains_key(&placeholder)
    }

    /// Selected candidates not yet claimed.
    pub fn unused_selected(&self) -> Vec<&ExternalCandidate> {
        let claims = self.ledger();
        self.selected()
            .filter(|c| !claims.contains_key(&c.placeholder))
            .collect()
    }

    /// Claim a selected, unclaimed candidate for a section.
    pub fn claim(&self, placeholder: u32, section: usize) -> bool {
        let eligible = self.get(placeholder).is_some_and(|c| c.selected);
        if !eligible {
            return false;
        }
        let mut claims = self.ledger();
        if claims.contains_key(&placeholder) {
            return false;
        }
        claims.insert(placeholder, section);
        true
    }

    /// Claim several candidates at once; returns the ones that were granted.
    pub fn claim_all(&self, placeholders: &[u32], section: usize) -> Vec<u32> {
        let mut claims = self.ledger();
        let mut granted = Vec::new();
        for &placeholder in placeholders {
            let eligible = self.get(placeholder).is_some_and(|c| c.selected);
            if eligible && !claims.contains_key(&placeholder) {
                claims.insert(placeholder, section);
                granted.push(placeholder);
            }
        }
        granted
    }

    /// Claim the first candidate in `order` that is still available.
    pub fn claim_first(&self, order: &[u32], section: usize) -> Option<u32> {
        order.iter().copied().find(|&p| self.claim(p, section))
    }

    /// Snapshot of claims: placeholder to section index.
    pub fn claims(&self) -> BTreeMap<u32, usize> {
        self.ledger().clone()
    }

    /// Placeholders claimed so far.
    pub fn claimed(&self) -> HashSet<u32> {
        self.ledger().keys().copied().collect()
    }

    /// Number of claimed candidates.
    pub fn used_count(&self) -> usize {
        self.ledger().len()
    }

    /// Number of candidates in the pool.
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// Check if the pool has no candidates.
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ReferenceMetadata, ReferenceType};
    use std::sync::Arc;

    fn candidate(placeholder: u32, selected: bool) -> ExternalCandidate {
        ExternalCandidate::new(
            placeholder,
            ReferenceMetadata::new(format!("Paper {}", placeholder), vec![]),
            ReferenceType::Method,
        )
        .with_selected(selected)
    }

    #[test]
    fn test_duplicate_placeholder_rejected() {
        let result = CandidatePool::new(vec![candidate(31, true), candidate(31, true)]);
        assert!(matches!(result, Err(Error::DuplicatePlaceholder(31))));
    }

    #[test]
    fn test_claim_once() {
        let pool = CandidatePool::new(vec![candidate(31, true), candidate(32, false)]).unwrap();
        assert!(pool.claim(31, 0));
        assert!(!pool.claim(31, 1));
        assert!(!pool.claim(32, 0), "unselected candidates cannot be claimed");
        assert!(!pool.claim(99, 0));
        assert_eq!(pool.used_count(), 1);
        assert_eq!(pool.claims().get(&31), Some(&0));
    }

    #[test]
    fn test_unused_selected() {
        let pool = CandidatePool::new(vec![
            candidate(31, true),
            candidate(32, true),
            candidate(33, false),
        ])
        .unwrap();
        pool.claim(32, 0);
        let unused: Vec<u32> = pool.unused_selected().iter().map(|c| c.placeholder).collect();
        assert_eq!(unused, vec![31]);
        assert_eq!(pool.selected_total(), 2);
    }

    #[test]
    fn test_claim_all_and_first() {
        let pool = CandidatePool::new(vec![candidate(1, true), candidate(2, true)]).unwrap();
        assert_eq!(pool.claim_all(&[1, 9], 0), vec![1]);
        assert_eq!(pool.claim_first(&[1, 2], 1), Some(2));
        assert_eq!(pool.claim_first(&[1, 2], 2), None);
    }

    #[test]
    fn test_concurrent_claims_are_exclusive() {
        let pool = Arc::new(CandidatePool::new((0..50).map(|p| candidate(p, true)).collect()).unwrap());
        let handles: Vec<_> = (0..8)
            .map(|section| {
                let pool = Arc::clone(&pool);
                std::thread::spawn(move || (0..50).filter(|&p| pool.claim(p, section)).count())
            })
            .collect();
        let total: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(total, 50);
    }
}
