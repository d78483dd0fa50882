use crate::errors::CollectorError;
use crate::model::ExecutionResult;
use std::collections::HashSet;

/// Append-only store of per-item results. Items arrive in completion order; readers get
/// them back in corpus (ascending id) order.
#[derive(Debug, Default)]
pub struct ResultCollector {
    results: Vec<ExecutionResult>,
    seen: HashSet<u64>,
}

impl ResultCollector {
    pub fn with_capacity(n: usize) -> Self {
        Self {
            results: Vec::with_capacity(n),
            seen: HashSet::with_capacity(n),
        }
    }

    pub fn append(&mut self, result: ExecutionResult) -> Result<(), CollectorError> {
        if !self.seen.insert(result.id) {
            return Err(CollectorError::Duplicate(result.id));
        }
        self.results.push(result);
        Ok(())
    }

    pub fn contains(&self, id: u64) -> bool {
        self.seen.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Snapshot in ascending id order.
    pub fn sorted(&self) -> Vec<ExecutionResult> {
        let mut v = self.results.clone();
        v.sort_by_key(|r| r.id);
        v
    }

    pub fn into_sorted(mut self) -> Vec<ExecutionResult> {
        self.results.sort_by_key(|r| r.id);
        self.results
    }
}
