use std::collections::HashMap;

/// Round-robin rotation scoped to (office, exact competing pool).
///
/// The key includes the ordered manager id tuple, so a changed pool (say a
/// different top-2 after load movements) starts a fresh rotation: fairness
/// applies to the currently competing managers, not to a global history.
/// Counters live as long as the ledger; nothing is persisted.
#[derive(Debug, Default)]
pub struct RoundRobinLedger {
    counters: HashMap<(i64, Vec<i64>), usize>,
}

impl RoundRobinLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the counter for this exact pool and return the winning id.
    pub fn next(&mut self, office_id: i64, pool: &[i64]) -> i64 {
        let key = (office_id, pool.to_vec());
        let index = match self.counters.get(&key) {
            Some(previous) => (previous + 1) % pool.len(),
            None => 0,
        };
        self.counters.insert(key, index);
        pool[index]
    }
}
