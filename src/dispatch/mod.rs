pub mod engine;
pub mod fairness;
pub mod filters;

use serde::Serialize;

use crate::types::Assignment;

pub use engine::Dispatcher;
pub use fairness::RoundRobinLedger;
pub use filters::{eligible_managers, fired_filter_notes, VIP_SKILL};

/// Outcome of one dispatch run: created assignments plus a diagnostic line
/// for every ticket that could not be routed.
#[derive(Debug, Default, Serialize)]
pub struct DispatchReport {
    pub assignments: Vec<Assignment>,
    pub failures: Vec<String>,
}

impl DispatchReport {
    pub fn assigned_count(&self) -> usize {
        self.assignments.len()
    }
}
