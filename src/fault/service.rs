use serde::{Deserialize, Serialize};

use super::clamp::non_negative;

/// Degradation applied to a whole service: how many replicas to treat as
/// unavailable. Only non-negativity is enforced; the count may exceed the
/// replicas that actually exist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "ServiceFaultInput")]
pub struct ServiceFault {
    reduced_replica_count: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceFaultInput {
    pub reduced_replica_count: f64,
}

impl ServiceFault {
    pub fn new(reduced_replica_count: f64) -> Self {
        Self { reduced_replica_count: non_negative(reduced_replica_count) }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn reduced_replica_count(&self) -> f64 {
        self.reduced_replica_count
    }

    pub fn set_reduced_replica_count(&mut self, v: f64) {
        self.reduced_replica_count = non_negative(v);
    }

    pub fn is_noop(&self) -> bool {
        self.reduced_replica_count == 0.0
    }
}

impl From<ServiceFaultInput> for ServiceFault {
    fn from(input: ServiceFaultInput) -> Self {
        Self::new(input.reduced_replica_count)
    }
}
