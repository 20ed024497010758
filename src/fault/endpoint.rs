use serde::{Deserialize, Serialize};

use super::clamp::{non_negative, percent};

/// Degradation applied to a single endpoint.
///
/// Every magnitude is clamped on the way in, so a value read back is always
/// in range: latency, request count and multiplier are `>= 0`, the error rate
/// is within `0..=100`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "EndpointFaultInput")]
pub struct EndpointFault {
    increase_latency: f64,
    increase_error_rate_percent: f64,
    increase_request_count: f64,
    request_multiplier: f64,
}

/// Unvalidated magnitudes as a caller or a plan file supplies them.
/// Missing fields default to 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EndpointFaultInput {
    pub increase_latency: f64,
    pub increase_error_rate_percent: f64,
    pub increase_request_count: f64,
    pub request_multiplier: f64,
}

impl EndpointFault {
    pub fn new(
        increase_latency: f64,
        increase_error_rate_percent: f64,
        increase_request_count: f64,
        request_multiplier: f64,
    ) -> Self {
        Self {
            increase_latency: non_negative(increase_latency),
            increase_error_rate_percent: percent(increase_error_rate_percent),
            increase_request_count: non_negative(increase_request_count),
            request_multiplier: non_negative(request_multiplier),
        }
    }

    /// The no-op fault.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_increase_latency(mut self, v: f64) -> Self {
        self.set_increase_latency(v);
        self
    }

    pub fn with_increase_error_rate_percent(mut self, v: f64) -> Self {
        self.set_increase_error_rate_percent(v);
        self
    }

    pub fn with_increase_request_count(mut self, v: f64) -> Self {
        self.set_increase_request_count(v);
        self
    }

    pub fn with_request_multiplier(mut self, v: f64) -> Self {
        self.set_request_multiplier(v);
        self
    }

    pub fn increase_latency(&self) -> f64 {
        self.increase_latency
    }

    pub fn set_increase_latency(&mut self, v: f64) {
        self.increase_latency = non_negative(v);
    }

    pub fn increase_error_rate_percent(&self) -> f64 {
        self.increase_error_rate_percent
    }

    pub fn set_increase_error_rate_percent(&mut self, v: f64) {
        self.increase_error_rate_percent = percent(v);
    }

    pub fn increase_request_count(&self) -> f64 {
        self.increase_request_count
    }

    pub fn set_increase_request_count(&mut self, v: f64) {
        self.increase_request_count = non_negative(v);
    }

    pub fn request_multiplier(&self) -> f64 {
        self.request_multiplier
    }

    pub fn set_request_multiplier(&mut self, v: f64) {
        self.request_multiplier = non_negative(v);
    }

    /// Error rate as a probability in `0.0..=1.0`.
    pub fn error_probability(&self) -> f64 {
        self.increase_error_rate_percent / 100.0
    }

    pub fn is_noop(&self) -> bool {
        self.increase_latency == 0.0
            && self.increase_error_rate_percent == 0.0
            && self.increase_request_count == 0.0
            && self.request_multiplier == 0.0
    }
}

impl From<EndpointFaultInput> for EndpointFault {
    fn from(input: EndpointFaultInput) -> Self {
        Self::new(
            input.increase_latency,
            input.increase_error_rate_percent,
            input.increase_request_count,
            input.request_multiplier,
        )
    }
}
