//! Fault magnitudes attached to endpoints and services.

pub mod clamp;
pub mod endpoint;
pub mod service;

pub use endpoint::{EndpointFault, EndpointFaultInput};
pub use service::{ServiceFault, ServiceFaultInput};
