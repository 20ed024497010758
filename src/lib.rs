pub mod config;
pub mod fault;
pub mod logging;
pub mod plan;

pub use fault::{EndpointFault, ServiceFault};
pub use plan::{Coercion, FaultPlan, LoadedPlan};
