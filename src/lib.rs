pub mod cli;
pub mod domain;
pub mod error;
pub mod infra;
pub mod services;

// Make test_support available for integration tests
pub mod test_support;

pub use domain::{
    ContainerEngine, ContainerId, ContainerInfo, ContainerPort, ImageRef, ServiceSpec,
    ServiceState,
};
pub use error::{ProvisionError, ProvisionResult};
pub use infra::CliEngine;
pub use services::{EnsureOutcome, Provisioner, Readiness};
