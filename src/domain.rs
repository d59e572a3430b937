mod container;
mod service;
pub mod traits;

pub use container::{ContainerId, ContainerInfo, ServiceState};
pub use service::{ContainerPort, ImageRef, Protocol, ServiceSpec, validate_service_name};
pub use traits::ContainerEngine;
