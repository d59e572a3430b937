use super::{ContainerId, ContainerInfo, ImageRef, ServiceSpec};
use crate::error::ProvisionResult;
use std::fmt::Debug;

/// Trait for the container engine operations the provisioner relies on
pub trait ContainerEngine: Send + Sync + Debug {
    /// List containers whose name matches `name`; `all` includes stopped ones
    fn list_containers(&self, name: &str, all: bool) -> ProvisionResult<Vec<ContainerInfo>>;

    /// Pull an image (succeeds when it is already cached)
    fn pull_image(&self, image: &ImageRef) -> ProvisionResult<()>;

    /// Create a stopped container from a spec
    fn create_container(&self, spec: &ServiceSpec) -> ProvisionResult<ContainerId>;

    /// Start a created or stopped container
    fn start_container(&self, id: &ContainerId) -> ProvisionResult<()>;

    /// Check if the engine can be reached at all
    fn is_available(&self) -> bool;

    /// Name used in error messages, e.g. the CLI binary
    fn name(&self) -> &str;
}
