use std::fmt;

/// Lifecycle state of a service container, derived from the engine on every call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Absent,
    Stopped,
    Running,
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Absent => "absent",
            Self::Stopped => "stopped",
            Self::Running => "running",
        };
        f.write_str(label)
    }
}

/// Opaque identifier assigned by the container engine
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerId(String);

impl ContainerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One row of the engine's container listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInfo {
    pub id: ContainerId,
    pub names: Vec<String>,
    pub running: bool,
}

impl ContainerInfo {
    /// Exact name comparison. Docker reports names with a leading `/`.
    pub fn has_name(&self, name: &str) -> bool {
        self.names
            .iter()
            .any(|n| n.strip_prefix('/').unwrap_or(n) == name)
    }

    pub fn state(&self) -> ServiceState {
        if self.running {
            ServiceState::Running
        } else {
            ServiceState::Stopped
        }
    }
}
