use crate::domain::{
    ContainerEngine, ContainerId, ContainerInfo, ImageRef, ServiceSpec, ServiceState,
};
use crate::error::{ProvisionError, ProvisionResult};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct MockContainer {
    pub id: ContainerId,
    pub name: String,
    pub running: bool,
    pub spec: Option<ServiceSpec>,
}

/// In-memory engine recording every call as `op:arg`.
///
/// The name filter matches by substring, like docker's unanchored `name=`
/// filter, so callers must do their own exact matching.
#[derive(Debug)]
pub struct MockEngine {
    containers: RwLock<Vec<MockContainer>>,
    commands: RwLock<Vec<String>>,
    fail_on: RwLock<Option<String>>,
    next_id: AtomicUsize,
}

impl MockEngine {
    pub fn new() -> Self {
        Self {
            containers: RwLock::new(Vec::new()),
            commands: RwLock::new(Vec::new()),
            fail_on: RwLock::new(None),
            next_id: AtomicUsize::new(1),
        }
    }

    /// Seeds a container that existed before the test; `Absent` is ignored
    pub fn add_container(&self, name: &str, state: ServiceState) -> Option<ContainerId> {
        let running = match state {
            ServiceState::Absent => return None,
            ServiceState::Stopped => false,
            ServiceState::Running => true,
        };
        let id = self.allocate_id();
        self.containers.write().unwrap().push(MockContainer {
            id: id.clone(),
            name: name.to_string(),
            running,
            spec: None,
        });
        Some(id)
    }

    /// Fails the next and every later call of `operation` (`list`, `pull`, `create`, `start`, `available`)
    pub fn set_fail_on(&self, operation: &str) {
        *self.fail_on.write().unwrap() = Some(operation.to_string());
    }

    pub fn clear_fail_on(&self) {
        *self.fail_on.write().unwrap() = None;
    }

    pub fn get_commands(&self) -> Vec<String> {
        self.commands.read().unwrap().clone()
    }

    /// Commands that change engine state
    pub fn mutations(&self) -> Vec<String> {
        self.get_commands()
            .into_iter()
            .filter(|c| !c.starts_with("list:"))
            .collect()
    }

    pub fn get_state(&self, name: &str) -> ServiceState {
        self.containers
            .read()
            .unwrap()
            .iter()
            .find(|c| c.name == name)
            .map(|c| {
                if c.running {
                    ServiceState::Running
                } else {
                    ServiceState::Stopped
                }
            })
            .unwrap_or(ServiceState::Absent)
    }

    pub fn container_count(&self, name: &str) -> usize {
        self.containers
            .read()
            .unwrap()
            .iter()
            .filter(|c| c.name == name)
            .count()
    }

    pub fn created_spec(&self, name: &str) -> Option<ServiceSpec> {
        self.containers
            .read()
            .unwrap()
            .iter()
            .find(|c| c.name == name)
            .and_then(|c| c.spec.clone())
    }

    fn allocate_id(&self) -> ContainerId {
        ContainerId::new(format!("mock-{}", self.next_id.fetch_add(1, Ordering::SeqCst)))
    }

    fn record_command(&self, cmd: String) {
        self.commands.write().unwrap().push(cmd);
    }

    fn fails(&self, operation: &str) -> bool {
        self.fail_on.read().unwrap().as_deref() == Some(operation)
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerEngine for MockEngine {
    fn list_containers(&self, name: &str, all: bool) -> ProvisionResult<Vec<ContainerInfo>> {
        self.record_command(format!("list:{name}"));
        if self.fails("list") {
            return Err(ProvisionError::ListQueryFailed {
                name: name.to_string(),
                reason: "Mock failure on: list".into(),
            });
        }

        Ok(self
            .containers
            .read()
            .unwrap()
            .iter()
            .filter(|c| c.name.contains(name))
            .filter(|c| all || c.running)
            .map(|c| ContainerInfo {
                id: c.id.clone(),
                names: vec![format!("/{}", c.name)],
                running: c.running,
            })
            .collect())
    }

    fn pull_image(&self, image: &ImageRef) -> ProvisionResult<()> {
        self.record_command(format!("pull:{image}"));
        if self.fails("pull") {
            return Err(ProvisionError::ImagePullFailed {
                image: image.to_string(),
                reason: "Mock failure on: pull".into(),
            });
        }
        Ok(())
    }

    fn create_container(&self, spec: &ServiceSpec) -> ProvisionResult<ContainerId> {
        self.record_command(format!("create:{}", spec.name()));
        if self.fails("create") {
            return Err(ProvisionError::ContainerCreateFailed {
                name: spec.name().to_string(),
                reason: "Mock failure on: create".into(),
            });
        }

        // Name check and insert under one lock, like the engine's unique-name constraint.
        let mut containers = self.containers.write().unwrap();
        if containers.iter().any(|c| c.name == spec.name()) {
            return Err(ProvisionError::ContainerCreateFailed {
                name: spec.name().to_string(),
                reason: format!("the container name \"{}\" is already in use", spec.name()),
            });
        }

        let id = self.allocate_id();
        containers.push(MockContainer {
            id: id.clone(),
            name: spec.name().to_string(),
            running: false,
            spec: Some(spec.clone()),
        });
        Ok(id)
    }

    fn start_container(&self, id: &ContainerId) -> ProvisionResult<()> {
        self.record_command(format!("start:{id}"));
        if self.fails("start") {
            return Err(ProvisionError::ContainerStartFailed {
                id: id.to_string(),
                reason: "Mock failure on: start".into(),
            });
        }

        let mut containers = self.containers.write().unwrap();
        match containers.iter_mut().find(|c| &c.id == id) {
            Some(container) => {
                container.running = true;
                Ok(())
            }
            None => Err(ProvisionError::ContainerStartFailed {
                id: id.to_string(),
                reason: "no such container".into(),
            }),
        }
    }

    fn is_available(&self) -> bool {
        !self.fails("available")
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Records requested pauses instead of blocking the test thread
#[derive(Debug, Clone, Default)]
pub struct RecordingSleeper {
    pauses: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pause(&self, duration: Duration) {
        self.pauses.lock().unwrap().push(duration);
    }

    pub fn pauses(&self) -> Vec<Duration> {
        self.pauses.lock().unwrap().clone()
    }

    pub fn total(&self) -> Duration {
        self.pauses().into_iter().sum()
    }
}
