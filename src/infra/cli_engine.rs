use crate::domain::{ContainerEngine, ContainerId, ContainerInfo, ImageRef, ServiceSpec};
use crate::error::{ProvisionError, ProvisionResult};
use std::ffi::OsStr;
use std::io;
use std::process::{Command, Output, Stdio};
use tracing::debug;

pub const DEFAULT_ENGINE: &str = "podman";

const LIST_FORMAT: &str = "{{.ID}}\t{{.Names}}\t{{.State}}";

/// Drives a Docker-compatible command line (`podman` or `docker`)
#[derive(Debug, Clone)]
pub struct CliEngine {
    binary: String,
}

impl CliEngine {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Runs the engine and returns trimmed stdout, or the failure reason
    fn run<I, S>(&self, args: I) -> Result<String, Failure>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let args: Vec<_> = args
            .into_iter()
            .map(|item| item.as_ref().to_os_string())
            .collect();
        debug!("{} {:?}", self.binary, args);

        let output = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| self.spawn_failure(e))?;

        self.check(output)
    }

    fn spawn_failure(&self, err: io::Error) -> Failure {
        Failure::Unreachable(format!("não foi possível executar '{}': {err}", self.binary))
    }

    fn check(&self, output: Output) -> Result<String, Failure> {
        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).trim().to_string());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let reason = if stderr.is_empty() {
            format!("{} retornou status {:?}", self.binary, output.status)
        } else {
            stderr
        };

        if is_daemon_unreachable(&reason) {
            Err(Failure::Unreachable(reason))
        } else {
            Err(Failure::Command(reason))
        }
    }

    fn unreachable(&self, reason: String) -> ProvisionError {
        ProvisionError::EngineUnreachable {
            engine: self.binary.clone(),
            reason,
        }
    }
}

impl Default for CliEngine {
    fn default() -> Self {
        Self::new(DEFAULT_ENGINE)
    }
}

enum Failure {
    Unreachable(String),
    Command(String),
}

impl ContainerEngine for CliEngine {
    fn list_containers(&self, name: &str, all: bool) -> ProvisionResult<Vec<ContainerInfo>> {
        let filter = format!("name=^{name}$");
        let mut args = vec!["ps", "--no-trunc"];
        if all {
            args.push("--all");
        }
        args.extend(["--filter", filter.as_str(), "--format", LIST_FORMAT]);

        match self.run(args) {
            Ok(stdout) => Ok(parse_listing(&stdout)),
            Err(Failure::Unreachable(reason)) => Err(self.unreachable(reason)),
            Err(Failure::Command(reason)) => Err(ProvisionError::ListQueryFailed {
                name: name.to_string(),
                reason,
            }),
        }
    }

    fn pull_image(&self, image: &ImageRef) -> ProvisionResult<()> {
        let reference = image.to_string();
        match self.run(["pull", reference.as_str()]) {
            Ok(_) => Ok(()),
            Err(Failure::Unreachable(reason)) => Err(self.unreachable(reason)),
            Err(Failure::Command(reason)) => Err(ProvisionError::ImagePullFailed {
                image: reference,
                reason,
            }),
        }
    }

    fn create_container(&self, spec: &ServiceSpec) -> ProvisionResult<ContainerId> {
        match self.run(create_args(spec)) {
            Ok(stdout) => match stdout.lines().last() {
                Some(id) if !id.trim().is_empty() => Ok(ContainerId::new(id.trim())),
                _ => Err(ProvisionError::ContainerCreateFailed {
                    name: spec.name().to_string(),
                    reason: format!("{} não retornou o id do container", self.binary),
                }),
            },
            Err(Failure::Unreachable(reason)) => Err(self.unreachable(reason)),
            Err(Failure::Command(reason)) => Err(ProvisionError::ContainerCreateFailed {
                name: spec.name().to_string(),
                reason,
            }),
        }
    }

    fn start_container(&self, id: &ContainerId) -> ProvisionResult<()> {
        match self.run(["start", id.as_str()]) {
            Ok(_) => Ok(()),
            Err(Failure::Unreachable(reason)) => Err(self.unreachable(reason)),
            Err(Failure::Command(reason)) => Err(ProvisionError::ContainerStartFailed {
                id: id.to_string(),
                reason,
            }),
        }
    }

    fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn name(&self) -> &str {
        self.binary()
    }
}

fn create_args(spec: &ServiceSpec) -> Vec<String> {
    let mut args: Vec<String> = vec!["create".into(), "--name".into(), spec.name().into()];

    for pair in spec.env_pairs() {
        args.push("-e".into());
        args.push(pair);
    }

    for (container_port, host_port) in spec.ports() {
        args.push("-p".into());
        args.push(format!("{host_port}:{container_port}"));
    }

    args.push(spec.image().to_string());
    args
}

/// Parses `ID\tNAMES\tSTATE` rows; unparseable lines are skipped.
///
/// Only `running` (or an `Up ...` status that is not paused) counts as
/// running. `paused`, `restarting` and every other state are reported as
/// stopped, so the provisioner tries a start and the engine's refusal comes
/// back as `ContainerStartFailed`.
fn parse_listing(stdout: &str) -> Vec<ContainerInfo> {
    stdout
        .lines()
        .filter_map(|line| {
            let mut fields = line.split('\t');
            let id = fields.next()?.trim();
            let names = fields.next()?;
            let state = fields.next().unwrap_or("").trim();
            if id.is_empty() {
                return None;
            }

            Some(ContainerInfo {
                id: ContainerId::new(id),
                names: names
                    .split(|c: char| c == ',' || c.is_whitespace())
                    .filter(|n| !n.is_empty())
                    .map(str::to_string)
                    .collect(),
                running: is_running_state(state),
            })
        })
        .collect()
}

fn is_running_state(state: &str) -> bool {
    state.eq_ignore_ascii_case("running")
        || (state.starts_with("Up") && !state.contains("(Paused)"))
}

fn is_daemon_unreachable(stderr: &str) -> bool {
    let lower = stderr.to_ascii_lowercase();
    lower.contains("cannot connect to the docker daemon")
        || lower.contains("unable to connect to podman")
        || lower.contains("error during connect")
}
