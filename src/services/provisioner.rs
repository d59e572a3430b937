use crate::domain::{ContainerEngine, ContainerInfo, Protocol, ServiceSpec, ServiceState};
use crate::error::{ProvisionError, ProvisionResult};
use std::net::{Ipv4Addr, SocketAddr, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Warm-up used after a start when nothing else is configured
pub const DEFAULT_WARMUP: Duration = Duration::from_secs(15);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// How to decide a freshly started service is usable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Blind pause after the start
    FixedDelay(Duration),
    /// Connect to every published TCP port until it accepts, at most `attempts` times each.
    ///
    /// Opt-in only: this changes timing relative to the fixed warm-up and a
    /// port accepting connections does not always mean the service inside
    /// has finished starting. A service without published TCP ports gets
    /// the `fallback` pause instead.
    TcpProbe {
        interval: Duration,
        attempts: u32,
        fallback: Duration,
    },
}

impl Default for Readiness {
    fn default() -> Self {
        Self::FixedDelay(DEFAULT_WARMUP)
    }
}

/// What a successful [`Provisioner::ensure_service`] had to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    /// Image pulled, container created and started
    Created,
    /// Existing stopped container started
    Started,
    AlreadyRunning,
}

type Sleeper = Arc<dyn Fn(Duration) + Send + Sync>;

/// Makes sure a service container exists and is running before the caller proceeds.
///
/// Every call re-derives the state from the engine; nothing is cached between
/// calls. Engine failures are returned as-is: no retry, no cleanup. Two
/// concurrent calls for the same name are not coordinated, and the slower one
/// may fail at create time.
pub struct Provisioner {
    engine: Arc<dyn ContainerEngine>,
    readiness: Readiness,
    sleeper: Sleeper,
}

impl Provisioner {
    pub fn new(engine: Arc<dyn ContainerEngine>) -> Self {
        Self {
            engine,
            readiness: Readiness::default(),
            sleeper: Arc::new(thread::sleep),
        }
    }

    pub fn with_readiness(mut self, readiness: Readiness) -> Self {
        self.readiness = readiness;
        self
    }

    /// Replaces the blocking pause used for warm-up and probe intervals
    pub fn with_sleeper<F>(mut self, sleeper: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.sleeper = Arc::new(sleeper);
        self
    }

    /// Current state of the service's container, straight from the engine
    pub fn state(&self, spec: &ServiceSpec) -> ProvisionResult<ServiceState> {
        Ok(self
            .find(spec)?
            .map(|c| c.state())
            .unwrap_or(ServiceState::Absent))
    }

    /// Pulls, creates and starts the container as needed, then waits for readiness.
    ///
    /// Order is strictly list, then pull and create when absent, then start,
    /// then wait. A running container is left untouched and returns at once.
    pub fn ensure_service(&self, spec: &ServiceSpec) -> ProvisionResult<EnsureOutcome> {
        let name = spec.name();

        let outcome = match self.find(spec)? {
            Some(container) if container.running => {
                debug!("{name} já está rodando ({})", container.id);
                return Ok(EnsureOutcome::AlreadyRunning);
            }
            Some(container) => {
                info!("Iniciando {name}...");
                self.engine.start_container(&container.id)?;
                EnsureOutcome::Started
            }
            None => {
                info!("Baixando imagem {}...", spec.image());
                self.engine.pull_image(spec.image())?;

                info!("Criando container {name}...");
                let id = self.engine.create_container(spec)?;
                info!("{name} container criado ({id})");

                self.engine.start_container(&id)?;
                EnsureOutcome::Created
            }
        };

        self.wait_until_ready(spec)?;
        info!("{name} container iniciado");

        Ok(outcome)
    }

    fn find(&self, spec: &ServiceSpec) -> ProvisionResult<Option<ContainerInfo>> {
        let name = spec.name();
        let containers = self.engine.list_containers(name, true)?;

        let (matching, others): (Vec<_>, Vec<_>) =
            containers.into_iter().partition(|c| c.has_name(name));
        if !others.is_empty() {
            debug!(
                "Ignorando {} container(s) com nome parecido com {name}",
                others.len()
            );
        }

        Ok(matching.into_iter().next())
    }

    fn wait_until_ready(&self, spec: &ServiceSpec) -> ProvisionResult<()> {
        match self.readiness {
            Readiness::FixedDelay(delay) => {
                self.warm_up(spec.name(), delay);
                Ok(())
            }
            Readiness::TcpProbe {
                interval,
                attempts,
                fallback,
            } => {
                let tcp_ports: Vec<u16> = spec
                    .ports()
                    .iter()
                    .filter(|(port, _)| port.protocol == Protocol::Tcp)
                    .map(|(_, host)| *host)
                    .collect();

                if tcp_ports.is_empty() {
                    warn!(
                        "{} não publica portas TCP; usando espera fixa",
                        spec.name()
                    );
                    self.warm_up(spec.name(), fallback);
                    return Ok(());
                }

                for port in tcp_ports {
                    self.probe_port(spec.name(), port, interval, attempts)?;
                }
                Ok(())
            }
        }
    }

    fn warm_up(&self, name: &str, delay: Duration) {
        if delay.is_zero() {
            return;
        }
        info!("Aguardando {}s para {name} aquecer...", delay.as_secs_f32());
        (self.sleeper)(delay);
    }

    fn probe_port(
        &self,
        name: &str,
        port: u16,
        interval: Duration,
        attempts: u32,
    ) -> ProvisionResult<()> {
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
        let attempts = attempts.max(1);

        info!("Aguardando {name} aceitar conexões em {addr}...");
        for attempt in 1..=attempts {
            match TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT) {
                Ok(_) => {
                    debug!("{addr} respondeu na tentativa {attempt}");
                    return Ok(());
                }
                Err(e) => debug!("{addr} ainda indisponível ({attempt}/{attempts}): {e}"),
            }

            if attempt < attempts {
                (self.sleeper)(interval);
            }
        }

        Err(ProvisionError::ReadinessTimeout {
            name: name.to_string(),
            port,
            attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ContainerPort, ImageRef};
    use crate::test_support::{MockEngine, RecordingSleeper};
    use std::net::TcpListener;

    fn db1() -> ServiceSpec {
        ServiceSpec::new("db1", ImageRef::new("vendor/db", "1.0"))
            .with_env("ACCEPT_EULA", "Y")
            .with_port(ContainerPort::tcp(5432), 15432)
    }

    fn create_test_provisioner() -> (Provisioner, Arc<MockEngine>, RecordingSleeper) {
        let mock = Arc::new(MockEngine::new());
        let sleeper = RecordingSleeper::new();
        let recorder = sleeper.clone();
        let provisioner =
            Provisioner::new(mock.clone()).with_sleeper(move |d| recorder.pause(d));
        (provisioner, mock, sleeper)
    }

    #[test]
    fn test_absent_pulls_creates_starts_in_order() {
        let (provisioner, mock, sleeper) = create_test_provisioner();

        let outcome = provisioner.ensure_service(&db1()).unwrap();

        assert_eq!(outcome, EnsureOutcome::Created);
        assert_eq!(
            mock.get_commands(),
            vec!["list:db1", "pull:vendor/db:1.0", "create:db1", "start:mock-1"]
        );
        assert_eq!(sleeper.pauses(), vec![DEFAULT_WARMUP]);
        assert_eq!(mock.get_state("db1"), ServiceState::Running);
    }

    #[test]
    fn test_created_container_gets_env_and_ports() {
        let (provisioner, mock, _) = create_test_provisioner();
        provisioner.ensure_service(&db1()).unwrap();

        assert_eq!(mock.created_spec("db1"), Some(db1()));
    }

    #[test]
    fn test_stopped_is_only_started() {
        let (provisioner, mock, sleeper) = create_test_provisioner();
        let id = mock.add_container("db1", ServiceState::Stopped).unwrap();

        let outcome = provisioner.ensure_service(&db1()).unwrap();

        assert_eq!(outcome, EnsureOutcome::Started);
        assert_eq!(mock.mutations(), vec![format!("start:{id}")]);
        assert_eq!(sleeper.pauses(), vec![DEFAULT_WARMUP]);
    }

    #[test]
    fn test_running_is_untouched_and_not_delayed() {
        let (provisioner, mock, sleeper) = create_test_provisioner();
        mock.add_container("db1", ServiceState::Running);

        let outcome = provisioner.ensure_service(&db1()).unwrap();

        assert_eq!(outcome, EnsureOutcome::AlreadyRunning);
        assert!(mock.mutations().is_empty());
        assert!(sleeper.pauses().is_empty());
    }

    #[test]
    fn test_similar_name_does_not_count_as_existing() {
        let (provisioner, mock, _) = create_test_provisioner();
        mock.add_container("db1-replica", ServiceState::Running);

        assert_eq!(provisioner.state(&db1()).unwrap(), ServiceState::Absent);
        let outcome = provisioner.ensure_service(&db1()).unwrap();

        assert_eq!(outcome, EnsureOutcome::Created);
        assert_eq!(mock.container_count("db1"), 1);
        assert_eq!(mock.get_state("db1-replica"), ServiceState::Running);
    }

    #[test]
    fn test_state_reflects_engine() {
        let (provisioner, mock, _) = create_test_provisioner();
        assert_eq!(provisioner.state(&db1()).unwrap(), ServiceState::Absent);

        mock.add_container("db1", ServiceState::Stopped);
        assert_eq!(provisioner.state(&db1()).unwrap(), ServiceState::Stopped);
    }

    #[test]
    fn test_list_failure_stops_everything() {
        let (provisioner, mock, sleeper) = create_test_provisioner();
        mock.set_fail_on("list");

        let err = provisioner.ensure_service(&db1()).unwrap_err();

        assert!(matches!(err, ProvisionError::ListQueryFailed { .. }));
        assert!(mock.mutations().is_empty());
        assert!(sleeper.pauses().is_empty());
    }

    #[test]
    fn test_pull_failure_skips_create() {
        let (provisioner, mock, _) = create_test_provisioner();
        mock.set_fail_on("pull");

        let err = provisioner.ensure_service(&db1()).unwrap_err();

        assert!(matches!(err, ProvisionError::ImagePullFailed { .. }));
        assert_eq!(mock.mutations(), vec!["pull:vendor/db:1.0"]);
    }

    #[test]
    fn test_create_failure_skips_start() {
        let (provisioner, mock, _) = create_test_provisioner();
        mock.set_fail_on("create");

        let err = provisioner.ensure_service(&db1()).unwrap_err();

        assert!(matches!(err, ProvisionError::ContainerCreateFailed { .. }));
        assert_eq!(mock.mutations(), vec!["pull:vendor/db:1.0", "create:db1"]);
    }

    #[test]
    fn test_fixed_delay_is_configurable() {
        let (provisioner, _, sleeper) = create_test_provisioner();
        let provisioner =
            provisioner.with_readiness(Readiness::FixedDelay(Duration::from_secs(3)));

        provisioner.ensure_service(&db1()).unwrap();

        assert_eq!(sleeper.pauses(), vec![Duration::from_secs(3)]);
    }

    #[test]
    fn test_zero_delay_skips_pause() {
        let (provisioner, _, sleeper) = create_test_provisioner();
        let provisioner = provisioner.with_readiness(Readiness::FixedDelay(Duration::ZERO));

        provisioner.ensure_service(&db1()).unwrap();

        assert!(sleeper.pauses().is_empty());
    }

    #[test]
    fn test_tcp_probe_succeeds_when_port_accepts() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let spec = ServiceSpec::new("db1", ImageRef::new("vendor/db", "1.0"))
            .with_port(ContainerPort::tcp(5432), port);

        let (provisioner, _, sleeper) = create_test_provisioner();
        let provisioner = provisioner.with_readiness(Readiness::TcpProbe {
            interval: Duration::from_millis(500),
            attempts: 5,
            fallback: DEFAULT_WARMUP,
        });

        assert_eq!(
            provisioner.ensure_service(&spec).unwrap(),
            EnsureOutcome::Created
        );
        assert!(sleeper.pauses().is_empty());
    }

    #[test]
    fn test_tcp_probe_times_out_on_closed_port() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let spec = ServiceSpec::new("db1", ImageRef::new("vendor/db", "1.0"))
            .with_port(ContainerPort::tcp(5432), port);

        let (provisioner, mock, sleeper) = create_test_provisioner();
        let provisioner = provisioner.with_readiness(Readiness::TcpProbe {
            interval: Duration::from_millis(500),
            attempts: 3,
            fallback: DEFAULT_WARMUP,
        });

        let err = provisioner.ensure_service(&spec).unwrap_err();

        assert_eq!(
            err,
            ProvisionError::ReadinessTimeout {
                name: "db1".into(),
                port,
                attempts: 3,
            }
        );
        assert_eq!(sleeper.pauses(), vec![Duration::from_millis(500); 2]);
        // The container stays running; only readiness failed.
        assert_eq!(mock.get_state("db1"), ServiceState::Running);
    }

    #[test]
    fn test_tcp_probe_without_ports_falls_back_to_warmup() {
        let spec = ServiceSpec::new("cache", ImageRef::new("redis", "7"));
        let (provisioner, _, sleeper) = create_test_provisioner();
        let provisioner = provisioner.with_readiness(Readiness::TcpProbe {
            interval: Duration::from_secs(1),
            attempts: 3,
            fallback: DEFAULT_WARMUP,
        });

        provisioner.ensure_service(&spec).unwrap();

        assert_eq!(sleeper.pauses(), vec![DEFAULT_WARMUP]);
    }

    #[test]
    fn test_tcp_fallback_uses_configured_pause() {
        let spec = ServiceSpec::new("cache", ImageRef::new("redis", "7"));
        let (provisioner, _, sleeper) = create_test_provisioner();
        let provisioner = provisioner.with_readiness(Readiness::TcpProbe {
            interval: Duration::from_secs(1),
            attempts: 3,
            fallback: Duration::from_secs(5),
        });

        provisioner.ensure_service(&spec).unwrap();

        assert_eq!(sleeper.pauses(), vec![Duration::from_secs(5)]);
    }

    #[test]
    fn test_tcp_fallback_of_zero_skips_pause() {
        let spec = ServiceSpec::new("cache", ImageRef::new("redis", "7"));
        let (provisioner, _, sleeper) = create_test_provisioner();
        let provisioner = provisioner.with_readiness(Readiness::TcpProbe {
            interval: Duration::from_secs(1),
            attempts: 3,
            fallback: Duration::ZERO,
        });

        provisioner.ensure_service(&spec).unwrap();

        assert!(sleeper.pauses().is_empty());
    }
}
