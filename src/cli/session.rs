use crate::domain::{ContainerEngine, ServiceSpec, ServiceState};
use crate::error::ProvisionError;
use crate::infra::config::{AppConfig, load_app_config};
use crate::infra::CliEngine;
use crate::services::{EnsureOutcome, Provisioner};
use anyhow::{Context, Result, bail};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Configured services bound to a provisioner
pub struct Session {
    services: Vec<ServiceSpec>,
    engine: Arc<dyn ContainerEngine>,
    provisioner: Provisioner,
}

impl Session {
    /// Loads the config file and drives the engine binary it names (or `engine_override`)
    pub fn load(config_path: &Path, engine_override: Option<&str>) -> Result<Self> {
        let config = load_app_config(config_path)?;
        let binary = engine_override.unwrap_or(config.engine_binary()).to_string();
        Self::with_engine(&config, Arc::new(CliEngine::new(binary)))
    }

    pub fn with_engine(config: &AppConfig, engine: Arc<dyn ContainerEngine>) -> Result<Self> {
        let services = config.services()?;
        let provisioner = Provisioner::new(engine.clone()).with_readiness(config.readiness()?);

        Ok(Self {
            services,
            engine,
            provisioner,
        })
    }

    /// Swaps in a provisioner built elsewhere (custom sleeper, readiness)
    pub fn with_provisioner(mut self, provisioner: Provisioner) -> Self {
        self.provisioner = provisioner;
        self
    }

    /// Ensures the selected services one after another, stopping at the first failure
    pub fn ensure(&self, names: &[String]) -> Result<Vec<(String, EnsureOutcome)>> {
        let selected = self.select(names)?;
        if selected.is_empty() {
            warn!("Nenhum serviço configurado");
            return Ok(Vec::new());
        }

        if !self.engine.is_available() {
            return Err(ProvisionError::EngineUnreachable {
                engine: self.engine.name().to_string(),
                reason: "engine não respondeu ao 'version'".into(),
            }
            .into());
        }

        let mut outcomes = Vec::with_capacity(selected.len());
        for spec in selected {
            let outcome = self
                .provisioner
                .ensure_service(spec)
                .with_context(|| format!("garantindo serviço '{}'", spec.name()))?;

            match outcome {
                EnsureOutcome::Created => info!("{} criado e pronto", spec.name()),
                EnsureOutcome::Started => info!("{} iniciado e pronto", spec.name()),
                EnsureOutcome::AlreadyRunning => info!("{} já estava rodando", spec.name()),
            }
            outcomes.push((spec.name().to_string(), outcome));
        }

        Ok(outcomes)
    }

    pub fn status(&self, names: &[String]) -> Result<Vec<(String, ServiceState)>> {
        self.select(names)?
            .into_iter()
            .map(|spec| {
                let state = self
                    .provisioner
                    .state(spec)
                    .with_context(|| format!("consultando serviço '{}'", spec.name()))?;
                Ok((spec.name().to_string(), state))
            })
            .collect()
    }

    fn select(&self, names: &[String]) -> Result<Vec<&ServiceSpec>> {
        if names.is_empty() {
            return Ok(self.services.iter().collect());
        }

        names
            .iter()
            .map(|name| match self.services.iter().find(|s| s.name() == name) {
                Some(spec) => Ok(spec),
                None => bail!("Serviço '{name}' não está listado na configuração"),
            })
            .collect()
    }
}
