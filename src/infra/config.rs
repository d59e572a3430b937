use crate::domain::{ContainerPort, ImageRef, ServiceSpec, validate_service_name};
use crate::infra::cli_engine::DEFAULT_ENGINE;
use crate::services::{DEFAULT_WARMUP, Readiness};
use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_NAME: &str = "stagehand.toml";
pub const DEFAULT_CONFIG_TOML: &str = include_str!("../../config/default_stagehand.toml");

const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_PROBE_ATTEMPTS: u32 = 30;

pub fn default_config_path() -> PathBuf {
    PathBuf::from(DEFAULT_CONFIG_NAME)
}

/// Expands a leading `~` the way a shell would
pub fn expand_path(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path.to_string_lossy().as_ref()).into_owned())
}

#[derive(Deserialize, Debug, Default)]
pub struct EngineConfig {
    pub binary: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReadinessStrategy {
    Delay,
    Tcp,
}

#[derive(Deserialize, Debug, Default)]
pub struct ReadinessConfig {
    pub strategy: Option<ReadinessStrategy>,
    pub warmup: Option<String>,
    pub interval: Option<String>,
    pub attempts: Option<u32>,
}

/// One `[services.NAME]` table
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub image: String,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// `"1433/tcp" = 14330`
    #[serde(default)]
    pub ports: BTreeMap<String, u16>,
}

impl ServiceConfig {
    pub fn to_spec(&self, name: &str) -> Result<ServiceSpec> {
        validate_service_name(name)?;

        if self.image.trim().is_empty() {
            bail!("Serviço '{name}' sem campo 'image'");
        }
        let image = self
            .image
            .parse::<ImageRef>()
            .with_context(|| format!("imagem do serviço '{name}'"))?;

        let mut spec = ServiceSpec::new(name, image);
        for (key, value) in &self.env {
            spec = spec.with_env(key, value);
        }
        for (container_port, host_port) in &self.ports {
            let container_port = container_port
                .parse::<ContainerPort>()
                .with_context(|| format!("portas do serviço '{name}'"))?;
            spec = spec.with_port(container_port, *host_port);
        }

        Ok(spec)
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub readiness: ReadinessConfig,
    #[serde(default)]
    pub services: BTreeMap<String, ServiceConfig>,
}

impl AppConfig {
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn engine_binary(&self) -> &str {
        self.engine.binary.as_deref().unwrap_or(DEFAULT_ENGINE)
    }

    /// `warmup` is the fixed pause, or the fallback for services without TCP ports
    pub fn readiness(&self) -> Result<Readiness> {
        let cfg = &self.readiness;
        let warmup = match &cfg.warmup {
            Some(s) => parse_duration(s).context("readiness.warmup")?,
            None => DEFAULT_WARMUP,
        };

        match cfg.strategy.unwrap_or(ReadinessStrategy::Delay) {
            ReadinessStrategy::Delay => Ok(Readiness::FixedDelay(warmup)),
            ReadinessStrategy::Tcp => {
                let interval = match &cfg.interval {
                    Some(s) => parse_duration(s).context("readiness.interval")?,
                    None => DEFAULT_PROBE_INTERVAL,
                };
                let attempts = cfg.attempts.unwrap_or(DEFAULT_PROBE_ATTEMPTS);
                if attempts == 0 {
                    bail!("readiness.attempts deve ser maior que zero");
                }
                Ok(Readiness::TcpProbe {
                    interval,
                    attempts,
                    fallback: warmup,
                })
            }
        }
    }

    /// Validated specs, ordered by service name
    pub fn services(&self) -> Result<Vec<ServiceSpec>> {
        self.services
            .iter()
            .map(|(name, service)| service.to_spec(name))
            .collect()
    }
}

pub fn load_app_config(path: &Path) -> Result<AppConfig> {
    let path = expand_path(path);
    if !path.exists() {
        bail!(
            "{:?} não encontrado. Rode 'stagehand init' para criar um.",
            path
        );
    }

    let content = fs::read_to_string(&path).with_context(|| format!("lendo {:?}", path))?;
    AppConfig::parse(&content).with_context(|| format!("parse de {:?}", path))
}

/// Writes the commented template; returns false when a file is already there
pub fn install_default_config(path: &Path) -> Result<bool> {
    let path = expand_path(path);
    if path.exists() {
        return Ok(false);
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("criando {:?}", parent))?;
    }
    fs::write(&path, DEFAULT_CONFIG_TOML)
        .with_context(|| format!("escrevendo template em {:?}", path))?;

    Ok(true)
}

/// Accepts `500ms`, `15s` or `2m`
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    if let Some(stripped) = s.strip_suffix("ms") {
        let millis: u64 = stripped.trim().parse()?;
        Ok(Duration::from_millis(millis))
    } else if let Some(stripped) = s.strip_suffix('s') {
        let secs: u64 = stripped.trim().parse()?;
        Ok(Duration::from_secs(secs))
    } else if let Some(stripped) = s.strip_suffix('m') {
        let mins: u64 = stripped.trim().parse()?;
        let secs = mins
            .checked_mul(60)
            .ok_or_else(|| anyhow!("Duração muito grande: {}", s))?;
        Ok(Duration::from_secs(secs))
    } else {
        Err(anyhow!("Formato de duração inválido: {}", s))
    }
}
