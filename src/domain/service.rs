use anyhow::{Result, anyhow, bail};
use std::collections::BTreeMap;
use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};
use std::str::FromStr;

/// Image reference split into repository and tag, as the engine's pull API expects
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub repository: String,
    pub tag: String,
}

impl ImageRef {
    pub fn new(repository: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            tag: tag.into(),
        }
    }
}

impl FromStr for ImageRef {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            bail!("Referência de imagem vazia");
        }

        // Only a ':' after the last '/' separates the tag; earlier ones belong to a registry port.
        let last_slash = s.rfind('/').map(|i| i + 1).unwrap_or(0);
        match s[last_slash..].rfind(':') {
            Some(offset) => {
                let split = last_slash + offset;
                let (repo, tag) = (&s[..split], &s[split + 1..]);
                if repo.is_empty() || tag.is_empty() {
                    bail!("Referência de imagem inválida: {s}");
                }
                Ok(Self::new(repo, tag))
            }
            None => Ok(Self::new(s, "latest")),
        }
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repository, self.tag)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Protocol {
    Tcp,
    Udp,
    Sctp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
            Self::Sctp => "sctp",
        })
    }
}

/// Port inside the container, e.g. `1433/tcp`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContainerPort {
    pub port: u16,
    pub protocol: Protocol,
}

impl ContainerPort {
    pub fn tcp(port: u16) -> Self {
        Self {
            port,
            protocol: Protocol::Tcp,
        }
    }
}

impl FromStr for ContainerPort {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (port, protocol) = match s.trim().split_once('/') {
            Some((port, proto)) => (port, proto),
            None => (s.trim(), "tcp"),
        };

        let port: u16 = port
            .parse()
            .map_err(|_| anyhow!("Porta inválida '{s}'"))?;
        let protocol = match protocol.to_ascii_lowercase().as_str() {
            "tcp" => Protocol::Tcp,
            "udp" => Protocol::Udp,
            "sctp" => Protocol::Sctp,
            other => bail!("Protocolo desconhecido '{other}' em '{s}'"),
        };

        Ok(Self { port, protocol })
    }
}

impl fmt::Display for ContainerPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.port, self.protocol)
    }
}

/// A containerized dependency the caller wants available before proceeding.
///
/// The name is the only identity: at most one container with this name is
/// ever created, no matter how many times the spec is ensured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSpec {
    name: String,
    image: ImageRef,
    env: BTreeMap<String, String>,
    ports: BTreeMap<ContainerPort, u16>,
}

impl ServiceSpec {
    pub fn new(name: impl Into<String>, image: ImageRef) -> Self {
        Self {
            name: name.into(),
            image,
            env: BTreeMap::new(),
            ports: BTreeMap::new(),
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_port(mut self, container_port: ContainerPort, host_port: u16) -> Self {
        self.ports.insert(container_port, host_port);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn image(&self) -> &ImageRef {
        &self.image
    }

    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    pub fn ports(&self) -> &BTreeMap<ContainerPort, u16> {
        &self.ports
    }

    /// `KEY=VALUE` pairs in key order
    pub fn env_pairs(&self) -> Vec<String> {
        self.env.iter().map(|(k, v)| format!("{k}={v}")).collect()
    }

    /// Host address a connection string should use to reach `container_port`
    pub fn host_endpoint(&self, container_port: ContainerPort) -> Option<SocketAddr> {
        self.ports
            .get(&container_port)
            .map(|host| SocketAddr::from((Ipv4Addr::LOCALHOST, *host)))
    }
}

/// Container name restrictions shared by podman and docker
pub fn validate_service_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        bail!("Nome de serviço vazio encontrado");
    }

    let first_char = name.chars().next().unwrap_or(' ');
    if !first_char.is_ascii_alphanumeric() {
        bail!("Nome de serviço '{name}' deve começar com letra ou número");
    }

    if let Some(c) = name
        .chars()
        .find(|c| !c.is_ascii_alphanumeric() && !matches!(*c, '_' | '.' | '-'))
    {
        bail!("Nome de serviço '{name}' contém caractere inválido '{c}'");
    }

    Ok(())
}
