//! Errors surfaced while provisioning a service container.
//!
//! Every variant is fatal to the caller: the provisioner never retries,
//! downgrades or cleans up after one of these.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProvisionError {
    #[error("Engine '{engine}' inacessível: {reason}")]
    EngineUnreachable { engine: String, reason: String },

    #[error("Falha ao baixar imagem {image}: {reason}")]
    ImagePullFailed { image: String, reason: String },

    #[error("Falha ao criar container {name}: {reason}")]
    ContainerCreateFailed { name: String, reason: String },

    #[error("Falha ao iniciar container {id}: {reason}")]
    ContainerStartFailed { id: String, reason: String },

    #[error("Falha ao listar containers com nome {name}: {reason}")]
    ListQueryFailed { name: String, reason: String },

    #[error("Serviço {name} não aceitou conexões na porta {port} após {attempts} tentativa(s)")]
    ReadinessTimeout {
        name: String,
        port: u16,
        attempts: u32,
    },
}

pub type ProvisionResult<T> = Result<T, ProvisionError>;
