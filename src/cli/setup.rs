use crate::infra::config::{expand_path, install_default_config};
use anyhow::Result;
use std::path::Path;
use tracing::info;

pub fn install(config_path: &Path) -> Result<()> {
    if install_default_config(config_path)? {
        info!(
            "Config criado em {:?}. Ajuste os serviços conforme necessário.",
            expand_path(config_path)
        );
    } else {
        info!("{:?} já existe; nada a fazer", expand_path(config_path));
    }

    Ok(())
}
