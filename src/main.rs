use anyhow::Result;
use clap::{Parser, Subcommand};
use stagehand::ServiceState;
use stagehand::cli::{Session, setup};
use stagehand::infra::config::default_config_path;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "stagehand",
    about = "Sobe os containers de serviço que os testes de integração precisam"
)]
struct Cli {
    /// Arquivo de configuração (default: ./stagehand.toml)
    #[arg(long, env = "STAGEHAND_CONFIG", default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Binário do engine ("podman" ou "docker"); sobrescreve [engine] do config
    #[arg(long, env = "STAGEHAND_ENGINE")]
    engine: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Garante que os serviços existem, estão rodando e aquecidos
    Ensure {
        /// Serviços a garantir (default: todos)
        services: Vec<String>,
    },
    /// Mostra o estado de cada serviço sem alterar nada
    Status { services: Vec<String> },
    /// Cria um stagehand.toml de exemplo
    Init,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init => setup::install(&cli.config),
        Commands::Ensure { services } => {
            let session = Session::load(&cli.config, cli.engine.as_deref())?;
            session.ensure(&services)?;
            Ok(())
        }
        Commands::Status { services } => {
            let session = Session::load(&cli.config, cli.engine.as_deref())?;
            let mut missing = false;

            println!("Status dos serviços:");
            for (name, state) in session.status(&services)? {
                let label = match state {
                    ServiceState::Running => "rodando",
                    ServiceState::Stopped => "parado",
                    ServiceState::Absent => {
                        missing = true;
                        "não criado"
                    }
                };
                println!("- {:<16} | {}", name, label);
            }

            if missing {
                println!("Há serviços ausentes. Rode 'stagehand ensure'.");
            }
            Ok(())
        }
    }
}
