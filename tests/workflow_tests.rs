use anyhow::Result;
use stagehand::cli::Session;
use stagehand::infra::config::load_app_config;
use stagehand::test_support::{MockEngine, RecordingSleeper};
use stagehand::{EnsureOutcome, Provisioner, Readiness, ServiceState};
use std::fs;
use std::sync::Arc;
use std::time::Duration;

const STAGEHAND_TOML: &str = r#"
[engine]
binary = "docker"

[readiness]
strategy = "delay"
warmup = "15s"

[services.databaseEF]
image = "mcr.microsoft.com/mssql/server:2019-CU3-ubuntu-18.04"
env = { SA_PASSWORD = "P@ssW0rd!", ACCEPT_EULA = "Y" }
ports = { "1433/tcp" = 14330 }
"#;

#[test]
fn test_workflow_ensure_then_status() -> Result<()> {
    // 1. Setup Temp Config
    let temp_dir = tempfile::tempdir()?;
    let config_path = temp_dir.path().join("stagehand.toml");
    fs::write(&config_path, STAGEHAND_TOML)?;
    let config = load_app_config(&config_path)?;
    assert_eq!(config.engine_binary(), "docker");

    // 2. Setup Mock Engine with a recording sleeper
    let mock = Arc::new(MockEngine::new());
    let sleeper = RecordingSleeper::new();
    let recorder = sleeper.clone();
    let provisioner = Provisioner::new(mock.clone())
        .with_readiness(config.readiness()?)
        .with_sleeper(move |d| recorder.pause(d));
    let session = Session::with_engine(&config, mock.clone())?.with_provisioner(provisioner);

    // 3. Status before anything exists
    assert_eq!(
        session.status(&[])?,
        vec![("databaseEF".to_string(), ServiceState::Absent)]
    );

    // 4. Ensure creates and warms up once
    let outcomes = session.ensure(&[])?;
    assert_eq!(
        outcomes,
        vec![("databaseEF".to_string(), EnsureOutcome::Created)]
    );
    assert_eq!(sleeper.pauses(), vec![Duration::from_secs(15)]);

    let created = mock
        .created_spec("databaseEF")
        .expect("databaseEF should exist");
    assert_eq!(
        created.env_pairs(),
        vec!["ACCEPT_EULA=Y".to_string(), "SA_PASSWORD=P@ssW0rd!".to_string()]
    );

    // 5. A second run is a no-op
    let outcomes = session.ensure(&["databaseEF".to_string()])?;
    assert_eq!(
        outcomes,
        vec![("databaseEF".to_string(), EnsureOutcome::AlreadyRunning)]
    );
    assert_eq!(sleeper.pauses().len(), 1);
    assert_eq!(mock.container_count("databaseEF"), 1);
    assert_eq!(
        session.status(&[])?,
        vec![("databaseEF".to_string(), ServiceState::Running)]
    );

    Ok(())
}

#[test]
fn test_workflow_tcp_readiness_from_config() -> Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let config_path = temp_dir.path().join("stagehand.toml");
    fs::write(
        &config_path,
        r#"[readiness]
strategy = "tcp"
warmup = "2s"
interval = "10ms"
attempts = 2

[services.pg]
image = "postgres:15"
"#,
    )?;

    let config = load_app_config(&config_path)?;
    assert_eq!(
        config.readiness()?,
        Readiness::TcpProbe {
            interval: Duration::from_millis(10),
            attempts: 2,
            fallback: Duration::from_secs(2),
        }
    );

    // No published ports: falls back to the configured warm-up.
    let mock = Arc::new(MockEngine::new());
    let sleeper = RecordingSleeper::new();
    let recorder = sleeper.clone();
    let provisioner = Provisioner::new(mock.clone())
        .with_readiness(config.readiness()?)
        .with_sleeper(move |d| recorder.pause(d));
    let session = Session::with_engine(&config, mock.clone())?.with_provisioner(provisioner);

    session.ensure(&[])?;

    assert_eq!(sleeper.pauses(), vec![Duration::from_secs(2)]);
    assert_eq!(mock.get_state("pg"), ServiceState::Running);
    Ok(())
}

#[test]
fn test_workflow_invalid_config_is_rejected() -> Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let config_path = temp_dir.path().join("stagehand.toml");
    fs::write(&config_path, "[services.\"bad name\"]\nimage = \"db:1\"\n")?;

    let config = load_app_config(&config_path)?;
    let mock = Arc::new(MockEngine::new());

    assert!(Session::with_engine(&config, mock.clone()).is_err());
    assert!(mock.get_commands().is_empty());
    Ok(())
}
