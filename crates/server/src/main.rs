//! Ratline server binary.
//!
//! Binds the listener, spawns the accept loop, and hands the terminal to the
//! operator console.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use protocol::Identity;
use server::config::Config;
use server::console::Console;
use server::listener;
use server::registry::Registry;

const BANNER: &str = r#"
            _   _ _
   _ __ __ _| |_| (_)_ __   ___
  | '__/ _` | __| | | '_ \ / _ \
  | |  | (_| | |_| | | | | |  __/
  |_|   \__,_|\__|_|_|_| |_|\___|
"#;

/// Ratline server - accepts agent connections and runs the operator console.
#[derive(Parser, Debug)]
#[command(name = "ratline-server")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Port to listen on (overrides the config file)
    #[arg(short, long)]
    port: Option<u16>,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };
    config.apply_env_overrides();
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    config.validate()?;

    // Logs go to a rolling file under the data dir; stdout belongs to the
    // console.
    let log_dir = config.server.data_dir.join("logs");
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("failed to create log directory {}", log_dir.display()))?;
    let (log_writer, _log_guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(&log_dir, "ratline.log"));
    let filter = if cli.verbose {
        "debug".to_string()
    } else {
        config.server.log_level.clone()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter.as_str())
        .with_writer(log_writer)
        .with_ansi(false)
        .init();

    let identity = Arc::new(load_or_generate_identity(&config.server.data_dir)?);
    tracing::info!(fingerprint = %identity.fingerprint(), "server identity ready");

    // Bind before printing anything; a taken port is fatal up front.
    let listener = listener::bind(config.server.port)
        .with_context(|| format!("failed to bind port {}", config.server.port))?;

    println!("{BANNER}");

    let registry = Arc::new(Registry::new());
    listener::spawn(listener, Arc::clone(&registry), identity, &config);
    println!(
        "ratline server listening for connections on port {}.",
        config.server.port
    );

    Console::new(registry).run().await
}

/// Loads the persisted server identity, generating and saving one on first
/// run.
fn load_or_generate_identity(data_dir: &Path) -> anyhow::Result<Identity> {
    let path = data_dir.join("identity.key");
    if path.exists() {
        let bytes = std::fs::read(&path)
            .with_context(|| format!("failed to read identity file {}", path.display()))?;
        Ok(Identity::from_bytes(&bytes)?)
    } else {
        let identity = Identity::generate()?;
        std::fs::create_dir_all(data_dir)?;
        std::fs::write(&path, identity.to_bytes())
            .with_context(|| format!("failed to write identity file {}", path.display()))?;
        tracing::info!("generated new server identity");
        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_debug_assert() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults_leave_port_to_config() {
        let cli = Cli::try_parse_from(["ratline-server"]).unwrap();
        assert!(cli.port.is_none());
        assert!(cli.config.is_none());
        assert!(!cli.verbose);
    }

    #[test]
    fn port_flag_parses() {
        let cli = Cli::try_parse_from(["ratline-server", "--port", "9001"]).unwrap();
        assert_eq!(cli.port, Some(9001));

        let cli = Cli::try_parse_from(["ratline-server", "-p", "4444"]).unwrap();
        assert_eq!(cli.port, Some(4444));
    }

    #[test]
    fn config_flag_parses() {
        let cli =
            Cli::try_parse_from(["ratline-server", "--config", "/etc/ratline.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/etc/ratline.toml")));
    }

    #[test]
    fn verbose_flag_parses() {
        let cli = Cli::try_parse_from(["ratline-server", "-v"]).unwrap();
        assert!(cli.verbose);
    }

    #[test]
    fn invalid_port_fails() {
        assert!(Cli::try_parse_from(["ratline-server", "--port", "99999"]).is_err());
    }

    #[test]
    fn identity_persists_across_loads() {
        let dir = tempfile::tempdir().unwrap();

        let first = load_or_generate_identity(dir.path()).unwrap();
        assert!(dir.path().join("identity.key").exists());

        let second = load_or_generate_identity(dir.path()).unwrap();
        assert_eq!(first.fingerprint(), second.fingerprint());
    }

    #[test]
    fn corrupt_identity_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("identity.key"), b"short").unwrap();

        assert!(load_or_generate_identity(dir.path()).is_err());
    }
}
