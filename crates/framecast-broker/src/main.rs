//! # framecast-broker
//!
//! Notification broker binary. Loads settings, wires logging, metrics, the
//! App Registration table and the SMS side channel into the broker, then
//! serves HTTP and WebSocket until interrupted.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use framecast_logging::LogFormat;
use framecast_server::auth::AppRegistry;
use framecast_server::sms::{DisabledSmsSender, SmsSender, sender_from_settings};
use framecast_server::{Broker, FramecastServer, ServerConfig};
use framecast_settings::FramecastSettings;

/// Framecast notification broker.
#[derive(Parser, Debug)]
#[command(name = "framecast-broker", about = "Framecast notification broker")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Settings file (default `~/.framecast/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log filter when `RUST_LOG` is unset (overrides settings).
    #[arg(long)]
    log_level: Option<String>,

    /// Emit JSON log lines.
    #[arg(long)]
    log_json: bool,
}

impl Cli {
    fn load_settings(&self) -> Result<FramecastSettings> {
        let path = self
            .config
            .clone()
            .unwrap_or_else(framecast_settings::settings_path);
        let mut settings = framecast_settings::load_settings_from_path(&path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?;
        self.apply(&mut settings);
        Ok(settings)
    }

    fn apply(&self, settings: &mut FramecastSettings) {
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(level) = &self.log_level {
            settings.logging.level.clone_from(level);
        }
        if self.log_json {
            settings.logging.json = true;
        }
    }
}

fn sms_sender(settings: &FramecastSettings) -> Arc<dyn SmsSender> {
    match sender_from_settings(&settings.sms) {
        Ok(sender) => Arc::from(sender),
        Err(e) => {
            tracing::warn!(error = %e, "SMS side channel misconfigured, disabling it");
            Arc::new(DisabledSmsSender)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let settings = args.load_settings()?;

    framecast_logging::init_subscriber(
        &settings.logging.level,
        LogFormat::from_json_flag(settings.logging.json),
    );
    let metrics = framecast_server::metrics::install_recorder()
        .context("Failed to install metrics recorder")?;

    let apps = AppRegistry::from_settings(&settings.auth);
    match &apps {
        Some(apps) => tracing::info!(keys = apps.len(), "app key checks enabled"),
        None => tracing::info!("no app keys configured, accepting all peers"),
    }

    let config = ServerConfig::from_settings(&settings.server);
    let broker = Arc::new(
        Broker::new(config.history_capacity)
            .with_app_registry(apps)
            .with_sms_sender(sms_sender(&settings)),
    );

    let server = FramecastServer::new(config, broker, metrics);
    let handle = server.listen().await.context("Failed to bind server")?;
    tracing::info!("Framecast broker listening on http://{}", handle.addr);

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    server.shutdown(handle).await;
    tracing::info!("Shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults_leave_settings_alone() {
        let cli = Cli::parse_from(["framecast-broker"]);
        let mut settings = FramecastSettings::default();
        cli.apply(&mut settings);
        assert_eq!(settings, FramecastSettings::default());
    }

    #[test]
    fn cli_overrides_settings() {
        let cli = Cli::parse_from([
            "framecast-broker",
            "--host",
            "127.0.0.1",
            "--port",
            "8080",
            "--log-level",
            "debug",
            "--log-json",
        ]);
        let mut settings = FramecastSettings::default();
        cli.apply(&mut settings);
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.logging.level, "debug");
        assert!(settings.logging.json);
    }

    #[test]
    fn config_file_then_cli_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"server": {"port": 4000, "historyCapacity": 10}}"#).unwrap();

        let cli = Cli::parse_from([
            "framecast-broker",
            "--config",
            path.to_str().unwrap(),
            "--port",
            "5000",
        ]);
        let settings = cli.load_settings().unwrap();
        assert_eq!(settings.server.port, 5000);
        assert_eq!(settings.server.history_capacity, 10);
    }

    #[test]
    fn invalid_config_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        let cli = Cli::parse_from(["framecast-broker", "--config", path.to_str().unwrap()]);
        assert!(cli.load_settings().is_err());
    }

    #[test]
    fn disabled_sms_settings_build_a_sender() {
        let _sender = sms_sender(&FramecastSettings::default());
    }
}
