//! # devs-devtools
//!
//! Devtools side-channel server binary: loads settings, wires the build
//! pipeline, router and transport together and serves until Ctrl-C.

#![deny(unsafe_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;

use devs_core::TOOL_VERSION;
use devs_core::specs::{ServiceCatalog, StaticCatalog};
use devs_core::version::{IMG_VERSION, VersionReporter};
use devs_server::build::{
    BuildCoordinator, NullDeviceBus, ProcessBuildPipeline, ProcessPipelineConfig, forward_output,
};
use devs_server::config::ServerConfig;
use devs_server::router::MessageRouter;
use devs_server::server::DevtoolsServer;
use devs_server::websocket::registry::ClientRegistry;
use devs_settings::DevtoolsSettings;

/// Buffered compiler output lines awaiting broadcast.
const OUTPUT_BUFFER: usize = 256;

/// Devtools side-channel server.
#[derive(Parser, Debug)]
#[command(name = "devs-devtools", version, about = "Devtools side-channel server")]
struct Cli {
    /// Settings file (defaults to `~/.devs/devtools.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides settings, 0 for auto-assign).
    #[arg(long)]
    port: Option<u16>,

    /// Compiler executable (overrides settings).
    #[arg(long)]
    compiler: Option<String>,

    /// Log filter when `RUST_LOG` is unset (overrides settings).
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    /// Apply command-line overrides on top of loaded settings.
    fn apply(&self, settings: &mut DevtoolsSettings) {
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(compiler) = &self.compiler {
            settings.build.compiler.clone_from(compiler);
        }
        if let Some(level) = &self.log_level {
            settings.logging.level.clone_from(level);
        }
    }
}

fn load_catalog(path: Option<&str>) -> Result<Arc<dyn ServiceCatalog>> {
    let catalog = match path {
        Some(path) => StaticCatalog::from_json_file(Path::new(path))
            .with_context(|| format!("Failed to load service specs from {path}"))?,
        None => StaticCatalog::builtin(),
    };
    Ok(Arc::new(catalog))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    // Settings come first: they carry the log level.
    let settings_path = args.settings.clone().unwrap_or_else(devs_settings::settings_path);
    let (mut settings, settings_error) = match devs_settings::load_settings_from_path(&settings_path) {
        Ok(settings) => (settings, None),
        Err(e) => (DevtoolsSettings::default(), Some(e)),
    };
    args.apply(&mut settings);

    devs_core::logging::init_subscriber(&settings.logging.level);
    if let Some(e) = settings_error {
        tracing::warn!(path = %settings_path.display(), error = %e, "failed to load settings, using defaults");
    }

    let metrics_handle = match devs_server::metrics::install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "metrics recorder unavailable");
            None
        }
    };

    let catalog = load_catalog(settings.specs_path.as_deref())?;
    let versions = VersionReporter::new(catalog, TOOL_VERSION, IMG_VERSION);
    let image_version = versions.image_version();

    let clients = Arc::new(ClientRegistry::new());
    let (output_tx, output_rx) = mpsc::channel(OUTPUT_BUFFER);
    let pipeline = ProcessBuildPipeline::new(ProcessPipelineConfig {
        program: settings.build.compiler.clone(),
        args: settings.build.compiler_args.clone(),
        debounce: Duration::from_millis(settings.build.watch_debounce_ms),
    })
    .with_output(output_tx);
    let builds = Arc::new(BuildCoordinator::new(Arc::new(pipeline), Arc::new(NullDeviceBus)));
    let output_task = tokio::spawn(forward_output(clients.clone(), output_rx));

    let router = MessageRouter::new(clients, builds, versions)
        .with_slow_request_threshold(Duration::from_secs(settings.server.slow_request_secs));

    let config = ServerConfig::from(&settings.server);
    let mut server = DevtoolsServer::new(config, router);
    if let Some(handle) = metrics_handle {
        server = server.with_metrics(handle);
    }

    let (addr, handle) = server.listen().await.context("Failed to bind server")?;
    server.shutdown().track(handle);
    tracing::info!(
        tool_version = TOOL_VERSION,
        %image_version,
        compiler = %settings.build.compiler,
        "devtools listening on ws://{addr}/ws"
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    output_task.abort();
    server.shutdown().graceful_shutdown(None).await;
    tracing::info!("Shutdown complete");
    Ok(())
}
