use std::io::Write;
use std::sync::Arc;
use tokio::net::TcpListener;

use super::command::Command;
use crate::config::{AppConfig, LoggingConfig};
use crate::engine::Engine;
use crate::errors::DbError;
use crate::http::{self, AppState};
use crate::query::{Filter, count_docs};
use crate::utils::json::bson_document_to_json;
use crate::{logger, telemetry};

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OutputMode {
    Human,
    Json,
}

/// Runs `cmd` against `cfg`, printing to stdout.
///
/// # Errors
/// Returns configuration, storage, logging and listener failures.
pub async fn run(cfg: AppConfig, cmd: Command, mode: OutputMode) -> CliResult {
    match cmd {
        Command::Serve => serve(cfg).await,
        other => run_with_output(&cfg, other, mode, &mut std::io::stdout().lock()),
    }
}

/// The non-serving commands, writing to `out`.
///
/// # Errors
/// Returns configuration and storage failures, and write errors on `out`.
pub fn run_with_output(cfg: &AppConfig, cmd: Command, mode: OutputMode, out: &mut dyn Write) -> CliResult {
    match cmd {
        Command::Tables => {
            let registry = cfg.table_registry()?;
            match mode {
                OutputMode::Json => {
                    let tables: serde_json::Map<String, serde_json::Value> = registry
                        .names()
                        .map(|n| {
                            let defaults = registry.resolve(n).unwrap_or_default();
                            (n.to_string(), bson_document_to_json(&defaults))
                        })
                        .collect();
                    let json = serde_json::json!({"allow_any_table": registry.allow_any(), "tables": tables});
                    writeln!(out, "{json}")?;
                }
                OutputMode::Human => {
                    for n in registry.names() {
                        let defaults = registry.resolve(n)?;
                        if defaults.is_empty() {
                            writeln!(out, "{n}")?;
                        } else {
                            writeln!(out, "{n} defaults={}", bson_document_to_json(&defaults))?;
                        }
                    }
                }
            }
            Ok(())
        }
        Command::Collections => {
            let engine = open_engine(cfg)?;
            let counts: Vec<(String, usize)> = engine
                .list_collection_names()
                .into_iter()
                .filter_map(|n| engine.get_collection(&n).map(|c| (n, count_docs(&c, &Filter::True))))
                .collect();
            match mode {
                OutputMode::Json => {
                    let map: serde_json::Map<String, serde_json::Value> =
                        counts.into_iter().map(|(n, c)| (n, c.into())).collect();
                    writeln!(out, "{}", serde_json::Value::Object(map))?;
                }
                OutputMode::Human => {
                    for (n, c) in counts {
                        writeln!(out, "{n} records={c}")?;
                    }
                }
            }
            Ok(())
        }
        Command::CheckConfig => {
            let registry = cfg.table_registry()?;
            match mode {
                OutputMode::Json => writeln!(out, "{}", serde_json::to_string_pretty(cfg)?)?,
                OutputMode::Human => {
                    let text = toml::to_string_pretty(cfg).map_err(|e| DbError::Config(e.to_string()))?;
                    write!(out, "{text}")?;
                }
            }
            log::debug!("configuration ok: {} tables", registry.len());
            Ok(())
        }
        Command::Serve => Err("serve needs an async runtime; use run()".into()),
    }
}

/// Installs logging per `[logging]`: a log4rs YAML file when given, else the built-in setup.
///
/// # Errors
/// Returns an error if the logger cannot be configured.
pub fn init_logging(cfg: &LoggingConfig) -> CliResult {
    match &cfg.config {
        Some(path) => logger::init_path(path),
        None => logger::configure_logging(cfg.dir.as_deref(), cfg.level.as_deref(), cfg.retention),
    }
}

fn open_engine(cfg: &AppConfig) -> Result<Engine, DbError> {
    if cfg.storage.in_memory {
        log::warn!("storage.in_memory is set; nothing will be persisted");
        return Ok(Engine::in_memory());
    }
    Engine::open(&cfg.storage.path)
}

async fn serve(cfg: AppConfig) -> CliResult {
    telemetry::set_slow_query_ms(cfg.telemetry.slow_query_ms);
    let registry = cfg.table_registry()?;
    let engine = Arc::new(open_engine(&cfg)?);
    log::info!(
        "serving {} tables{}",
        registry.len(),
        if registry.allow_any() { " (any valid table name accepted)" } else { "" }
    );
    let listener = TcpListener::bind(&cfg.server.bind).await?;
    http::serve(listener, AppState::new(engine, registry), shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("cannot listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                log::error!("cannot listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => log::info!("received Ctrl+C, shutting down"),
        () = terminate => log::info!("received terminate signal, shutting down"),
    }
}
