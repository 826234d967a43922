use std::sync::Arc;

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use clap::Parser;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::EnvFilter;

use tl_domain::config::{Config, ConfigSeverity};
use tl_gateway::cli::{self, Cli, Command, ConfigCommand};
use tl_gateway::state::AppState;
use tl_gateway::{api, runtime};
use tl_providers::{ChatModel, OpenAiCompatModel};
use tl_store::EventStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli::load_config(&cli.config)?;

    match cli.command {
        // Default to serve when no subcommand is given.
        None | Some(Command::Serve) => {
            init_tracing();
            run_server(Arc::new(config)).await
        }
        Some(Command::Config(ConfigCommand::Validate)) => {
            if !cli::validate(&config) {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Show)) => {
            cli::show(&config);
            Ok(())
        }
        Some(Command::Version) => {
            println!("threadline {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Structured JSON tracing for the serve command.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tl_gateway=debug")),
        )
        .json()
        .init();
}

async fn run_server(config: Arc<Config>) -> anyhow::Result<()> {
    tracing::info!("threadline starting");

    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues
                .iter()
                .filter(|i| i.severity == ConfigSeverity::Error)
                .count()
        );
    }

    // ── Event log store ──────────────────────────────────────────────
    let store = Arc::new(
        EventStore::open(&config.store.path)
            .with_context(|| format!("opening store at {}", config.store.path.display()))?,
    );
    tracing::info!(path = %config.store.path.display(), "event store ready");

    // ── Model provider ───────────────────────────────────────────────
    let model: Option<Arc<dyn ChatModel>> = match OpenAiCompatModel::from_config(&config.model) {
        Ok(provider) => {
            tracing::info!(model = provider.model_id(), "model provider ready");
            Some(Arc::new(provider))
        }
        Err(e) => {
            tracing::warn!(error = %e,
                "no model provider — chat requests will be refused as not_configured");
            None
        }
    };

    let state = AppState {
        config: config.clone(),
        store: store.clone(),
        model,
    };

    // ── Startup stale sweep ──────────────────────────────────────────
    // Sessions left `running` by a previous process die through the
    // reader's stale probe; run it once over recent sessions so operators
    // see a consistent listing without waiting for a client read.
    {
        let state = state.clone();
        tokio::spawn(async move {
            let sessions = match state.store.list_sessions(500, 0) {
                Ok(sessions) => sessions,
                Err(e) => {
                    tracing::warn!(error = %e, "startup stale sweep skipped");
                    return;
                }
            };
            for summary in sessions {
                if summary.status != tl_store::SessionStatus::Running {
                    continue;
                }
                if let Ok(Some(mut session)) = state.store.get_session(&summary.id) {
                    if let Err(e) = runtime::reader::recover_if_stale(
                        &state.store,
                        &state.config.runtime,
                        &mut session,
                    ) {
                        tracing::warn!(session_id = %summary.id, error = %e,
                            "stale sweep probe failed");
                    }
                }
            }
        });
    }

    // ── Router ───────────────────────────────────────────────────────
    let app = api::router()
        .layer(build_cors_layer(&config.server.allowed_origins))
        .layer(tower::limit::ConcurrencyLimitLayer::new(
            config.server.max_concurrent_requests,
        ))
        .with_state(state);

    // ── Bind ─────────────────────────────────────────────────────────
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;
    tracing::info!(addr = %addr, "threadline listening");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

/// CORS from the configured origin list. Entries may end in `:*` to allow
/// any port on that host; a lone `"*"` allows everything.
fn build_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    use axum::http::header;

    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    if allowed_origins.len() == 1 && allowed_origins[0] == "*" {
        tracing::warn!("CORS configured with wildcard \"*\" — all origins allowed");
        return layer.allow_origin(tower_http::cors::Any);
    }

    let mut exact: Vec<HeaderValue> = Vec::new();
    let mut wildcard_prefixes: Vec<String> = Vec::new();
    for origin in allowed_origins {
        if let Some(prefix) = origin.strip_suffix(":*") {
            wildcard_prefixes.push(format!("{prefix}:"));
        } else if let Ok(value) = origin.parse::<HeaderValue>() {
            exact.push(value);
        } else {
            tracing::warn!(origin = %origin, "invalid CORS origin, skipping");
        }
    }

    if wildcard_prefixes.is_empty() {
        return layer.allow_origin(AllowOrigin::list(exact));
    }

    layer.allow_origin(AllowOrigin::predicate(move |origin, _| {
        if exact.iter().any(|e| e.as_bytes() == origin.as_bytes()) {
            return true;
        }
        let origin = origin.to_str().unwrap_or("");
        // The remainder after the prefix must be digits only, so
        // "http://localhost:3000.evil.com" cannot slip through.
        wildcard_prefixes.iter().any(|prefix| {
            origin
                .strip_prefix(prefix.as_str())
                .map(|port| !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()))
                .unwrap_or(false)
        })
    }))
}
