use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use prospector_core::prospect::{EnricherConfig, ExtractorConfig};
use prospector_core::{
    create_authenticator, create_llm_client, create_mailbox, load_config, validate_config,
    Authenticator, DispatchLoop, EnrichmentPipeline, LeadCollection, LlmLeadEnricher,
    LlmLeadExtractor, RetryNotice, SessionContext, SqliteStateStore, StateStore,
};

use prospector_server::api::{create_router, spawn_event_bridge, WsBroadcaster};
use prospector_server::persist::{load_leads, load_session, spawn_persistence};
use prospector_server::state::AppState;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = std::env::var("PROSPECTOR_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    validate_config(&config).context("Configuration validation failed")?;

    let config_json = serde_json::to_string(&config).context("Failed to serialize config")?;
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    let config_hash = config_hash[..16].to_string();
    info!(
        version = VERSION,
        config_hash = %config_hash,
        auth = config.auth.method.as_str(),
        llm = config.llm.provider.as_str(),
        model = %config.llm.model,
        "Configuration loaded"
    );

    let authenticator: Arc<dyn Authenticator> = Arc::from(
        create_authenticator(&config.auth, &config.session.user_id)
            .context("Failed to create authenticator")?,
    );

    // Saved state
    let store: Arc<dyn StateStore> = Arc::new(
        SqliteStateStore::new(&config.database.path).context("Failed to open state store")?,
    );
    let session = Arc::new(SessionContext::new(
        load_session(store.as_ref(), &config.session).context("Failed to load session")?,
    ));
    let leads = Arc::new(LeadCollection::with_leads(
        load_leads(store.as_ref()).context("Failed to load leads")?,
    ));
    info!(
        path = ?config.database.path,
        leads = leads.len().await,
        quota = session.quota().await,
        "State restored"
    );

    // Providers
    let ws_broadcaster = WsBroadcaster::default();
    let llm = create_llm_client(&config.llm).context("Failed to create LLM client")?;

    let extract_ws = ws_broadcaster.clone();
    let extractor = LlmLeadExtractor::with_config(
        Arc::clone(&llm),
        ExtractorConfig {
            retry: config.retry.clone(),
            ..ExtractorConfig::default()
        },
    )
    .with_retry_observer(Arc::new(move |notice: &RetryNotice| {
        extract_ws.provider_retry("extract", notice)
    }));

    let enrich_ws = ws_broadcaster.clone();
    let enricher = LlmLeadEnricher::with_config(
        llm,
        EnricherConfig {
            max_tokens: config.llm.max_tokens,
            temperature: config.llm.temperature,
            retry: config.retry.clone(),
            ..EnricherConfig::default()
        },
    )
    .with_retry_observer(Arc::new(move |notice: &RetryNotice| {
        enrich_ws.provider_retry("enrich", notice)
    }));

    let mailbox = create_mailbox(&config.mailbox);

    // Workers
    let pipeline = Arc::new(EnrichmentPipeline::new(
        config.pipeline.clone(),
        Arc::new(extractor),
        Arc::new(enricher),
        Arc::clone(&leads),
    ));
    let dispatch = Arc::new(DispatchLoop::new(
        config.dispatch.clone(),
        config.retry.clone(),
        Arc::clone(&leads),
        Arc::clone(&session),
        mailbox,
    ));

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let persistence = spawn_persistence(
        Arc::clone(&store),
        Arc::clone(&session),
        Arc::clone(&leads),
        shutdown_rx,
    );

    let addr = SocketAddr::new(config.server.host, config.server.port);
    let state = Arc::new(AppState::new(
        config,
        config_hash,
        authenticator,
        session,
        leads,
        Arc::clone(&pipeline),
        Arc::clone(&dispatch),
        ws_broadcaster,
    ));
    let bridges = spawn_event_bridge(&state);

    let app = create_router(state);

    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    info!("Server shutting down...");
    dispatch.stop().await;
    pipeline.cancel();
    for bridge in bridges {
        bridge.abort();
    }

    // Persistence writes a final snapshot before exiting.
    let _ = shutdown_tx.send(());
    if let Err(e) = persistence.await {
        error!("Persistence task failed: {}", e);
    }
    info!("State saved, bye");

    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
