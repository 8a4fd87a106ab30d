//! Oldly Fun Back binary entrypoint wiring the REST layer, the storage supervisor and
//! the selected storage backend.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::{Context, bail};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use oldly_fun_back::{
    config::AppConfig,
    dao::{
        catalog::memory::InMemoryCatalog, session_store::memory::InMemorySessionStore,
        storage::StorageError,
    },
    routes,
    services::storage_supervisor,
    state::{AppState, Backend, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let catalog_seed = config.catalog.clone();
    let app_state = AppState::new(config);

    let backend = env::var("STORAGE_BACKEND").unwrap_or_else(|_| default_backend().into());
    match backend.as_str() {
        "memory" => {
            let store = Arc::new(InMemorySessionStore::new());
            let catalog = Arc::new(InMemoryCatalog::from_seed(&catalog_seed));
            tokio::spawn(storage_supervisor::run(app_state.clone(), move || {
                let backend = Backend::new("memory", store.clone(), catalog.clone());
                async move { Ok::<_, StorageError>(backend) }
            }));
        }
        #[cfg(feature = "mongo-store")]
        "mongo" => spawn_mongo_supervisor(app_state.clone()),
        other => bail!("unsupported STORAGE_BACKEND `{other}`"),
    }
    info!(storage = backend.as_str(), "storage backend selected");

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

fn default_backend() -> &'static str {
    if cfg!(feature = "mongo-store") {
        "mongo"
    } else {
        "memory"
    }
}

/// Supervise the MongoDB connection in the background, reconnecting with backoff.
#[cfg(feature = "mongo-store")]
fn spawn_mongo_supervisor(state: SharedState) {
    use oldly_fun_back::dao::mongodb as mongo_store;

    tokio::spawn(storage_supervisor::run(state, || async {
        let config = mongo_store::MongoConfig::from_env()
            .await
            .map_err(StorageError::from)?;
        let (store, catalog) = mongo_store::connect(config).await?;
        Ok::<_, StorageError>(Backend::new("mongodb", Arc::new(store), Arc::new(catalog)))
    }));
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
