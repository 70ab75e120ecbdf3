use checkin_app::{
    clock::SystemClock, gateway::HttpGateway, load_checkin, router, AppState, Config, LocalStore,
};
use std::{net::SocketAddr, sync::Arc};
use tokio::fs;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let config = Config::from_env();
    if let Some(parent) = config.data_path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let store = LocalStore::open(&config.data_path)
        .await
        .with_quota(config.storage_quota_bytes);
    let checkin = load_checkin(&config.checkin_path).await;
    let gateway = HttpGateway::new(
        &config.backend_url,
        config.auth_token.clone(),
        config.request_timeout,
    );
    let state = AppState::new(
        checkin,
        Arc::new(store),
        Arc::new(SystemClock),
        Arc::new(gateway),
        config.save_debounce,
    );

    let app = router(state.clone());
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    info!("listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Keep unfinished answers for the next start.
    if let Some(session) = state.session.lock().await.take() {
        session.close();
    }
    info!("shut down");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
}
