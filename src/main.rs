use std::sync::Arc;

use courier_service::{
    config::Config,
    db,
    error::AppError,
    logging,
    realtime::Broadcaster,
    routes,
    services::media_store::DbMediaStore,
    state::AppState,
};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    logging::init_tracing();
    let config = Arc::new(Config::from_env()?);

    let pool = db::init_pool(&config.database_url).await?;

    let state = AppState {
        db: pool.clone(),
        broadcaster: Broadcaster::new(),
        media: Arc::new(DbMediaStore::new(pool)),
        config: config.clone(),
    };

    let app = routes::build_router(state);

    let bind_addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| AppError::Config(format!("bind {bind_addr}: {e}")))?;

    tracing::info!(%bind_addr, "starting courier-service");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::Config(format!("server: {e}")))?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
