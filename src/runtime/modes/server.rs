//! Server mode
//!
//! Opens the state store, serves the redirect and admin handlers, and closes
//! the store after the HTTP server has stopped.

use std::sync::Arc;
use std::time::Duration;

use actix_web::{
    App, HttpServer,
    middleware::{Compress, DefaultHeaders},
    web,
};
use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::api::services::{ADMIN_PATH, RedirectSettings, admin_routes, redirect_routes};
use crate::config::StaticConfig;
use crate::runtime::lifetime;
use crate::storage::StateStore;

/// 批量写入请求体上限
const MAX_PAYLOAD_BYTES: usize = 4 * 1024 * 1024;

/// Run the HTTP server
///
/// **Note**: Logging system must be initialized before calling this function
pub async fn run_server(config: &StaticConfig) -> Result<()> {
    let store = lifetime::startup::prepare_storage(&config.storage)
        .await
        .inspect_err(|e| tracing::error!("Server startup failed: {:#}", e))?;

    let result = serve(config, Arc::clone(&store)).await;

    if !lifetime::shutdown::close_store(&store).await {
        warn!("State store did not close cleanly");
    }

    result
}

async fn serve(config: &StaticConfig, store: Arc<dyn StateStore>) -> Result<()> {
    let cpu_count = config.server.cpu_count.clamp(1, 32);
    warn!("Using {} CPU cores for the server", cpu_count);

    let settings = RedirectSettings {
        default_url: config.server.default_url.clone(),
    };
    if let Some(ref url) = settings.default_url {
        info!("Root path redirects to {}", url);
    }

    let bind_address = format!("{}:{}", config.server.host, config.server.port);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(Arc::clone(&store)))
            .app_data(web::Data::new(settings.clone()))
            .app_data(web::PayloadConfig::new(MAX_PAYLOAD_BYTES))
            .wrap(Compress::default())
            .wrap(
                DefaultHeaders::new()
                    .add(("Cache-Control", "no-cache, no-store, must-revalidate")),
            )
            .service(admin_routes())
            .service(redirect_routes())
    })
    .keep_alive(Duration::from_secs(30))
    .client_request_timeout(Duration::from_millis(5000))
    .client_disconnect_timeout(Duration::from_millis(1000))
    .disable_signals()
    .workers(cpu_count)
    .bind(&bind_address)
    .with_context(|| format!("Failed to bind {}", bind_address))?
    .run();

    warn!("Starting server at http://{}", bind_address);
    info!("Admin API available at: {}", ADMIN_PATH);

    let handle = server.handle();
    tokio::pin!(server);

    tokio::select! {
        res = &mut server => {
            res?;
        }
        _ = lifetime::shutdown::wait_for_signal() => {
            handle.stop(true).await;
            (&mut server).await?;
            info!("HTTP server stopped");
        }
    }

    Ok(())
}
