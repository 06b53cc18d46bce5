use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use common::storage::{FilesystemVideoStore, MediaSigner, VideoStore};
use tracing::info;

use server::config::{AppConfig, StorageBackend};
use server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let config = AppConfig::load().context("Failed to load config")?;

    let db = server::database::init_db(&config.database.url)
        .await
        .context("Failed to initialize database")?;
    server::seed::ensure_indexes(&db)
        .await
        .context("Failed to create indexes")?;
    server::seed::purge_expired_sessions(&db)
        .await
        .context("Failed to purge expired sessions")?;
    server::seed::seed_bootstrap_admin(&db, &config)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to seed bootstrap admin: {e:?}"))?;

    let media_signer = MediaSigner::new(format!("{}:media", config.auth.jwt_secret));
    let videos = build_video_store(&config, media_signer.clone()).await?;
    info!(backend = ?config.storage.backend, "Video storage ready");

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server.host / server.port")?;

    let state = AppState {
        db,
        config,
        videos,
        media_signer,
    };
    let app = server::build_router(state);

    info!("Lectern listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn build_video_store(
    config: &AppConfig,
    signer: MediaSigner,
) -> anyhow::Result<Arc<dyn VideoStore>> {
    let storage = &config.storage;
    match storage.backend {
        StorageBackend::Filesystem => {
            let store = FilesystemVideoStore::new(
                storage.root.clone(),
                storage.max_video_size,
                storage.public_base_url.clone(),
                signer,
            )
            .await
            .context("Failed to initialize filesystem video store")?;
            Ok(Arc::new(store))
        }
        #[cfg(feature = "s3")]
        StorageBackend::S3 => {
            let store = common::storage::S3VideoStore::new(&storage.s3, storage.max_video_size)
                .context("Failed to initialize S3 video store")?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "s3"))]
        StorageBackend::S3 => {
            anyhow::bail!("storage.backend = \"s3\" requires building with the `s3` feature")
        }
    }
}
