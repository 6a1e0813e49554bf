//! # posts binary
//!
//! Assembles the post store from settings: restores the last snapshot, starts
//! the periodic dump, and exits with an error if persistence breaks.
//! The request layer mounts `PostService` on top of this wiring.

use std::sync::Arc;

use anyhow::Context as _;
use configs::{PostStorageSettings, Settings, TelemetrySettings};
use posts_core::{Context, StorageError};
use posts_mem::MemPostStorage;
use posts_service::PostService;
use tokio::fs::OpenOptions;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dotenv = configs::load_dotenv();
    let settings = Settings::load().context("reading settings")?;
    init_tracing(&settings.telemetry);
    dotenv.log();

    // 1. Storage, with the channel the dump worker reports its failure on
    let (dump_errors_tx, mut dump_errors) = mpsc::channel::<StorageError>(1);
    let storage = Arc::new(
        open_storage(&settings.post_storage, dump_errors_tx)
            .await
            .context("setting up post storage")?,
    );

    // 2. Service layer
    let service = PostService::new(storage.clone())
        .with_max_content_len(settings.service.max_content_len);

    let posts = service
        .get_posts(&Context::background(), None, None, "newest")
        .await?;
    info!(posts = posts.len(), "post storage ready");

    // 3. Run until persistence fails or we are asked to stop
    let outcome = tokio::select! {
        Some(err) = dump_errors.recv() => {
            error!(error = %err, "persistence failed, shutting down");
            Err(anyhow::Error::new(err))
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("listening for shutdown signal")?;
            info!("shutdown requested");
            Ok(())
        }
    };

    drop(service);
    match Arc::try_unwrap(storage) {
        Ok(storage) => storage.close().await,
        Err(_) => warn!("storage still shared at shutdown, last dump cycle may be cut short"),
    }

    outcome
}

fn init_tracing(telemetry: &TelemetrySettings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&telemetry.log_filter));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if telemetry.json_logs {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn open_storage(
    settings: &PostStorageSettings,
    errors: mpsc::Sender<StorageError>,
) -> anyhow::Result<MemPostStorage> {
    if !settings.dump_enabled {
        info!("dumps disabled, running purely in memory");
        return Ok(MemPostStorage::new());
    }

    let builder = MemPostStorage::builder().restore_from_path(&settings.restore_source);

    let sink = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&settings.dump_destination)
        .await
        .with_context(|| format!("opening {}", settings.dump_destination.display()))?;

    let storage = builder
        .dump_to(sink, settings.dump_interval(), errors)
        .build()
        .await?;
    Ok(storage)
}
