use anyhow::{Context, Result};
use natstage::{
    config::Config,
    error::StageError,
    fetch,
    process::{stage_year, CancelFlag, CsvRecordWriter},
    schema::SchemaRegistry,
};
use reqwest::Client;
use std::{
    fs::{self, File},
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();
    info!("startup");

    // ─── 2) load config + dictionary ─────────────────────────────────
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "natstage.yaml".to_string());
    let cfg = Config::load(Path::new(&config_path))?;

    let registry = Arc::new(SchemaRegistry::load(&cfg.dictionary)?);
    info!(years = registry.years().len(), "dictionary loaded");

    fs::create_dir_all(&cfg.data_dir)?;

    // ─── 3) ctrl-c cancels at row granularity ────────────────────────
    let cancel: CancelFlag = Arc::new(AtomicBool::new(false));
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, stopping after the current row");
                cancel.store(true, Ordering::Relaxed);
            }
        });
    }

    // ─── 4) stage each year in turn ──────────────────────────────────
    let client = Client::new();

    for year in cfg.start_year..=cfg.end_year {
        if cancel.load(Ordering::Relaxed) {
            break;
        }

        let schema = registry.year(year);
        if schema.is_empty() {
            warn!(year, "dictionary defines no columns, skipping");
            continue;
        }

        let out_path = cfg.data_dir.join(format!("births{year}.csv"));
        if out_path.exists() {
            info!(year, "output exists, skipping");
            continue;
        }

        let raw_path = ensure_raw(&client, &cfg, year)
            .await
            .with_context(|| format!("preparing raw data for {year}"))?;

        info!(year, raw = %raw_path.display(), "staging");
        let result = tokio::task::spawn_blocking({
            let schema = schema.clone();
            let raw_path = raw_path.clone();
            let out_path = out_path.clone();
            let sample = cfg.sample.clone();
            let policy = cfg.on_decode_error;
            let cancel = cancel.clone();
            move || -> Result<_, StageError> {
                let file = File::create(&out_path)?;
                let mut writer = CsvRecordWriter::new(file);
                stage_year(&schema, &raw_path, &mut writer, &sample, policy, &cancel)
            }
        })
        .await?;

        match result {
            Ok(summary) => {
                info!(
                    year,
                    emitted = summary.emitted,
                    blank = summary.blank,
                    "wrote {}",
                    out_path.display()
                );
                if cfg.remove_raw {
                    let raw_dir = cfg.data_dir.join(year.to_string());
                    if let Err(e) = fs::remove_dir_all(&raw_dir) {
                        warn!(year, "failed to remove raw folder: {e}");
                    }
                }
            }
            Err(StageError::Cancelled) => {
                warn!(year, "cancelled, discarding partial output");
                let _ = fs::remove_file(&out_path);
                break;
            }
            Err(e) => {
                let _ = fs::remove_file(&out_path);
                return Err(e).with_context(|| format!("staging {year}"));
            }
        }
    }

    info!("all done");
    Ok(())
}

/// Make sure the year's raw fixed-width file is on disk, downloading and
/// unpacking the archive when it isn't.
async fn ensure_raw(client: &Client, cfg: &Config, year: u16) -> Result<PathBuf> {
    let raw_dir = cfg.data_dir.join(year.to_string());
    if raw_dir.is_dir() {
        if let Ok(path) = fetch::largest_file(&raw_dir) {
            return Ok(path);
        }
    }

    let zip_path = cfg.data_dir.join(fetch::archive_name(year));
    if !zip_path.exists() {
        let url = fetch::archive_url(&cfg.base_url, year)?;
        fetch::download_archive(client, &url, &cfg.data_dir).await?;
    }

    let raw_path = tokio::task::spawn_blocking({
        let zip_path = zip_path.clone();
        let raw_dir = raw_dir.clone();
        move || fetch::extract_largest(&zip_path, &raw_dir)
    })
    .await??;

    if cfg.remove_zip {
        if let Err(e) = fs::remove_file(&zip_path) {
            warn!(year, "failed to remove archive: {e}");
        }
    }

    Ok(raw_path)
}
