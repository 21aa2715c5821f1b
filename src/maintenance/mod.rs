use std::{
    collections::HashSet,
    io::ErrorKind,
    path::{Path, PathBuf},
    time::{Duration as StdDuration, SystemTime},
};

use anyhow::{Context, Result};
use sqlx::PgPool;
use tokio::time::{Duration as TokioDuration, sleep};
use tracing::{error, info, warn};

use crate::web::{
    AppState, data,
    storage::{STORAGE_AREAS, public_url_for},
};

const CLEANUP_INTERVAL_MINUTES: u64 = 30;
/// Files younger than this may belong to a request that has not committed its row yet.
const ORPHAN_GRACE: StdDuration = StdDuration::from_secs(60 * 60);

pub fn spawn(state: AppState) {
    tokio::spawn(async move {
        let interval = TokioDuration::from_secs(CLEANUP_INTERVAL_MINUTES * 60);
        loop {
            if let Err(err) = run_cleanup_cycle(&state).await {
                error!(?err, "storage cleanup cycle failed");
            }
            sleep(interval).await;
        }
    });
}

async fn run_cleanup_cycle(state: &AppState) -> Result<()> {
    let pool = state.pool_ref();

    let sessions_removed = purge_expired_sessions(pool).await?;
    let referenced = referenced_file_urls(pool).await?;

    let mut files_removed = 0_u64;
    for area in STORAGE_AREAS {
        files_removed +=
            sweep_orphans(state.storage_root(), area, &referenced, SystemTime::now()).await?;
    }

    if sessions_removed > 0 || files_removed > 0 {
        info!(sessions_removed, files_removed, "storage cleanup completed");
    }

    Ok(())
}

async fn purge_expired_sessions(pool: &PgPool) -> Result<u64> {
    let result = sqlx::query("DELETE FROM admin_sessions WHERE expires_at <= NOW()")
        .execute(pool)
        .await
        .context("failed to purge expired admin sessions")?;
    Ok(result.rows_affected())
}

async fn referenced_file_urls(pool: &PgPool) -> Result<HashSet<String>> {
    let urls = data::fetch_referenced_file_urls(pool)
        .await
        .context("failed to load referenced file urls")?;
    Ok(urls.into_iter().collect())
}

/// Remove files in one storage area that no row points at and that are older than the grace period.
async fn sweep_orphans(
    root: &Path,
    area: &str,
    referenced: &HashSet<String>,
    now: SystemTime,
) -> Result<u64> {
    let dir = root.join(area);
    let mut entries = match tokio::fs::read_dir(&dir).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(0),
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read storage area {}", dir.display()));
        }
    };

    let mut removed = 0_u64;
    while let Some(entry) = entries
        .next_entry()
        .await
        .with_context(|| format!("failed to list storage area {}", dir.display()))?
    {
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        let Ok(metadata) = entry.metadata().await else {
            continue;
        };
        if !metadata.is_file() || referenced.contains(&public_url_for(area, &name)) {
            continue;
        }
        let modified = metadata.modified().unwrap_or(now);
        if !is_past_grace(modified, now) {
            continue;
        }
        if remove_orphan(entry.path()).await {
            removed += 1;
        }
    }

    Ok(removed)
}

fn is_past_grace(modified: SystemTime, now: SystemTime) -> bool {
    now.duration_since(modified)
        .map(|age| age >= ORPHAN_GRACE)
        .unwrap_or(false)
}

async fn remove_orphan(path: PathBuf) -> bool {
    match tokio::fs::remove_file(&path).await {
        Ok(_) => true,
        Err(err) if err.kind() == ErrorKind::NotFound => false,
        Err(err) => {
            warn!(?err, path = %path.display(), "failed to remove orphaned upload");
            false
        }
    }
}
