/// Background task implementations
use crate::{context::AppContext, error::HostResult};
use chrono::Utc;

/// Files younger than this are left alone by the orphan sweep. An
/// in-flight upload has written its bytes before its row exists.
const SWEEP_MIN_AGE_MILLIS: i64 = 24 * 60 * 60 * 1000;

/// Cleanup expired sessions and spent refresh tokens
pub async fn cleanup_expired_sessions(ctx: &AppContext) -> HostResult<u64> {
    let (sessions_deleted, refresh_tokens_deleted) =
        ctx.user_manager.cleanup_expired_sessions().await?;

    Ok(sessions_deleted + refresh_tokens_deleted)
}

/// Delete stored files that no asset row references.
///
/// Crash windows between backend writes and row inserts can leave
/// files behind; this reconciles storage back to the database.
pub async fn sweep_orphaned_files(ctx: &AppContext) -> HostResult<u64> {
    let referenced = ctx.asset_store.referenced_filenames().await?;
    let stored = ctx.asset_store.backend().list().await?;
    let cutoff = Utc::now().timestamp_millis() - SWEEP_MIN_AGE_MILLIS;

    let mut removed = 0u64;
    for filename in stored {
        if referenced.contains(&filename) {
            continue;
        }
        // Every stored name starts with its upload timestamp. Files
        // under a day old, or with unrecognized names, stay put.
        match upload_timestamp_millis(&filename) {
            Some(ts) if ts <= cutoff => {}
            _ => continue,
        }

        tracing::info!("Removing orphaned file {}", filename);
        if let Err(e) = ctx.asset_store.backend().delete(&filename).await {
            tracing::warn!("Failed to remove orphaned file {}: {}", filename, e);
            continue;
        }
        removed += 1;
    }

    Ok(removed)
}

/// Upload timestamp embedded in a stored filename, thumbnails included
fn upload_timestamp_millis(filename: &str) -> Option<i64> {
    let name = filename.strip_prefix("thumb_").unwrap_or(filename);
    name.split('_').next()?.parse().ok()
}

/// Health check: verify database connectivity
pub async fn health_check(ctx: &AppContext) -> HostResult<()> {
    crate::db::test_connection(&ctx.db).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_timestamp_parsing() {
        assert_eq!(
            upload_timestamp_millis("1724932800000_a1b2c3d4.png"),
            Some(1_724_932_800_000)
        );
        assert_eq!(
            upload_timestamp_millis("thumb_1724932800000_a1b2c3d4.png"),
            Some(1_724_932_800_000)
        );
        assert_eq!(upload_timestamp_millis("stray-file.png"), None);
    }

    #[test]
    fn test_recent_files_are_inside_grace_window() {
        let now = Utc::now().timestamp_millis();
        let cutoff = now - SWEEP_MIN_AGE_MILLIS;

        let fresh = format!("{}_a1b2c3d4.png", now);
        assert!(upload_timestamp_millis(&fresh).unwrap() > cutoff);

        let stale = format!("{}_a1b2c3d4.png", now - SWEEP_MIN_AGE_MILLIS - 1000);
        assert!(upload_timestamp_millis(&stale).unwrap() <= cutoff);
    }
}
