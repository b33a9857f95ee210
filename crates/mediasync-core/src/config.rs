//! Worker configuration, loaded from the environment.

use std::env;
use std::path::PathBuf;

const RETRY_INTERVAL_MINUTES: u64 = 60;
const CLEANUP_INTERVAL_DAYS: u64 = 1;
const DELETE_LOCAL_AFTER_DAYS: i64 = 30;
const SYNC_BATCH_SIZE: i64 = 100;

/// CDN storage credentials. The absence of any of the three required values
/// disables the storage client entirely; the worker then runs ingest-only.
#[derive(Clone, Debug)]
pub struct CdnSettings {
    pub storage_zone: String,
    pub access_key: String,
    pub pull_zone_url: String,
    /// Storage API host, e.g. `https://la.storage.bunnycdn.com`.
    pub storage_url: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    /// Directory holding original uploads and generated variant files.
    pub media_dir: PathBuf,
    pub cdn: Option<CdnSettings>,
    /// Master switch for both background sweeps.
    pub auto_sync_enabled: bool,
    pub retry_interval_minutes: u64,
    pub cleanup_interval_days: u64,
    /// Local retention window: files synced longer ago than this are eligible
    /// for local deletion.
    pub delete_local_after_days: i64,
    /// When set, local files are never deleted regardless of age.
    pub keep_local_backup: bool,
    pub sync_batch_size: i64,
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

fn env_flag(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(v) => v.eq_ignore_ascii_case("true") || v == "1",
        Err(_) => default,
    }
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let cdn = match (
            env::var("CDN_STORAGE_ZONE").ok(),
            env::var("CDN_ACCESS_KEY").ok(),
            env::var("CDN_PULL_ZONE_URL").ok(),
        ) {
            (Some(storage_zone), Some(access_key), Some(pull_zone_url)) => Some(CdnSettings {
                storage_zone,
                access_key,
                pull_zone_url: pull_zone_url.trim_end_matches('/').to_string(),
                storage_url: env::var("CDN_STORAGE_URL")
                    .unwrap_or_else(|_| "https://la.storage.bunnycdn.com".to_string())
                    .trim_end_matches('/')
                    .to_string(),
            }),
            _ => None,
        };

        let config = Self {
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,
            media_dir: PathBuf::from(env::var("MEDIA_DIR").unwrap_or_else(|_| "media".to_string())),
            cdn,
            auto_sync_enabled: env_flag("ENABLE_CDN_AUTO_SYNC", false),
            retry_interval_minutes: env_parse("CDN_RETRY_INTERVAL_MINUTES", RETRY_INTERVAL_MINUTES),
            cleanup_interval_days: env_parse("CDN_CLEANUP_INTERVAL_DAYS", CLEANUP_INTERVAL_DAYS),
            delete_local_after_days: env_parse("DELETE_LOCAL_AFTER_DAYS", DELETE_LOCAL_AFTER_DAYS),
            keep_local_backup: env_flag("KEEP_LOCAL_BACKUP", true),
            sync_batch_size: env_parse("SYNC_BATCH_SIZE", SYNC_BATCH_SIZE),
            ffmpeg_path: env::var("FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".to_string()),
            ffprobe_path: env::var("FFPROBE_PATH").unwrap_or_else(|_| "ffprobe".to_string()),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.retry_interval_minutes == 0 {
            return Err(anyhow::anyhow!(
                "CDN_RETRY_INTERVAL_MINUTES must be at least 1"
            ));
        }
        if self.cleanup_interval_days == 0 {
            return Err(anyhow::anyhow!("CDN_CLEANUP_INTERVAL_DAYS must be at least 1"));
        }
        if self.delete_local_after_days < 0 {
            return Err(anyhow::anyhow!("DELETE_LOCAL_AFTER_DAYS must not be negative"));
        }
        if self.sync_batch_size <= 0 {
            return Err(anyhow::anyhow!("SYNC_BATCH_SIZE must be positive"));
        }
        if self.auto_sync_enabled && self.cdn.is_none() {
            tracing::warn!(
                "ENABLE_CDN_AUTO_SYNC is set but CDN credentials are incomplete; sync disabled"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            database_url: "postgres://localhost/mediasync".to_string(),
            media_dir: PathBuf::from("media"),
            cdn: None,
            auto_sync_enabled: false,
            retry_interval_minutes: RETRY_INTERVAL_MINUTES,
            cleanup_interval_days: CLEANUP_INTERVAL_DAYS,
            delete_local_after_days: DELETE_LOCAL_AFTER_DAYS,
            keep_local_backup: true,
            sync_batch_size: SYNC_BATCH_SIZE,
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
        }
    }

    #[test]
    fn defaults_validate() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn zero_intervals_rejected() {
        let mut config = base_config();
        config.retry_interval_minutes = 0;
        assert!(config.validate().is_err());

        let mut config = base_config();
        config.cleanup_interval_days = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn negative_retention_rejected() {
        let mut config = base_config();
        config.delete_local_after_days = -1;
        assert!(config.validate().is_err());
    }
}
