use crate::models::CheckinConfig;
use std::{
    env,
    fmt::Display,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};
use tokio::fs;
use tracing::{error, info, warn};

pub struct Config {
    pub port: u16,
    pub data_path: PathBuf,
    pub checkin_path: PathBuf,
    pub backend_url: String,
    pub auth_token: Option<String>,
    pub request_timeout: Duration,
    pub save_debounce: Duration,
    pub storage_quota_bytes: Option<usize>,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            port: try_load("PORT", 8080),
            data_path: PathBuf::from(try_load(
                "APP_DATA_PATH",
                "data/local_storage.json".to_string(),
            )),
            checkin_path: PathBuf::from(try_load(
                "CHECKIN_CONFIG_PATH",
                "data/checkin.json".to_string(),
            )),
            backend_url: try_load("CHECKIN_BACKEND_URL", "http://127.0.0.1:8000".to_string()),
            auth_token: optional("CHECKIN_AUTH_TOKEN"),
            request_timeout: Duration::from_millis(try_load("CHECKIN_REQUEST_TIMEOUT_MS", 10_000)),
            save_debounce: Duration::from_millis(try_load("CHECKIN_SAVE_DEBOUNCE_MS", 100)),
            storage_quota_bytes: optional("CHECKIN_STORAGE_QUOTA_BYTES"),
        }
    }
}

fn try_load<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|err| {
            warn!("invalid {key} value {raw:?}: {err}, using default: {default}");
            default
        }),
        Err(_) => {
            info!("{key} not set, using default: {default}");
            default
        }
    }
}

fn optional<T>(key: &str) -> Option<T>
where
    T: FromStr,
    T::Err: Display,
{
    let raw = env::var(key).ok().filter(|raw| !raw.trim().is_empty())?;
    raw.trim()
        .parse()
        .map_err(|err| warn!("invalid {key} value: {err}, ignoring"))
        .ok()
}

/// Reads the active check-in definition. Missing or unreadable means no
/// check-in is offered.
pub async fn load_checkin(path: &Path) -> Option<CheckinConfig> {
    match fs::read(path).await {
        Ok(bytes) => match serde_json::from_slice::<CheckinConfig>(&bytes) {
            Ok(checkin) => {
                info!(
                    config_id = checkin.id,
                    questions = checkin.questions.len(),
                    "loaded check-in config"
                );
                Some(checkin)
            }
            Err(err) => {
                error!("failed to parse check-in config {}: {err}", path.display());
                None
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            warn!("no check-in config at {}", path.display());
            None
        }
        Err(err) => {
            error!("failed to read check-in config {}: {err}", path.display());
            None
        }
    }
}
