// Boundary configuration and logging setup

use std::ffi::c_char;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use directories::ProjectDirs;
use fhegate_proto::Format;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{guard, FfiError, FfiResult, FheResult};
use crate::registry::c_str;

/// Env var naming an explicit config file
pub const CONFIG_ENV: &str = "FHEGATE_CONFIG";

pub const DEFAULT_LOG_FILTER: &str = "fhegate=info";

pub const DEFAULT_MAX_BUFFER_LEN: usize = 256 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundaryConfig {
    pub log_filter: String,
    pub default_framing: Format,
    /// Largest buffer any Deserialize entry point accepts
    pub max_buffer_len: usize,
}

impl Default for BoundaryConfig {
    fn default() -> Self {
        BoundaryConfig {
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            default_framing: Format::Binary,
            max_buffer_len: DEFAULT_MAX_BUFFER_LEN,
        }
    }
}

impl BoundaryConfig {
    /// Load from `$FHEGATE_CONFIG`, else the platform config dir, else defaults
    pub fn load() -> FfiResult<Self> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Self::from_path(Path::new(&path));
        }
        match Self::config_path() {
            Some(path) if path.exists() => Self::from_path(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn from_path(path: &Path) -> FfiResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            FfiError::InvalidArgument(format!("cannot read config {}: {e}", path.display()))
        })?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(text: &str) -> FfiResult<Self> {
        let config: BoundaryConfig = toml::from_str(text)
            .map_err(|e| FfiError::InvalidArgument(format!("invalid config: {e}")))?;
        if config.max_buffer_len == 0 {
            return Err(FfiError::InvalidArgument(
                "max_buffer_len must be positive".into(),
            ));
        }
        Ok(config)
    }

    fn config_path() -> Option<PathBuf> {
        // Linux: ~/.config/fhegate/config.toml
        ProjectDirs::from("io", "identikey", "fhegate")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

fn slot() -> &'static RwLock<BoundaryConfig> {
    static ACTIVE: OnceLock<RwLock<BoundaryConfig>> = OnceLock::new();
    ACTIVE.get_or_init(|| RwLock::new(BoundaryConfig::load().unwrap_or_default()))
}

/// Snapshot of the active configuration
pub fn active() -> BoundaryConfig {
    slot().read().clone()
}

pub fn replace(config: BoundaryConfig) {
    debug!(?config, "boundary config replaced");
    *slot().write() = config;
}

/// Install the fmt subscriber; `RUST_LOG` wins over `filter`
pub fn init_logging(filter: Option<&str>) -> FfiResult<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(env) => env,
        Err(_) => {
            let directive = filter.map_or_else(|| active().log_filter, str::to_string);
            EnvFilter::try_new(&directive).map_err(|e| {
                FfiError::InvalidArgument(format!("invalid log filter {directive:?}: {e}"))
            })?
        }
    };
    if fmt().with_env_filter(filter).with_target(false).try_init().is_ok() {
        info!("fhegate logging initialized");
    }
    Ok(())
}

/// Replace the active config with the file at `path`; null reloads from
/// the default locations
///
/// # Safety
/// `path` must be null or a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn FheGate_LoadConfig(path: *const c_char) -> FheResult {
    guard("FheGate_LoadConfig", || {
        let config = if path.is_null() {
            BoundaryConfig::load()?
        } else {
            BoundaryConfig::from_path(Path::new(c_str(path, "path")?))?
        };
        replace(config);
        Ok(())
    })
}

/// Install logging; null uses the configured filter
///
/// # Safety
/// `filter` must be null or a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn FheGate_InitLogging(filter: *const c_char) -> FheResult {
    guard("FheGate_InitLogging", || {
        let filter = if filter.is_null() {
            None
        } else {
            Some(c_str(filter, "filter")?)
        };
        init_logging(filter)
    })
}
