use std::path::PathBuf;

use crate::defaults::{BLOB_DIR_NAME, CONFIG_FILE_NAME, DATABASE_FILE_NAME};

/// Resolve the Ath home directory.
///
/// Priority:
/// 1) ATH_HOME
/// 2) HOME/USERPROFILE
/// 3) ./.ath
pub fn ath_home() -> PathBuf {
    if let Ok(override_path) = std::env::var("ATH_HOME") {
        return PathBuf::from(override_path);
    }
    if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
        return PathBuf::from(home).join(".ath");
    }
    PathBuf::from(".").join(".ath")
}

/// Default database path: ~/.ath/ath.sqlite
pub fn default_database_path() -> PathBuf {
    ath_home().join(DATABASE_FILE_NAME)
}

/// Default blob store root: ~/.ath/blobs
pub fn default_blob_root() -> PathBuf {
    ath_home().join(BLOB_DIR_NAME)
}

/// Default config file: ~/.ath/config.toml
pub fn default_config_path() -> PathBuf {
    ath_home().join(CONFIG_FILE_NAME)
}
