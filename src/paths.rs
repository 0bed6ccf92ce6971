// ABOUTME: XDG Base Directory paths for config, session credentials, and media
// ABOUTME: Falls back to ./data when the platform has no standard directories

use directories::ProjectDirs;
use std::path::PathBuf;

/// Application identifier for XDG directories
const QUALIFIER: &str = "com";
const ORGANIZATION: &str = "butler";
const APPLICATION: &str = "wa-bridge";

pub fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from(QUALIFIER, ORGANIZATION, APPLICATION)
}

/// Data directory (e.g., ~/.local/share/wa-bridge/), or ./data
pub fn data_dir() -> PathBuf {
    project_dirs()
        .map(|p| p.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("./data"))
}

/// Credential store owned by the session driver
pub fn session_dir() -> PathBuf {
    data_dir().join("sessions")
}

/// Inbound attachments
pub fn media_dir() -> PathBuf {
    data_dir().join("media")
}

/// Default config file, e.g. ~/.config/wa-bridge/config.toml
pub fn config_file() -> PathBuf {
    project_dirs()
        .map(|p| p.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
        .join("config.toml")
}
