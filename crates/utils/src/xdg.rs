use std::env;
use std::path::PathBuf;

/// XDG Base Directory locations used when no explicit path is configured
pub struct XdgPaths;

impl XdgPaths {
    /// `$XDG_CONFIG_HOME/cas` or `~/.config/cas`
    pub fn config_dir() -> PathBuf {
        base_dir("XDG_CONFIG_HOME", ".config").join("cas")
    }

    /// `$XDG_DATA_HOME/cas` or `~/.local/share/cas`
    pub fn data_dir() -> PathBuf {
        base_dir("XDG_DATA_HOME", ".local/share").join("cas")
    }

    /// Default configuration file
    pub fn config_file() -> PathBuf {
        Self::config_dir().join("cas.json")
    }

    /// Default directory of the file-backed ticket store
    pub fn ticket_dir() -> PathBuf {
        Self::data_dir().join("tickets")
    }
}

fn base_dir(variable: &str, home_relative: &str) -> PathBuf {
    env::var(variable)
        .ok()
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            dirs::home_dir()
                .map(|home| home.join(home_relative))
                .unwrap_or_else(|| PathBuf::from(home_relative))
        })
}
