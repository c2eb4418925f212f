use std::env;
use std::path::{Path, PathBuf};

/// Environment variable that overrides the data directory.
pub const DATA_DIR_ENV: &str = "STEADY_DATA_DIR";

pub const PROFILES_FILE: &str = "profiles.json";
pub const SETTINGS_FILE: &str = "settings.toml";

/// `~/.steadyhand`, falling back to the working directory without a home.
pub fn default_base_dir() -> PathBuf {
    dirs_home().join(".steadyhand")
}

fn dirs_home() -> PathBuf {
    env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// Explicit override > `STEADY_DATA_DIR` > default.
pub fn data_dir(override_dir: Option<&Path>) -> PathBuf {
    if let Some(dir) = override_dir {
        return dir.to_path_buf();
    }
    env::var(DATA_DIR_ENV)
        .ok()
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(default_base_dir)
}

pub fn profiles_path(dir: &Path) -> PathBuf {
    dir.join(PROFILES_FILE)
}

pub fn settings_path(dir: &Path) -> PathBuf {
    dir.join(SETTINGS_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_wins() {
        let dir = Path::new("/tmp/steady-test");
        assert_eq!(data_dir(Some(dir)), dir);
    }

    #[test]
    fn test_file_names() {
        let dir = Path::new("/data");
        assert_eq!(profiles_path(dir), Path::new("/data/profiles.json"));
        assert_eq!(settings_path(dir), Path::new("/data/settings.toml"));
    }

    #[test]
    fn test_default_ends_in_app_dir() {
        assert!(default_base_dir().ends_with(".steadyhand"));
    }
}
