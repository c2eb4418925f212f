use std::fs;
use std::path::Path;

use steady_core::Settings;

use crate::error::{Result, StoreError};

/// Read settings from a TOML file. A missing file yields the defaults;
/// fields absent from the file keep their default values.
pub fn load_settings(path: &Path) -> Result<Settings> {
    match fs::read_to_string(path) {
        Ok(content) => {
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings.normalized())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Settings::default()),
        Err(e) => Err(StoreError::io(path, e)),
    }
}

pub fn save_settings(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
    }
    let content = toml::to_string_pretty(settings)?;
    fs::write(path, content).map_err(|e| StoreError::io(path, e))
}
