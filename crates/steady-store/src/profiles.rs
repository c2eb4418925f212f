use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use steady_core::Profile;

use crate::error::{Result, StoreError};

/// Named profiles kept in a single JSON document.
///
/// The whole document is read at open and rewritten on every change; there
/// is no incremental update. A failed write leaves the in-memory map as it
/// was before the call.
#[derive(Debug)]
pub struct ProfileStore {
    path: PathBuf,
    profiles: BTreeMap<String, Profile>,
}

impl ProfileStore {
    /// Open the store at `path`. A missing file is an empty store.
    pub fn open(path: &Path) -> Result<Self> {
        let profiles = match fs::read_to_string(path) {
            Ok(content) if content.trim().is_empty() => BTreeMap::new(),
            Ok(content) => parse_document(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(StoreError::io(path, e)),
        };
        tracing::info!("loaded {} profiles from {}", profiles.len(), path.display());
        Ok(Self {
            path: path.to_path_buf(),
            profiles,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Profile names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        self.profiles.keys().map(String::as_str).collect()
    }

    pub fn get(&self, name: &str) -> Option<&Profile> {
        self.profiles.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Profile)> {
        self.profiles.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Insert or replace `profile` under its own (trimmed) name and persist.
    pub fn save(&mut self, profile: Profile) -> Result<()> {
        let name = profile.name.trim();
        if name.is_empty() {
            return Err(StoreError::InvalidData("profile name is required".into()));
        }
        if !profile.is_finite() {
            return Err(StoreError::InvalidData(format!(
                "profile '{name}' has a non-finite axis"
            )));
        }
        let profile = profile.renamed(name);
        let mut next = self.profiles.clone();
        next.insert(profile.name.clone(), profile);
        self.commit(next)?;
        tracing::info!("saved profile '{name}'");
        Ok(())
    }

    /// Remove `name` and persist. Returns whether it existed.
    pub fn delete(&mut self, name: &str) -> Result<bool> {
        if !self.profiles.contains_key(name) {
            return Ok(false);
        }
        let mut next = self.profiles.clone();
        next.remove(name);
        self.commit(next)?;
        tracing::info!("deleted profile '{name}'");
        Ok(true)
    }

    /// Rewrite the whole document, then adopt `next`.
    fn commit(&mut self, next: BTreeMap<String, Profile>) -> Result<()> {
        write_document(&self.path, &next).inspect_err(|e| {
            tracing::error!("failed saving profiles: {e}");
        })?;
        self.profiles = next;
        Ok(())
    }
}

fn parse_document(content: &str) -> Result<BTreeMap<String, Profile>> {
    let profiles: BTreeMap<String, Profile> = serde_json::from_str(content)?;
    if let Some((name, _)) = profiles.iter().find(|(_, p)| !p.is_finite()) {
        return Err(StoreError::InvalidData(format!(
            "profile '{name}' has a non-finite axis"
        )));
    }
    Ok(profiles)
}

/// Write to a sibling temp file and rename over the target.
fn write_document(path: &Path, profiles: &BTreeMap<String, Profile>) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
    }
    let json = serde_json::to_string_pretty(profiles)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).map_err(|e| StoreError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| StoreError::io(path, e))
}
