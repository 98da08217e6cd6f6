use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

const APP_DIR: &str = "addon-settings";
const CONFIG_FILE: &str = "config.toml";

/// Where the host keeps installed add-ons and their profile data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HostConfig {
    pub addons_dir: Option<PathBuf>,
    pub profile_dir: Option<PathBuf>,
}

impl HostConfig {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Reads the config file; a missing file yields an empty config.
    pub fn load(path: &Path) -> Result<Self> {
        addon_fs::read_toml_file_or_default(path)
    }

    /// Fills unset directories from the config file, keeping values given on
    /// the command line.
    pub fn resolve(
        self,
        addons_dir: Option<PathBuf>,
        profile_dir: Option<PathBuf>,
    ) -> Result<(PathBuf, PathBuf)> {
        let addons_dir = addons_dir
            .or(self.addons_dir)
            .context("no add-ons directory configured, pass --addons-dir")?;
        let profile_dir = profile_dir
            .or(self.profile_dir)
            .context("no profile directory configured, pass --profile-dir")?;
        Ok((addons_dir, profile_dir))
    }
}
