use std::{
    fmt,
    path::{Path, PathBuf},
};

/// Distinguishes independently configured instances of one add-on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AddonInstanceId(pub u32);

/// The add-on's own settings, as opposed to those of a configured instance.
pub const ADDON_SETTINGS_ID: AddonInstanceId = AddonInstanceId(0);

pub const ADDON_FIRST_INSTANCE_ID: AddonInstanceId = AddonInstanceId(1);

impl AddonInstanceId {
    pub fn is_addon_settings(self) -> bool {
        self == ADDON_SETTINGS_ID
    }
}

impl From<u32> for AddonInstanceId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl fmt::Display for AddonInstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity and on-disk locations of an installed add-on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddonInfo {
    id: String,
    path: PathBuf,
    profile_path: PathBuf,
}

impl AddonInfo {
    pub fn new(
        id: impl Into<String>,
        path: impl Into<PathBuf>,
        profile_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            profile_path: profile_path.into(),
        }
    }

    /// Lays the add-on out as `<addons_root>/<id>` with its profile in
    /// `<profile_root>/<id>`.
    pub fn under(id: impl Into<String>, addons_root: &Path, profile_root: &Path) -> Self {
        let id = id.into();
        Self {
            path: addons_root.join(&id),
            profile_path: profile_root.join(&id),
            id,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Installation directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn profile_path(&self) -> &Path {
        &self.profile_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn under_joins_id_onto_both_roots() {
        let info = AddonInfo::under("script.example", Path::new("/addons"), Path::new("/profile"));
        assert_eq!(info.id(), "script.example");
        assert_eq!(info.path(), Path::new("/addons/script.example"));
        assert_eq!(info.profile_path(), Path::new("/profile/script.example"));
    }

    #[test]
    fn default_instance_is_addon_settings() {
        assert!(AddonInstanceId::default().is_addon_settings());
        assert!(!ADDON_FIRST_INSTANCE_ID.is_addon_settings());
        assert_eq!(AddonInstanceId::from(4).to_string(), "4");
    }
}
