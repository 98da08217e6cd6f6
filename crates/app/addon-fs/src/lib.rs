//! Filesystem helpers shared by the settings crates.
//!
//! Files are never written in place: contents go to a hidden sibling file that
//! is then renamed over the target, so readers see either the old or the new
//! document.

use std::{
    fs, io,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

const TEMP_PREFIX: &str = ".addon-settings-";

/// Replaces `file_path` atomically. The parent directory must exist.
pub fn write<P: AsRef<Path>>(file_path: P, contents: impl AsRef<[u8]>) -> Result<()> {
    let file_path = file_path.as_ref();
    let parent_dir = parent_of(file_path)?;

    replace(parent_dir, file_path, contents.as_ref())
        .with_context(|| format!("Failed to write {}", file_path.display()))
}

/// Replaces `file_path` atomically, creating missing parent directories.
pub fn create_dirs_then_write<P: AsRef<Path>>(
    file_path: P,
    contents: impl AsRef<[u8]>,
) -> io::Result<()> {
    let file_path = file_path.as_ref();
    let parent_dir = parent_of(file_path)?;

    if !parent_dir.as_os_str().is_empty() {
        fs::create_dir_all(parent_dir)?;
    }
    replace(parent_dir, file_path, contents.as_ref())
}

fn parent_of(file_path: &Path) -> io::Result<&Path> {
    file_path.parent().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} has no parent directory", file_path.display()),
        )
    })
}

fn replace(dir: &Path, file_path: &Path, contents: &[u8]) -> io::Result<()> {
    let temp_path = temp_path_in(dir);
    fs::write(&temp_path, contents)?;

    fs::rename(&temp_path, file_path).inspect_err(|_| {
        let _ = fs::remove_file(&temp_path);
    })
}

fn temp_path_in(dir: &Path) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos())
        .unwrap_or_default();

    dir.join(format!("{TEMP_PREFIX}{}-{nanos}", std::process::id()))
}

/// Deserializes a TOML file, falling back to `T::default()` when it does not
/// exist.
pub fn read_toml_file_or_default<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(T::default()),
        Err(err) => {
            return Err(err).with_context(|| format!("Failed to read {}", path.display()));
        }
    };

    toml::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn write_replaces_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.xml");

        write(&path, "first").unwrap();
        write(&path, "second").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
        assert_eq!(entries(dir.path()), vec!["settings.xml".to_owned()]);
    }

    #[test]
    fn write_fails_without_parent_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("settings.xml");

        assert!(write(&path, "data").is_err());
        assert!(!path.exists());
    }

    #[test]
    fn create_dirs_then_write_creates_nested_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir
            .path()
            .join("userdata")
            .join("plugin.video.example")
            .join("settings.xml");

        create_dirs_then_write(&path, "<settings />").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "<settings />");
        assert_eq!(
            entries(path.parent().unwrap()),
            vec!["settings.xml".to_owned()]
        );
    }

    #[derive(Debug, Default, Deserialize, PartialEq)]
    struct Sample {
        name: Option<String>,
        #[serde(default)]
        retries: u32,
    }

    #[test]
    fn read_toml_missing_file_yields_default() {
        let dir = TempDir::new().unwrap();
        let value: Sample = read_toml_file_or_default(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(value, Sample::default());
    }

    #[test]
    fn read_toml_parses_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "name = \"kitchen\"\nretries = 3\n").unwrap();

        let value: Sample = read_toml_file_or_default(&path).unwrap();
        assert_eq!(
            value,
            Sample {
                name: Some("kitchen".to_owned()),
                retries: 3
            }
        );
    }

    #[test]
    fn read_toml_reports_parse_errors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "name = [unterminated").unwrap();

        let err = read_toml_file_or_default::<Sample>(&path).unwrap_err();
        assert!(err.to_string().contains("config.toml"));
    }
}
