use std::{io::Write, path::Path};

use addon_core::{Addon, AddonInstanceId, AddonRegistry, SettingType, SettingValue, XmlDocument};
use anyhow::{Context, Result, bail};
use clap::ValueEnum;
use serde::Serialize;
use tracing::info;

/// Registry for a one-shot process: nothing else is running, so a change
/// only needs to be reported.
pub struct LoggingRegistry;

impl AddonRegistry for LoggingRegistry {
    fn reload_settings(&self, addon_id: &str, id: AddonInstanceId) {
        info!(addon = addon_id, instance = %id, "settings changed");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ValueKind {
    Bool,
    Int,
    Number,
    String,
}

impl From<ValueKind> for SettingType {
    fn from(kind: ValueKind) -> Self {
        match kind {
            ValueKind::Bool => SettingType::Boolean,
            ValueKind::Int => SettingType::Integer,
            ValueKind::Number => SettingType::Number,
            ValueKind::String => SettingType::String,
        }
    }
}

#[derive(Serialize)]
struct SettingRow<'a> {
    id: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    value: serde_json::Value,
    default: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    label: Option<&'a str>,
}

fn json_value(value: &SettingValue) -> serde_json::Value {
    match value {
        SettingValue::Boolean(value) => serde_json::Value::Bool(*value),
        SettingValue::Integer(value) => serde_json::Value::from(*value),
        SettingValue::Number(value) => serde_json::Value::from(*value),
        SettingValue::String(value) => serde_json::Value::String(value.clone()),
    }
}

fn ensure_settings(addon: &mut Addon, id: AddonInstanceId) -> Result<()> {
    if !addon.has_settings(id) {
        bail!("add-on {} has no settings for instance {id}", addon.id());
    }
    Ok(())
}

fn save(addon: &mut Addon, id: AddonInstanceId) -> Result<()> {
    if !addon.save_settings(id) {
        bail!("failed to save settings of {}", addon.id());
    }
    Ok(())
}

pub fn list(
    addon: &mut Addon,
    id: AddonInstanceId,
    json: bool,
    out: &mut impl Write,
) -> Result<()> {
    ensure_settings(addon, id)?;
    let settings = addon.settings(id).context("settings are not available")?;

    if json {
        let rows: Vec<_> = settings
            .iter()
            .map(|setting| SettingRow {
                id: setting.id(),
                kind: setting.setting_type().as_str(),
                value: json_value(setting.value()),
                default: setting.is_default(),
                label: setting.label(),
            })
            .collect();
        serde_json::to_writer_pretty(&mut *out, &rows)?;
        writeln!(out)?;
        return Ok(());
    }

    for setting in settings.iter() {
        let marker = if setting.is_default() { "\t(default)" } else { "" };
        writeln!(
            out,
            "{}\t{}\t{}{marker}",
            setting.id(),
            setting.setting_type(),
            setting.value()
        )?;
    }
    Ok(())
}

pub fn get(addon: &mut Addon, id: AddonInstanceId, key: &str, out: &mut impl Write) -> Result<()> {
    ensure_settings(addon, id)?;
    let setting = addon
        .settings(id)
        .and_then(|settings| settings.get_setting(key))
        .with_context(|| format!("setting \"{key}\" is not defined"))?;
    writeln!(out, "{}", setting.value())?;
    Ok(())
}

pub fn set(
    addon: &mut Addon,
    id: AddonInstanceId,
    key: &str,
    value: &str,
    kind: Option<ValueKind>,
) -> Result<()> {
    ensure_settings(addon, id)?;

    let updated = match kind {
        None => addon.update_setting(key, value, id),
        Some(kind) => {
            let setting_type = SettingType::from(kind);
            let parsed = setting_type
                .parse_value(value)
                .with_context(|| format!("\"{value}\" is not a valid {setting_type}"))?;
            match parsed {
                SettingValue::Boolean(value) => addon.update_setting_bool(key, value, id),
                SettingValue::Integer(value) => addon.update_setting_int(key, value, id),
                SettingValue::Number(value) => addon.update_setting_number(key, value, id),
                SettingValue::String(value) => addon.update_setting_string(key, value, id),
            }
        }
    };
    if !updated {
        bail!("cannot set \"{key}\" to \"{value}\"");
    }

    save(addon, id)
}

pub fn defaults(addon: &mut Addon, id: AddonInstanceId) -> Result<()> {
    ensure_settings(addon, id)?;
    addon
        .settings_mut(id)
        .context("settings are not available")?
        .set_defaults();
    save(addon, id)
}

pub fn export(
    addon: &mut Addon,
    id: AddonInstanceId,
    output: Option<&Path>,
    out: &mut impl Write,
) -> Result<()> {
    ensure_settings(addon, id)?;
    let document = addon
        .settings_to_xml(id)
        .context("failed to serialize settings")?;
    let text = document.to_xml_string();

    match output {
        Some(path) => {
            addon_fs::write(path, &text)
                .with_context(|| format!("failed to export settings to {}", path.display()))?;
            info!(addon = %addon.id(), path = %path.display(), "exported settings");
        }
        None => out.write_all(text.as_bytes())?,
    }
    Ok(())
}

/// Merges a values document into the add-on's settings. Without a schema the
/// document itself defines them.
pub fn import(addon: &mut Addon, id: AddonInstanceId, file: &Path) -> Result<()> {
    let document = XmlDocument::load_file(file)
        .with_context(|| format!("failed to read {}", file.display()))?;

    addon.load_settings(false, true, id);
    if !addon.settings_from_xml(&document, true, id) {
        bail!("{} does not hold settings values", file.display());
    }

    save(addon, id)
}
