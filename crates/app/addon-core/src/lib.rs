mod addon;
pub mod host;
mod info;

pub use addon::Addon;
pub use addon_settings::{
    Setting, SettingKind, SettingType, SettingValue, SettingsDefinition, XmlDocument,
};
pub use host::{AddonRegistry, ScriptRuntime};
pub use info::{ADDON_FIRST_INSTANCE_ID, ADDON_SETTINGS_ID, AddonInfo, AddonInstanceId};
