use std::{collections::HashMap, path::PathBuf, sync::Arc};

use addon_settings::{SettingKind, SettingsDefinition, XmlDocument};
use tracing::{debug, error, info};

use crate::{
    host::{AddonRegistry, ScriptRuntime},
    info::{ADDON_SETTINGS_ID, AddonInfo, AddonInstanceId},
};

const RESOURCES_DIR: &str = "resources";
const SETTINGS_FILE: &str = "settings.xml";
const INSTANCE_SETTINGS_FILE: &str = "instance-settings.xml";

/// Load state of one instance's settings.
#[derive(Debug, Default)]
enum SettingsSlot {
    /// Never loaded, or reset.
    #[default]
    Absent,
    /// The definition is missing or broken. Only a forced load retries.
    Failed,
    Ready(SettingsDefinition),
}

/// Settings of an installed add-on and of its configured instances.
///
/// Definitions are loaded lazily from the add-on's installation directory on
/// first use. User values live in the add-on's profile directory and are only
/// written by [`Addon::save_settings`].
pub struct Addon {
    info: AddonInfo,
    registry: Arc<dyn AddonRegistry>,
    script_runtime: Option<Arc<dyn ScriptRuntime>>,
    slots: HashMap<AddonInstanceId, SettingsSlot>,
}

impl Addon {
    pub fn new(info: AddonInfo, registry: Arc<dyn AddonRegistry>) -> Self {
        Self {
            info,
            registry,
            script_runtime: None,
            slots: HashMap::new(),
        }
    }

    pub fn with_script_runtime(mut self, runtime: Arc<dyn ScriptRuntime>) -> Self {
        self.script_runtime = Some(runtime);
        self
    }

    pub fn id(&self) -> &str {
        self.info.id()
    }

    pub fn info(&self) -> &AddonInfo {
        &self.info
    }

    pub fn settings_definition_path(&self, id: AddonInstanceId) -> PathBuf {
        let file = if id.is_addon_settings() {
            SETTINGS_FILE
        } else {
            INSTANCE_SETTINGS_FILE
        };
        self.info.path().join(RESOURCES_DIR).join(file)
    }

    pub fn user_settings_path(&self, id: AddonInstanceId) -> PathBuf {
        if id.is_addon_settings() {
            self.info.profile_path().join(SETTINGS_FILE)
        } else {
            self.info
                .profile_path()
                .join(format!("instance-settings-{id}.xml"))
        }
    }

    pub fn can_have_addon_or_instance_settings(&mut self) -> bool {
        self.has_settings(ADDON_SETTINGS_ID)
    }

    pub fn has_settings(&mut self, id: AddonInstanceId) -> bool {
        self.load_settings(false, true, id)
            && self
                .definition(id)
                .is_some_and(SettingsDefinition::has_settings)
    }

    pub fn settings_initialized(&self, id: AddonInstanceId) -> bool {
        self.definition(id)
            .is_some_and(SettingsDefinition::is_initialized)
    }

    pub fn settings_loaded(&self, id: AddonInstanceId) -> bool {
        self.definition(id).is_some_and(SettingsDefinition::is_loaded)
    }

    /// Loads the settings definition of an instance.
    ///
    /// Returns `true` right away when the definition is already initialized
    /// and `false` right away when an earlier attempt failed, unless `force`
    /// is set. Forcing discards the current definition and reads it again.
    pub fn load_settings(
        &mut self,
        force: bool,
        load_user_settings: bool,
        id: AddonInstanceId,
    ) -> bool {
        match self.slots.get(&id) {
            Some(SettingsSlot::Ready(definition)) if definition.is_initialized() && !force => {
                return true;
            }
            Some(SettingsSlot::Failed) if !force => return false,
            _ => {}
        }

        // assume loading fails until the definition is initialized
        self.slots.insert(id, SettingsSlot::Failed);

        let path = self.settings_definition_path(id);
        if !path.exists() {
            debug!(
                addon = %self.info.id(),
                instance = %id,
                path = %path.display(),
                "add-on has no settings definition",
            );
            return false;
        }

        let schema = match XmlDocument::load_file(&path) {
            Ok(schema) => schema,
            Err(err) => {
                error!(
                    addon = %self.info.id(),
                    path = %path.display(),
                    "failed to load settings definition: {err}",
                );
                return false;
            }
        };

        let mut definition = SettingsDefinition::new();
        if let Err(err) = definition.initialize(&schema) {
            error!(
                addon = %self.info.id(),
                instance = %id,
                "failed to initialize add-on settings: {err}",
            );
            return false;
        }

        self.slots.insert(id, SettingsSlot::Ready(definition));

        if load_user_settings {
            self.load_user_settings(id);
        }

        true
    }

    pub fn reload_settings(&mut self, id: AddonInstanceId) -> bool {
        self.load_settings(true, true, id)
    }

    /// Forgets the instance's settings; the next access reads them again.
    pub fn reset_settings(&mut self, id: AddonInstanceId) {
        self.slots.remove(&id);
    }

    /// Merges the user's saved values into an initialized definition.
    ///
    /// A missing user file is not an error: the definition is marked loaded
    /// with its defaults. A broken one leaves the current values untouched.
    pub fn load_user_settings(&mut self, id: AddonInstanceId) -> bool {
        if !self.settings_initialized(id) {
            return false;
        }

        let path = self.user_settings_path(id);
        match XmlDocument::load_file(&path) {
            Ok(document) => self.settings_from_xml(&document, true, id),
            Err(err) if err.is_not_found() => {
                if let Some(definition) = ready_mut(&mut self.slots, id) {
                    definition.set_has_user_settings(false);
                    definition.set_loaded();
                }
                debug!(
                    addon = %self.info.id(),
                    instance = %id,
                    "no user settings, using defaults",
                );
                true
            }
            Err(err) => {
                error!(
                    addon = %self.info.id(),
                    path = %path.display(),
                    "failed to load user settings: {err}",
                );
                false
            }
        }
    }

    pub fn has_user_settings(&mut self, id: AddonInstanceId) -> bool {
        if !self.load_settings(false, true, id) {
            return false;
        }

        self.definition(id)
            .is_some_and(|definition| definition.is_loaded() && definition.has_user_settings())
    }

    pub fn has_settings_to_save(&self, id: AddonInstanceId) -> bool {
        self.settings_loaded(id)
    }

    /// Writes the instance's values to its user settings file and tells the
    /// host about the change. Does nothing until the values are loaded.
    pub fn save_settings(&mut self, id: AddonInstanceId) -> bool {
        if !self.has_settings_to_save(id) {
            return false;
        }

        let Some(document) = self.settings_to_xml(id) else {
            return false;
        };

        let path = self.user_settings_path(id);
        if let Err(err) = document.save_file(&path) {
            error!(
                addon = %self.info.id(),
                path = %path.display(),
                "failed to save add-on settings: {err}",
            );
            return false;
        }

        if let Some(definition) = ready_mut(&mut self.slots, id) {
            definition.set_has_user_settings(true);
        }

        info!(
            addon = %self.info.id(),
            instance = %id,
            path = %path.display(),
            "saved add-on settings",
        );

        self.registry.reload_settings(self.info.id(), id);
        if let Some(runtime) = &self.script_runtime {
            runtime.on_settings_changed(self.info.id(), id);
        }

        true
    }

    /// String form of a setting's current value; empty when the key is
    /// unknown or the add-on has no settings.
    pub fn get_setting(&mut self, key: &str, id: AddonInstanceId) -> String {
        if key.is_empty() || !self.load_settings(false, true, id) {
            return String::new();
        }

        self.definition(id)
            .and_then(|definition| definition.get_setting(key))
            .map(|setting| setting.value().to_string())
            .unwrap_or_default()
    }

    /// Assigns a value in string form, defining the key as a string setting
    /// first when it is unknown.
    pub fn update_setting(&mut self, key: &str, value: &str, id: AddonInstanceId) -> bool {
        if key.is_empty() || !self.load_settings(false, true, id) {
            return false;
        }

        let Some(definition) = ready_mut(&mut self.slots, id) else {
            return false;
        };

        if definition.get_setting(key).is_none()
            && definition.add_setting(key, value.to_owned()).is_none()
        {
            error!(
                addon = %self.info.id(),
                setting = key,
                "failed to add undefined setting",
            );
            return false;
        }

        let Some(setting) = definition.get_setting_mut(key) else {
            return false;
        };
        if !setting.from_string(value) {
            debug!(
                addon = %self.info.id(),
                setting = key,
                expected = %setting.setting_type(),
                "ignoring invalid setting value",
            );
            return false;
        }
        true
    }

    /// Current value of a setting whose type is `T`.
    pub fn get_setting_value<T: SettingKind>(
        &mut self,
        key: &str,
        id: AddonInstanceId,
    ) -> Option<T> {
        if key.is_empty() || !self.has_settings(id) {
            return None;
        }

        let setting = self.definition(id)?.get_setting(key)?;
        let value = T::from_setting_value(setting.value());
        if value.is_none() {
            debug!(
                addon = %self.info.id(),
                setting = key,
                expected = %T::TYPE,
                actual = %setting.setting_type(),
                "setting type mismatch",
            );
        }
        value
    }

    /// Assigns a setting of type `T`, defining it first when it is unknown.
    /// Fails when the key already holds a different type.
    pub fn update_setting_value<T: SettingKind>(
        &mut self,
        key: &str,
        value: T,
        id: AddonInstanceId,
    ) -> bool {
        if key.is_empty() || !self.has_settings(id) {
            return false;
        }

        let Some(definition) = ready_mut(&mut self.slots, id) else {
            return false;
        };

        if definition.get_setting(key).is_none()
            && definition.add_setting(key, value.clone()).is_none()
        {
            error!(
                addon = %self.info.id(),
                setting = key,
                "failed to add undefined setting",
            );
            return false;
        }

        let Some(setting) = definition.get_setting_mut(key) else {
            return false;
        };
        if setting.setting_type() != T::TYPE {
            debug!(
                addon = %self.info.id(),
                setting = key,
                expected = %setting.setting_type(),
                actual = %T::TYPE,
                "setting type mismatch",
            );
            return false;
        }
        setting.set_value(value.into_setting_value())
    }

    pub fn get_setting_bool(&mut self, key: &str, id: AddonInstanceId) -> Option<bool> {
        self.get_setting_value(key, id)
    }

    pub fn get_setting_int(&mut self, key: &str, id: AddonInstanceId) -> Option<i32> {
        self.get_setting_value(key, id)
    }

    pub fn get_setting_number(&mut self, key: &str, id: AddonInstanceId) -> Option<f64> {
        self.get_setting_value(key, id)
    }

    pub fn get_setting_string(&mut self, key: &str, id: AddonInstanceId) -> Option<String> {
        self.get_setting_value(key, id)
    }

    pub fn update_setting_bool(&mut self, key: &str, value: bool, id: AddonInstanceId) -> bool {
        self.update_setting_value(key, value, id)
    }

    pub fn update_setting_int(&mut self, key: &str, value: i32, id: AddonInstanceId) -> bool {
        self.update_setting_value(key, value, id)
    }

    pub fn update_setting_number(&mut self, key: &str, value: f64, id: AddonInstanceId) -> bool {
        self.update_setting_value(key, value, id)
    }

    pub fn update_setting_string(
        &mut self,
        key: &str,
        value: impl Into<String>,
        id: AddonInstanceId,
    ) -> bool {
        self.update_setting_value(key, value.into(), id)
    }

    /// Merges the values of `document` into the instance's settings.
    ///
    /// The add-on's schema is loaded first when nothing was loaded yet. Only
    /// without a schema is the document itself taken as the definition. The
    /// merge is applied as a whole or not at all.
    pub fn settings_from_xml(
        &mut self,
        document: &XmlDocument,
        load_defaults: bool,
        id: AddonInstanceId,
    ) -> bool {
        if matches!(self.slots.get(&id), None | Some(SettingsSlot::Absent)) {
            self.load_settings(false, false, id);
        }

        let addon_id = self.info.id();
        let slot = self.slots.entry(id).or_default();

        if !matches!(slot, SettingsSlot::Ready(definition) if definition.is_initialized()) {
            let mut definition = SettingsDefinition::new();
            if let Err(err) = definition.initialize(document) {
                error!(
                    addon = %addon_id,
                    instance = %id,
                    "failed to initialize add-on settings: {err}",
                );
                return false;
            }
            *slot = SettingsSlot::Ready(definition);
        }

        let SettingsSlot::Ready(definition) = slot else {
            return false;
        };

        let mut staged = definition.clone();
        if load_defaults {
            staged.set_defaults();
        }
        if let Err(err) = staged.load(document) {
            error!(
                addon = %addon_id,
                instance = %id,
                "failed to load user settings: {err}",
            );
            return false;
        }

        staged.set_has_user_settings(true);
        *definition = staged;
        true
    }

    pub fn settings_to_xml(&self, id: AddonInstanceId) -> Option<XmlDocument> {
        let definition = self
            .definition(id)
            .filter(|definition| definition.is_initialized())?;

        match definition.save() {
            Ok(document) => Some(document),
            Err(err) => {
                error!(
                    addon = %self.info.id(),
                    instance = %id,
                    "failed to save add-on settings: {err}",
                );
                None
            }
        }
    }

    /// The instance's settings definition, loading it on first access.
    pub fn settings(&mut self, id: AddonInstanceId) -> Option<&SettingsDefinition> {
        self.load_settings(false, true, id);
        self.definition(id)
    }

    pub fn settings_mut(&mut self, id: AddonInstanceId) -> Option<&mut SettingsDefinition> {
        self.load_settings(false, true, id);
        ready_mut(&mut self.slots, id)
    }

    fn definition(&self, id: AddonInstanceId) -> Option<&SettingsDefinition> {
        match self.slots.get(&id) {
            Some(SettingsSlot::Ready(definition)) => Some(definition),
            _ => None,
        }
    }
}

fn ready_mut(
    slots: &mut HashMap<AddonInstanceId, SettingsSlot>,
    id: AddonInstanceId,
) -> Option<&mut SettingsDefinition> {
    match slots.get_mut(&id) {
        Some(SettingsSlot::Ready(definition)) => Some(definition),
        _ => None,
    }
}
