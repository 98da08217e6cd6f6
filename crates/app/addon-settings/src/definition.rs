use indexmap::{IndexMap, map::Entry};
use tracing::{debug, warn};

use crate::{
    error::{Error, Result},
    setting::{Setting, SettingKind, SettingType},
    xml::{XmlDocument, XmlElement},
};

const ROOT: &str = "settings";
const SETTING: &str = "setting";
const CONTAINERS: [&str; 3] = ["section", "category", "group"];
const VALUES_VERSION: &str = "2";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DefinitionState {
    #[default]
    Uninitialized,
    Initialized,
    Loaded,
}

/// Schema and current values of one settings set.
#[derive(Debug, Clone, Default)]
pub struct SettingsDefinition {
    state: DefinitionState,
    settings: IndexMap<String, Setting>,
    has_user_settings: bool,
}

impl SettingsDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> DefinitionState {
        self.state
    }

    pub fn is_initialized(&self) -> bool {
        self.state != DefinitionState::Uninitialized
    }

    pub fn is_loaded(&self) -> bool {
        self.state == DefinitionState::Loaded
    }

    /// Marks the values as loaded. Has no effect before initialization.
    pub fn set_loaded(&mut self) {
        if self.is_initialized() {
            self.state = DefinitionState::Loaded;
        }
    }

    pub fn has_user_settings(&self) -> bool {
        self.has_user_settings
    }

    pub fn set_has_user_settings(&mut self, has_user_settings: bool) {
        self.has_user_settings = has_user_settings;
    }

    pub fn has_settings(&self) -> bool {
        !self.settings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.settings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.settings.is_empty()
    }

    /// Settings in definition order.
    pub fn iter(&self) -> impl Iterator<Item = &Setting> {
        self.settings.values()
    }

    /// Builds the typed settings described by a schema document.
    pub fn initialize(&mut self, schema: &XmlDocument) -> Result<()> {
        if self.is_initialized() {
            return Err(Error::AlreadyInitialized);
        }

        let root = expect_root(schema)?;
        let sectioned = root.child("section").is_some();

        let mut settings = IndexMap::new();
        collect_definitions(root, sectioned, &mut settings)?;

        debug!(count = settings.len(), sectioned, "settings definition initialized");

        self.settings = settings;
        self.has_user_settings = false;
        self.state = DefinitionState::Initialized;
        Ok(())
    }

    pub fn uninitialize(&mut self) {
        self.settings.clear();
        self.has_user_settings = false;
        self.state = DefinitionState::Uninitialized;
    }

    /// Applies the values of a document onto the defined settings.
    ///
    /// Values for undefined settings are ignored and values that do not parse
    /// as their setting's type are skipped.
    pub fn load(&mut self, values: &XmlDocument) -> Result<()> {
        if !self.is_initialized() {
            return Err(Error::NotInitialized);
        }

        let root = expect_root(values)?;
        let mut entries = Vec::new();
        collect_values(root, &mut entries);

        let mut applied = 0usize;
        for (id, text) in entries {
            let Some(setting) = self.settings.get_mut(id) else {
                debug!(setting = id, "ignoring value of undefined setting");
                continue;
            };
            if setting.from_string(text) {
                applied += 1;
            } else {
                warn!(
                    setting = id,
                    value = text,
                    expected = %setting.setting_type(),
                    "ignoring invalid setting value",
                );
            }
        }

        debug!(applied, "setting values loaded");
        self.state = DefinitionState::Loaded;
        Ok(())
    }

    /// Serializes the current values into a user-values document.
    pub fn save(&self) -> Result<XmlDocument> {
        if !self.is_initialized() {
            return Err(Error::NotInitialized);
        }

        let mut root = XmlElement::new(ROOT).with_attribute("version", VALUES_VERSION);
        for setting in self.settings.values() {
            let mut element = XmlElement::new(SETTING).with_attribute("id", setting.id());
            if setting.is_default() {
                element.set_attribute("default", "true");
            }
            root.push_child(element.with_text(setting.value().to_string()));
        }
        Ok(XmlDocument::new(root))
    }

    pub fn set_defaults(&mut self) {
        for setting in self.settings.values_mut() {
            setting.reset();
        }
    }

    /// Defines a setting at runtime, typed after `T` and defaulting to `value`.
    ///
    /// An existing setting of the same type is returned unchanged; one of a
    /// different type yields `None`.
    pub fn add_setting<T: SettingKind>(&mut self, key: &str, value: T) -> Option<&mut Setting> {
        if key.is_empty() || !self.is_initialized() {
            return None;
        }

        match self.settings.entry(key.to_owned()) {
            Entry::Occupied(entry) => {
                let setting = entry.into_mut();
                (setting.setting_type() == T::TYPE).then_some(setting)
            }
            Entry::Vacant(entry) => {
                debug!(setting = key, kind = %T::TYPE, "defining setting at runtime");
                Some(entry.insert(Setting::new(key, value.into_setting_value())))
            }
        }
    }

    pub fn get_setting(&self, key: &str) -> Option<&Setting> {
        self.settings.get(key)
    }

    pub fn get_setting_mut(&mut self, key: &str) -> Option<&mut Setting> {
        self.settings.get_mut(key)
    }
}

enum SchemaKind {
    Value(SettingType),
    Decoration,
}

fn schema_kind(name: &str, option: Option<&str>, sectioned: bool) -> Option<SchemaKind> {
    let kind = match name {
        "boolean" | "bool" => SchemaKind::Value(SettingType::Boolean),
        "integer" | "enum" => SchemaKind::Value(SettingType::Integer),
        "number" if sectioned => SchemaKind::Value(SettingType::Number),
        "number" => SchemaKind::Value(SettingType::Integer),
        "slider" if option == Some("float") => SchemaKind::Value(SettingType::Number),
        "slider" => SchemaKind::Value(SettingType::Integer),
        "string" | "path" | "addon" | "date" | "time" | "urlencodedstring" | "text"
        | "ipaddress" | "select" | "labelenum" | "file" | "folder" | "fileenum" | "audio"
        | "video" | "image" | "executable" => SchemaKind::Value(SettingType::String),
        list if list.starts_with("list[") => SchemaKind::Value(SettingType::String),
        "action" | "sep" | "lsep" => SchemaKind::Decoration,
        _ => return None,
    };
    Some(kind)
}

fn expect_root(document: &XmlDocument) -> Result<&XmlElement> {
    let root = document.root();
    if root.name() != ROOT {
        return Err(Error::Schema(format!(
            "expected <{ROOT}> root element, found <{}>",
            root.name()
        )));
    }
    Ok(root)
}

fn collect_definitions(
    element: &XmlElement,
    sectioned: bool,
    settings: &mut IndexMap<String, Setting>,
) -> Result<()> {
    for child in element.children() {
        if child.name() == SETTING {
            let Some(setting) = parse_definition(child, sectioned)? else {
                continue;
            };
            if settings.contains_key(setting.id()) {
                return Err(Error::Schema(format!(
                    "setting \"{}\" is defined more than once",
                    setting.id()
                )));
            }
            settings.insert(setting.id().to_owned(), setting);
        } else if CONTAINERS.contains(&child.name()) {
            collect_definitions(child, sectioned, settings)?;
        }
    }
    Ok(())
}

fn parse_definition(element: &XmlElement, sectioned: bool) -> Result<Option<Setting>> {
    let id = element.attribute("id").map(str::trim).unwrap_or_default();

    let type_name = element.attribute("type");
    let setting_type = match type_name {
        // Value-only documents carry no types; their entries are strings.
        None => SettingType::String,
        Some(name) => match schema_kind(name, element.attribute("option"), sectioned) {
            Some(SchemaKind::Value(setting_type)) => setting_type,
            Some(SchemaKind::Decoration) => return Ok(None),
            None => {
                return Err(Error::Schema(format!(
                    "setting \"{id}\" has unknown type \"{name}\""
                )));
            }
        },
    };

    if id.is_empty() {
        return Err(Error::Schema(format!(
            "{setting_type} setting without an id"
        )));
    }

    // In value-only documents `default` is a marker, not a value.
    let default_text = type_name
        .and(
            element
                .child("default")
                .map(XmlElement::text)
                .or_else(|| element.attribute("default")),
        )
        .filter(|text| !text.trim().is_empty() || setting_type == SettingType::String);

    let default = match default_text {
        None => setting_type.zero_value(),
        Some(text) => setting_type.parse_value(text).ok_or_else(|| {
            Error::Schema(format!(
                "default \"{text}\" of setting \"{id}\" is not a valid {setting_type}"
            ))
        })?,
    };

    let mut setting = Setting::new(id, default);
    if let Some(label) = element.attribute("label") {
        setting = setting.with_label(label);
    }
    Ok(Some(setting))
}

fn collect_values<'a>(element: &'a XmlElement, entries: &mut Vec<(&'a str, &'a str)>) {
    for child in element.children() {
        if child.name() == SETTING {
            let Some(id) = child.attribute("id") else {
                continue;
            };
            // Definition entries carry a type and hold no value of their own.
            let value = child.attribute("value").or_else(|| {
                (child.attribute("type").is_none() && child.children().next().is_none())
                    .then(|| child.text())
            });
            if let Some(value) = value {
                entries.push((id, value));
            }
        } else if CONTAINERS.contains(&child.name()) {
            collect_values(child, entries);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setting::SettingValue;

    const SECTIONED_SCHEMA: &str = r#"
        <settings version="1">
            <section id="plugin.video.example">
                <category id="general" label="30000">
                    <group id="1">
                        <setting id="enabled" type="boolean" label="30001">
                            <level>0</level>
                            <default>true</default>
                            <control type="toggle" />
                        </setting>
                        <setting id="retries" type="integer">
                            <default>3</default>
                        </setting>
                        <setting id="ratio" type="number">
                            <default>1.5</default>
                        </setting>
                        <setting id="username" type="string" />
                        <setting id="refresh" type="action" />
                    </group>
                </category>
            </section>
        </settings>"#;

    const FLAT_SCHEMA: &str = r#"
        <settings>
            <category label="General">
                <setting id="enabled" type="bool" default="false" label="Enabled" />
                <setting type="sep" />
                <setting id="count" type="number" default="5" />
                <setting id="volume" type="slider" option="float" default="0.5" />
                <setting id="quality" type="enum" values="Low|High" default="1" />
                <setting id="folder" type="folder" default="/media" />
            </category>
        </settings>"#;

    fn initialized(schema: &str) -> SettingsDefinition {
        let mut definition = SettingsDefinition::new();
        definition
            .initialize(&XmlDocument::parse(schema).unwrap())
            .unwrap();
        definition
    }

    fn value(definition: &SettingsDefinition, key: &str) -> SettingValue {
        definition.get_setting(key).unwrap().value().clone()
    }

    #[test]
    fn initializes_sectioned_schema() {
        let definition = initialized(SECTIONED_SCHEMA);

        assert_eq!(definition.state(), DefinitionState::Initialized);
        let ids: Vec<_> = definition.iter().map(Setting::id).collect();
        assert_eq!(ids, ["enabled", "retries", "ratio", "username"]);
        assert_eq!(value(&definition, "enabled"), SettingValue::Boolean(true));
        assert_eq!(value(&definition, "retries"), SettingValue::Integer(3));
        assert_eq!(value(&definition, "ratio"), SettingValue::Number(1.5));
        assert_eq!(
            value(&definition, "username"),
            SettingValue::String(String::new())
        );
        assert_eq!(
            definition.get_setting("enabled").unwrap().label(),
            Some("30001")
        );
    }

    #[test]
    fn initializes_flat_schema() {
        let definition = initialized(FLAT_SCHEMA);

        assert_eq!(definition.len(), 5);
        assert_eq!(value(&definition, "enabled"), SettingValue::Boolean(false));
        assert_eq!(value(&definition, "count"), SettingValue::Integer(5));
        assert_eq!(value(&definition, "volume"), SettingValue::Number(0.5));
        assert_eq!(value(&definition, "quality"), SettingValue::Integer(1));
        assert_eq!(
            value(&definition, "folder"),
            SettingValue::String("/media".to_owned())
        );
    }

    #[test]
    fn empty_schema_has_no_settings() {
        let definition = initialized("<settings />");
        assert!(definition.is_initialized());
        assert!(!definition.has_settings());
    }

    #[test]
    fn rejects_malformed_schemas() {
        for schema in [
            r#"<addon id="x" />"#,
            r#"<settings><setting type="bool" default="true" /></settings>"#,
            r#"<settings><setting id="a" type="colour" /></settings>"#,
            r#"<settings><setting id="a" type="bool" default="yes" /></settings>"#,
            r#"<settings><setting id="a" type="bool" /><setting id="a" type="text" /></settings>"#,
        ] {
            let mut definition = SettingsDefinition::new();
            let err = definition
                .initialize(&XmlDocument::parse(schema).unwrap())
                .unwrap_err();
            assert!(matches!(err, Error::Schema(_)), "{schema}: {err:?}");
            assert!(!definition.is_initialized());
        }
    }

    #[test]
    fn initialize_twice_requires_uninitialize() {
        let schema = XmlDocument::parse(FLAT_SCHEMA).unwrap();
        let mut definition = SettingsDefinition::new();
        definition.initialize(&schema).unwrap();

        assert!(matches!(
            definition.initialize(&schema),
            Err(Error::AlreadyInitialized)
        ));

        definition.uninitialize();
        assert!(!definition.has_settings());
        definition.initialize(&schema).unwrap();
        assert!(definition.has_settings());
    }

    #[test]
    fn load_applies_known_values_only() {
        let mut definition = initialized(SECTIONED_SCHEMA);
        let values = XmlDocument::parse(
            r#"<settings version="2">
                <setting id="enabled">false</setting>
                <setting id="retries" default="true">3</setting>
                <setting id="ratio">not-a-number</setting>
                <setting id="unknown">value</setting>
            </settings>"#,
        )
        .unwrap();

        definition.load(&values).unwrap();

        assert!(definition.is_loaded());
        assert_eq!(value(&definition, "enabled"), SettingValue::Boolean(false));
        assert_eq!(value(&definition, "ratio"), SettingValue::Number(1.5));
        assert!(definition.get_setting("unknown").is_none());
    }

    #[test]
    fn load_accepts_legacy_value_attributes() {
        let mut definition = initialized(FLAT_SCHEMA);
        let values = XmlDocument::parse(
            r#"<settings><setting id="count" value="9" /><setting id="folder" value="" /></settings>"#,
        )
        .unwrap();

        definition.load(&values).unwrap();

        assert_eq!(value(&definition, "count"), SettingValue::Integer(9));
        assert_eq!(value(&definition, "folder"), SettingValue::String(String::new()));
    }

    #[test]
    fn load_and_save_require_initialization() {
        let mut definition = SettingsDefinition::new();
        let values = XmlDocument::parse("<settings />").unwrap();

        assert!(matches!(definition.load(&values), Err(Error::NotInitialized)));
        assert!(matches!(definition.save(), Err(Error::NotInitialized)));

        definition.set_loaded();
        assert_eq!(definition.state(), DefinitionState::Uninitialized);
    }

    #[test]
    fn load_rejects_foreign_documents_without_changes() {
        let mut definition = initialized(SECTIONED_SCHEMA);
        let values = XmlDocument::parse(r#"<values><setting id="enabled">false</setting></values>"#)
            .unwrap();

        assert!(matches!(definition.load(&values), Err(Error::Schema(_))));
        assert!(!definition.is_loaded());
        assert_eq!(value(&definition, "enabled"), SettingValue::Boolean(true));
    }

    #[test]
    fn save_marks_default_values() {
        let mut definition = initialized(SECTIONED_SCHEMA);
        definition
            .get_setting_mut("retries")
            .unwrap()
            .set_value(SettingValue::Integer(7));

        let text = definition.save().unwrap().to_xml_string();

        assert_eq!(
            text,
            "<settings version=\"2\">\n    \
             <setting id=\"enabled\" default=\"true\">true</setting>\n    \
             <setting id=\"retries\">7</setting>\n    \
             <setting id=\"ratio\" default=\"true\">1.5</setting>\n    \
             <setting id=\"username\" default=\"true\" />\n\
             </settings>\n"
        );
    }

    #[test]
    fn saved_values_load_into_fresh_definition() {
        let mut definition = initialized(SECTIONED_SCHEMA);
        definition.get_setting_mut("username").unwrap().from_string("alice");
        definition.get_setting_mut("enabled").unwrap().from_string("false");
        let saved = definition.save().unwrap();

        let mut fresh = initialized(SECTIONED_SCHEMA);
        fresh.load(&saved).unwrap();

        assert_eq!(
            value(&fresh, "username"),
            SettingValue::String("alice".to_owned())
        );
        assert_eq!(value(&fresh, "enabled"), SettingValue::Boolean(false));
    }

    #[test]
    fn set_defaults_resets_every_value() {
        let mut definition = initialized(FLAT_SCHEMA);
        definition.get_setting_mut("count").unwrap().from_string("42");
        definition.get_setting_mut("enabled").unwrap().from_string("true");

        definition.set_defaults();

        assert!(definition.iter().all(Setting::is_default));
    }

    #[test]
    fn add_setting_infers_type_and_detects_conflicts() {
        let mut definition = initialized(FLAT_SCHEMA);

        let added = definition.add_setting("nickname", "bob".to_owned()).unwrap();
        assert_eq!(added.setting_type(), SettingType::String);

        assert!(definition.add_setting("count", 1).is_some());
        assert!(definition.add_setting("count", true).is_none());
        assert!(definition.add_setting("", 1).is_none());
        assert_eq!(value(&definition, "count"), SettingValue::Integer(5));
    }

    #[test]
    fn add_setting_requires_initialization() {
        let mut definition = SettingsDefinition::new();
        assert!(definition.add_setting("key", 1.0).is_none());
    }

    #[test]
    fn value_only_documents_define_string_settings() {
        let mut definition = SettingsDefinition::new();
        let document = XmlDocument::parse(
            r#"<settings version="2">
                <setting id="token">abc</setting>
                <setting id="mode" default="true">auto</setting>
            </settings>"#,
        )
        .unwrap();

        definition.initialize(&document).unwrap();
        definition.load(&document).unwrap();

        let token = definition.get_setting("token").unwrap();
        assert_eq!(token.setting_type(), SettingType::String);
        assert_eq!(token.value(), &SettingValue::String("abc".to_owned()));

        let mode = definition.get_setting("mode").unwrap();
        assert_eq!(mode.value(), &SettingValue::String("auto".to_owned()));
        assert_eq!(mode.default_value(), &SettingValue::String(String::new()));
    }
}
