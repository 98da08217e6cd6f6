use std::fmt;

/// The closed set of value kinds a setting can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingType {
    Boolean,
    Integer,
    Number,
    String,
}

impl SettingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettingType::Boolean => "boolean",
            SettingType::Integer => "integer",
            SettingType::Number => "number",
            SettingType::String => "string",
        }
    }

    /// The value a setting of this type starts with when its definition
    /// carries no default.
    pub fn zero_value(&self) -> SettingValue {
        match self {
            SettingType::Boolean => SettingValue::Boolean(false),
            SettingType::Integer => SettingValue::Integer(0),
            SettingType::Number => SettingValue::Number(0.0),
            SettingType::String => SettingValue::String(String::new()),
        }
    }

    /// Parses the string form of a value of this type.
    pub fn parse_value(&self, text: &str) -> Option<SettingValue> {
        match self {
            SettingType::Boolean => {
                let text = text.trim();
                if text.eq_ignore_ascii_case("true") {
                    Some(SettingValue::Boolean(true))
                } else if text.eq_ignore_ascii_case("false") {
                    Some(SettingValue::Boolean(false))
                } else {
                    None
                }
            }
            SettingType::Integer => text.trim().parse().ok().map(SettingValue::Integer),
            SettingType::Number => text
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|value| value.is_finite())
                .map(SettingValue::Number),
            SettingType::String => Some(SettingValue::String(text.to_owned())),
        }
    }
}

impl fmt::Display for SettingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SettingValue {
    Boolean(bool),
    Integer(i32),
    Number(f64),
    String(String),
}

impl SettingValue {
    pub fn setting_type(&self) -> SettingType {
        match self {
            SettingValue::Boolean(_) => SettingType::Boolean,
            SettingValue::Integer(_) => SettingType::Integer,
            SettingValue::Number(_) => SettingType::Number,
            SettingValue::String(_) => SettingType::String,
        }
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::Boolean(value) => write!(f, "{value}"),
            SettingValue::Integer(value) => write!(f, "{value}"),
            SettingValue::Number(value) => write!(f, "{value}"),
            SettingValue::String(value) => f.write_str(value),
        }
    }
}

/// Rust types that map onto exactly one [`SettingType`].
pub trait SettingKind: Sized + Clone {
    const TYPE: SettingType;

    /// Extracts `Self` from a value of the same kind; `None` on any other kind.
    fn from_setting_value(value: &SettingValue) -> Option<Self>;

    fn into_setting_value(self) -> SettingValue;
}

impl SettingKind for bool {
    const TYPE: SettingType = SettingType::Boolean;

    fn from_setting_value(value: &SettingValue) -> Option<Self> {
        match value {
            SettingValue::Boolean(value) => Some(*value),
            _ => None,
        }
    }

    fn into_setting_value(self) -> SettingValue {
        SettingValue::Boolean(self)
    }
}

impl SettingKind for i32 {
    const TYPE: SettingType = SettingType::Integer;

    fn from_setting_value(value: &SettingValue) -> Option<Self> {
        match value {
            SettingValue::Integer(value) => Some(*value),
            _ => None,
        }
    }

    fn into_setting_value(self) -> SettingValue {
        SettingValue::Integer(self)
    }
}

impl SettingKind for f64 {
    const TYPE: SettingType = SettingType::Number;

    fn from_setting_value(value: &SettingValue) -> Option<Self> {
        match value {
            SettingValue::Number(value) => Some(*value),
            _ => None,
        }
    }

    fn into_setting_value(self) -> SettingValue {
        SettingValue::Number(self)
    }
}

impl SettingKind for String {
    const TYPE: SettingType = SettingType::String;

    fn from_setting_value(value: &SettingValue) -> Option<Self> {
        match value {
            SettingValue::String(value) => Some(value.clone()),
            _ => None,
        }
    }

    fn into_setting_value(self) -> SettingValue {
        SettingValue::String(self)
    }
}

/// A single typed setting with its default and current value.
#[derive(Debug, Clone, PartialEq)]
pub struct Setting {
    id: String,
    label: Option<String>,
    default: SettingValue,
    value: SettingValue,
}

impl Setting {
    pub fn new(id: impl Into<String>, default: SettingValue) -> Self {
        Self {
            id: id.into(),
            label: None,
            value: default.clone(),
            default,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn setting_type(&self) -> SettingType {
        self.default.setting_type()
    }

    pub fn value(&self) -> &SettingValue {
        &self.value
    }

    pub fn default_value(&self) -> &SettingValue {
        &self.default
    }

    pub fn is_default(&self) -> bool {
        self.value == self.default
    }

    /// Assigns a new value. Fails when the value is of another kind.
    pub fn set_value(&mut self, value: SettingValue) -> bool {
        if value.setting_type() != self.setting_type() {
            return false;
        }
        self.value = value;
        true
    }

    /// Parses `text` as this setting's type and assigns it.
    pub fn from_string(&mut self, text: &str) -> bool {
        match self.setting_type().parse_value(text) {
            Some(value) => {
                self.value = value;
                true
            }
            None => false,
        }
    }

    pub fn reset(&mut self) {
        self.value = self.default.clone();
    }
}
