//! Typed settings definitions for add-ons.
//!
//! A [`SettingsDefinition`] is built from a schema document, receives user
//! values from a second document and serializes them back out. Both documents
//! are handled as [`XmlDocument`]s.

mod definition;
mod error;
mod setting;
mod xml;

pub use definition::{DefinitionState, SettingsDefinition};
pub use error::{Error, Result};
pub use setting::{Setting, SettingKind, SettingType, SettingValue};
pub use xml::{XmlDocument, XmlElement};
