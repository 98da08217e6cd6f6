//! Capabilities the host hands to an [`Addon`](crate::Addon) so it can
//! announce saved settings.

use crate::info::AddonInstanceId;

/// The host's add-on registry.
pub trait AddonRegistry: Send + Sync {
    /// Asks a running instance of the add-on to pick up its saved settings.
    fn reload_settings(&self, addon_id: &str, id: AddonInstanceId);
}

/// A scripting runtime that may be hosting a live instance of the add-on.
pub trait ScriptRuntime: Send + Sync {
    fn on_settings_changed(&self, addon_id: &str, id: AddonInstanceId);
}
