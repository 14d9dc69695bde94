use serde::{Deserialize, Serialize};

/// Options recognised when an outlet is created.
///
/// Ignored when the outlet already exists, the first creator wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutletOptions {
    /// Remove the outlet from its registry when the last subscriber unregisters.
    pub auto_delete: bool,
}

impl Default for OutletOptions {
    fn default() -> Self {
        Self {
            auto_delete: true,
        }
    }
}

impl OutletOptions {
    /// Options for an outlet that survives having no subscribers, until force-removed.
    pub fn persistent() -> Self {
        Self {
            auto_delete: false,
        }
    }

    pub fn is_persistent(&self) -> bool {
        !self.auto_delete
    }
}
