use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Identity of the application using the mixer
///
/// Handed to the backend before it connects; network sound servers show it
/// in their client lists. Also attached to per-application controls.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct AppInfo {
    /// Human readable application name
    #[serde(default)]
    pub name: Option<String>,

    /// Reverse-DNS application identifier
    #[serde(default)]
    pub id: Option<String>,

    /// Application version
    #[serde(default)]
    pub version: Option<String>,

    /// XDG icon name
    #[serde(default)]
    pub icon: Option<String>,
}

impl AppInfo {
    /// Create application info from its four fields
    pub fn new(
        name: Option<&str>,
        id: Option<&str>,
        version: Option<&str>,
        icon: Option<&str>,
    ) -> Self {
        Self {
            name: name.map(str::to_owned),
            id: id.map(str::to_owned),
            version: version.map(str::to_owned),
            icon: icon.map(str::to_owned),
        }
    }

    /// Whether no field is set
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.id.is_none() && self.version.is_none() && self.icon.is_none()
    }
}
