/// One selectable choice of a switch
///
/// Options are immutable once constructed and owned by their switch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SwitchOption {
    name: String,
    label: String,
    icon: Option<String>,
}

impl SwitchOption {
    /// Create an option without an icon
    pub fn new(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            icon: None,
        }
    }

    /// Attach an XDG icon name
    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    /// Identifier, unique within the switch
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Human readable label
    pub fn label(&self) -> &str {
        &self.label
    }

    /// XDG icon name
    pub fn icon(&self) -> Option<&str> {
        self.icon.as_deref()
    }
}
