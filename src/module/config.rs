//! Module configuration handed over at `init` time.

/// Raw configuration for a module.
///
/// Modules parse the TOML text themselves so each can own its schema.
#[derive(Debug, Clone, Default)]
pub struct ModuleConfig {
    raw: Option<String>,
}

impl ModuleConfig {
    /// Creates an empty configuration; modules fall back to their defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration from TOML text.
    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self {
            raw: Some(raw.into()),
        }
    }

    /// Gets the raw configuration string.
    #[must_use]
    pub fn raw_config(&self) -> Option<&str> {
        self.raw.as_deref()
    }
}
