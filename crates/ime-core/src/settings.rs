//! Bridge settings loaded from TOML.
//!
//! - `init_custom(toml_content)` sets a custom TOML before first `settings()` call
//! - `settings()` returns `&'static Settings` (lazy-init singleton)
//! - `parse_settings_toml` builds an independent instance for injection
//! - Default values are embedded via `include_str!("default_settings.toml")`

use std::sync::OnceLock;

use serde::Deserialize;

pub const DEFAULT_SETTINGS_TOML: &str = include_str!("default_settings.toml");

static CUSTOM_TOML: OnceLock<String> = OnceLock::new();

/// Set custom TOML before first `settings()` call.
pub fn init_custom(toml_content: String) -> Result<(), SettingsError> {
    parse_settings_toml(&toml_content)?;
    CUSTOM_TOML
        .set(toml_content)
        .map_err(|_| SettingsError::AlreadyInitialized)
}

/// Get or initialize the global settings singleton.
pub fn settings() -> &'static Settings {
    static INSTANCE: OnceLock<Settings> = OnceLock::new();
    INSTANCE.get_or_init(|| {
        let toml_str = CUSTOM_TOML
            .get()
            .map(|s| s.as_str())
            .unwrap_or(DEFAULT_SETTINGS_TOML);
        parse_settings_toml(toml_str).expect("settings TOML must be valid")
    })
}

/// Returns the embedded default settings TOML content.
pub fn default_toml() -> &'static str {
    DEFAULT_SETTINGS_TOML
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("TOML parse error: {0}")]
    Parse(String),
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
    #[error("settings already initialized")]
    AlreadyInitialized,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub dispatch: DispatchSettings,
    pub reads: ReadSettings,
    pub accent: AccentSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DispatchSettings {
    pub ui_thread_name: String,
    pub ime_thread_name: String,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ReadSettings {
    pub cached_fallback_on_ui_thread: bool,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct AccentSettings {
    pub combine_dead_keys: bool,
}

pub fn parse_settings_toml(toml_str: &str) -> Result<Settings, SettingsError> {
    let s: Settings = toml::from_str(toml_str).map_err(|e| SettingsError::Parse(e.to_string()))?;
    validate(&s)?;
    Ok(s)
}

fn validate(s: &Settings) -> Result<(), SettingsError> {
    macro_rules! check_thread_name {
        ($section:ident . $field:ident) => {
            let name = &s.$section.$field;
            if name.trim().is_empty() {
                return Err(SettingsError::InvalidValue {
                    field: concat!(stringify!($section), ".", stringify!($field)).to_string(),
                    reason: "must not be empty".to_string(),
                });
            }
            if name.contains('\0') {
                return Err(SettingsError::InvalidValue {
                    field: concat!(stringify!($section), ".", stringify!($field)).to_string(),
                    reason: "must not contain NUL".to_string(),
                });
            }
        };
    }

    check_thread_name!(dispatch.ui_thread_name);
    check_thread_name!(dispatch.ime_thread_name);

    if s.dispatch.ui_thread_name == s.dispatch.ime_thread_name {
        return Err(SettingsError::InvalidValue {
            field: "dispatch.ime_thread_name".to_string(),
            reason: "must differ from dispatch.ui_thread_name".to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_default_toml() {
        let s = parse_settings_toml(DEFAULT_SETTINGS_TOML).unwrap();
        assert_eq!(s.dispatch.ui_thread_name, "ime-bridge-ui");
        assert_eq!(s.dispatch.ime_thread_name, "ime-bridge-ime");
        assert!(s.reads.cached_fallback_on_ui_thread);
        assert!(s.accent.combine_dead_keys);
    }

    #[test]
    fn test_reject_empty_thread_name() {
        let toml = DEFAULT_SETTINGS_TOML.replace(
            "ui_thread_name = \"ime-bridge-ui\"",
            "ui_thread_name = \"  \"",
        );
        let err = parse_settings_toml(&toml).unwrap_err();
        assert!(
            matches!(err, SettingsError::InvalidValue { ref field, .. } if field == "dispatch.ui_thread_name"),
            "{err}"
        );
    }

    #[test]
    fn test_reject_identical_thread_names() {
        let toml = DEFAULT_SETTINGS_TOML.replace("ime-bridge-ime", "ime-bridge-ui");
        assert!(matches!(
            parse_settings_toml(&toml),
            Err(SettingsError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_reject_missing_section() {
        let err = parse_settings_toml("[dispatch]\nui_thread_name = \"a\"\n").unwrap_err();
        assert!(matches!(err, SettingsError::Parse(_)));
    }

    #[test]
    fn test_custom_flags_are_read() {
        let toml = DEFAULT_SETTINGS_TOML
            .replace(
                "cached_fallback_on_ui_thread = true",
                "cached_fallback_on_ui_thread = false",
            )
            .replace("combine_dead_keys = true", "combine_dead_keys = false");
        let s = parse_settings_toml(&toml).unwrap();
        assert!(!s.reads.cached_fallback_on_ui_thread);
        assert!(!s.accent.combine_dead_keys);
    }
}
