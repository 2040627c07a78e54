//! Model settings and the static model catalog
//!
//! A start request may carry a `model_config` object. When it does, every
//! missing key takes the default listed on [`ModelConfig`]. When it does not,
//! the catalog entry for the model name decides the edit format.

use serde::{Deserialize, Serialize};

/// Raw model configuration as sent by a client. Every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub edit_format: Option<String>,
    pub weak_model_name: Option<String>,
    pub use_repo_map: Option<bool>,
    pub send_undo_reply: Option<bool>,
    pub lazy: Option<bool>,
    pub reminder: Option<String>,
    pub examples_as_sys_msg: Option<bool>,
    pub use_system_prompt: Option<bool>,
    pub use_temperature: Option<bool>,
    pub streaming: Option<bool>,
}

/// Where reminders about the edit format are placed in the prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reminder {
    /// Appended to the latest user message
    User,
    /// Repeated in the system prompt
    Sys,
    /// Not repeated
    None,
}

impl Reminder {
    fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "sys" | "system" => Reminder::Sys,
            "none" | "" => Reminder::None,
            _ => Reminder::User,
        }
    }
}

/// Normalized settings for one model
///
/// `weak_model_name` and `send_undo_reply` are carried for engines that
/// summarize with a cheaper model or support undo; [`crate::GenaiEngine`]
/// does neither and ignores them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSettings {
    pub name: String,
    /// Edit format discriminator, resolved to a strategy by [`crate::strategy::EditFormat`]
    pub edit_format: String,
    pub weak_model_name: Option<String>,
    pub use_repo_map: bool,
    pub send_undo_reply: bool,
    pub lazy: bool,
    pub reminder: Reminder,
    pub examples_as_sys_msg: bool,
    pub use_system_prompt: bool,
    pub use_temperature: bool,
    pub streaming: bool,
}

impl ModelSettings {
    /// Settings for a model with no explicit configuration
    pub fn for_model(name: &str) -> Self {
        let entry = catalog_entry(name);
        Self {
            name: name.to_string(),
            edit_format: entry.edit_format.to_string(),
            weak_model_name: entry.weak_model.map(str::to_string),
            use_repo_map: entry.use_repo_map,
            send_undo_reply: false,
            lazy: entry.lazy,
            reminder: Reminder::User,
            examples_as_sys_msg: false,
            use_system_prompt: true,
            use_temperature: entry.use_temperature,
            streaming: true,
        }
    }

    /// Settings built from a client-supplied configuration object
    pub fn from_config(name: &str, config: &ModelConfig) -> Self {
        Self {
            name: name.to_string(),
            edit_format: config
                .edit_format
                .clone()
                .unwrap_or_else(|| "whole".to_string()),
            weak_model_name: config.weak_model_name.clone(),
            use_repo_map: config.use_repo_map.unwrap_or(false),
            send_undo_reply: config.send_undo_reply.unwrap_or(false),
            lazy: config.lazy.unwrap_or(false),
            reminder: config
                .reminder
                .as_deref()
                .map(Reminder::parse)
                .unwrap_or(Reminder::User),
            examples_as_sys_msg: config.examples_as_sys_msg.unwrap_or(false),
            use_system_prompt: config.use_system_prompt.unwrap_or(true),
            use_temperature: config.use_temperature.unwrap_or(true),
            streaming: config.streaming.unwrap_or(true),
        }
    }

    /// Resolve settings from an optional configuration object
    pub fn resolve(name: &str, config: Option<&ModelConfig>) -> Self {
        match config {
            Some(config) => Self::from_config(name, config),
            None => Self::for_model(name),
        }
    }
}

/// Catalog entry for a known model family
#[derive(Debug, Clone, Copy)]
struct CatalogEntry {
    prefix: &'static str,
    edit_format: &'static str,
    weak_model: Option<&'static str>,
    use_repo_map: bool,
    lazy: bool,
    use_temperature: bool,
}

const fn entry(prefix: &'static str, edit_format: &'static str) -> CatalogEntry {
    CatalogEntry {
        prefix,
        edit_format,
        weak_model: None,
        use_repo_map: true,
        lazy: false,
        use_temperature: true,
    }
}

/// Ordered longest-prefix-first; the first match wins.
const CATALOG: &[CatalogEntry] = &[
    CatalogEntry {
        weak_model: Some("gpt-4o-mini"),
        ..entry("gpt-4o-mini", "whole")
    },
    CatalogEntry {
        weak_model: Some("gpt-4o-mini"),
        ..entry("gpt-4o", "diff")
    },
    CatalogEntry {
        lazy: true,
        weak_model: Some("gpt-4o-mini"),
        ..entry("gpt-4-turbo", "diff")
    },
    CatalogEntry {
        use_repo_map: false,
        ..entry("gpt-3.5", "whole")
    },
    CatalogEntry {
        use_temperature: false,
        weak_model: Some("gpt-4o-mini"),
        ..entry("o1", "diff")
    },
    CatalogEntry {
        use_temperature: false,
        weak_model: Some("gpt-4o-mini"),
        ..entry("o3", "diff")
    },
    CatalogEntry {
        weak_model: Some("claude-3-5-haiku-20241022"),
        ..entry("claude-3-5-sonnet", "diff")
    },
    CatalogEntry {
        weak_model: Some("claude-3-5-haiku-20241022"),
        ..entry("claude-3-opus", "diff")
    },
    CatalogEntry {
        weak_model: Some("claude-3-5-haiku-20241022"),
        ..entry("claude-3-5-haiku", "diff")
    },
    CatalogEntry {
        use_repo_map: false,
        ..entry("claude-3-haiku", "whole")
    },
    CatalogEntry {
        weak_model: Some("claude-3-5-haiku-20241022"),
        ..entry("claude-", "diff")
    },
    entry("deepseek", "diff"),
    entry("gemini", "diff"),
];

const FALLBACK: CatalogEntry = CatalogEntry {
    use_repo_map: false,
    ..entry("", "whole")
};

fn catalog_entry(name: &str) -> CatalogEntry {
    // Strip an optional provider namespace such as "openai/" or "anthropic::"
    let bare = name
        .rsplit_once("::")
        .map(|(_, m)| m)
        .or_else(|| name.rsplit_once('/').map(|(_, m)| m))
        .unwrap_or(name)
        .to_lowercase();

    CATALOG
        .iter()
        .find(|e| bare.starts_with(e.prefix))
        .copied()
        .unwrap_or(FALLBACK)
}

/// Whether the catalog knows this model family
pub fn is_known_model(name: &str) -> bool {
    !catalog_entry(name).prefix.is_empty()
}

/// The configured model handle bound to a session
#[derive(Debug, Clone)]
pub struct Model {
    settings: ModelSettings,
}

impl Model {
    pub fn new(settings: ModelSettings) -> Self {
        Self { settings }
    }

    pub fn name(&self) -> &str {
        &self.settings.name
    }

    pub fn edit_format(&self) -> &str {
        &self.settings.edit_format
    }

    pub fn settings(&self) -> &ModelSettings {
        &self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_apply_to_missing_keys() {
        let config: ModelConfig = serde_json::from_str(r#"{"lazy": true}"#).unwrap();
        let settings = ModelSettings::from_config("gpt-4o", &config);

        assert_eq!(settings.edit_format, "whole");
        assert!(settings.lazy);
        assert!(!settings.use_repo_map);
        assert!(!settings.send_undo_reply);
        assert_eq!(settings.reminder, Reminder::User);
        assert!(!settings.examples_as_sys_msg);
        assert!(settings.use_system_prompt);
        assert!(settings.use_temperature);
        assert!(settings.streaming);
    }

    #[test]
    fn test_catalog_defaults_without_config() {
        let settings = ModelSettings::resolve("gpt-4o", None);
        assert_eq!(settings.edit_format, "diff");
        assert_eq!(settings.weak_model_name.as_deref(), Some("gpt-4o-mini"));

        let mini = ModelSettings::resolve("gpt-4o-mini", None);
        assert_eq!(mini.edit_format, "whole");

        let o1 = ModelSettings::resolve("o1-preview", None);
        assert!(!o1.use_temperature);
    }

    #[test]
    fn test_catalog_strips_provider_namespace() {
        assert_eq!(ModelSettings::for_model("anthropic/claude-3-5-sonnet-20241022").edit_format, "diff");
        assert_eq!(ModelSettings::for_model("openai::gpt-3.5-turbo").edit_format, "whole");
        assert!(is_known_model("openai/gpt-4o"));
    }

    #[test]
    fn test_unknown_model_falls_back_to_whole() {
        let settings = ModelSettings::for_model("my-local-llama");
        assert_eq!(settings.edit_format, "whole");
        assert!(!settings.use_repo_map);
        assert!(!is_known_model("my-local-llama"));
    }

    #[test]
    fn test_reminder_parsing() {
        let config = ModelConfig {
            reminder: Some("sys".to_string()),
            ..Default::default()
        };
        assert_eq!(ModelSettings::from_config("x", &config).reminder, Reminder::Sys);
        assert_eq!(Reminder::parse("none"), Reminder::None);
        assert_eq!(Reminder::parse("whatever"), Reminder::User);
    }
}
