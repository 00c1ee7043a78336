use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::targets::{AccountTarget, Platform};
use crate::ConfigError;

/// Base URLs of the platform APIs. Overridable so tests and staging runs can
/// point acquirers at a mock server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub twitter: String,
    pub youtube: String,
    pub kit: String,
    pub instagram_api: String,
    pub instagram_web: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            twitter: "https://api.twitter.com".to_string(),
            youtube: "https://www.googleapis.com".to_string(),
            kit: "https://api.kit.com".to_string(),
            instagram_api: "https://api.digitalbyte.cc/instagram/tucktools2.com".to_string(),
            instagram_web: "https://www.instagram.com".to_string(),
        }
    }
}

/// One labelled field of an external form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Business label, e.g. "Instagram Total Followers".
    pub label: String,
    /// Form entry id (`entry.NNN`). Labels without one are never posted.
    #[serde(default)]
    pub entry: Option<String>,
    /// Key of the [`AccountTarget`] that supplies the value.
    pub target: String,
    pub metric: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormSpec {
    pub name: String,
    pub url: String,
    pub fields: Vec<FieldSpec>,
}

impl FormSpec {
    /// Label to entry-id map for the fields that carry an entry id.
    #[must_use]
    pub fn entry_ids(&self) -> HashMap<String, String> {
        self.fields
            .iter()
            .filter_map(|f| f.entry.as_ref().map(|e| (f.label.clone(), e.clone())))
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    #[serde(default)]
    pub endpoints: Endpoints,
    pub targets: Vec<AccountTarget>,
    #[serde(default)]
    pub forms: Vec<FormSpec>,
}

impl TrackerConfig {
    #[must_use]
    pub fn targets_for(&self, platform: Platform) -> Vec<AccountTarget> {
        self.targets
            .iter()
            .filter(|t| t.platform == platform)
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn form(&self, name: &str) -> Option<&FormSpec> {
        self.forms.iter().find(|f| f.name == name)
    }
}

/// Load and validate the tracker configuration from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_tracker_config(path: &Path) -> Result<TrackerConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::TrackerFileIo {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_tracker_config(&content)
}

/// Parse and validate tracker configuration from YAML text.
///
/// # Errors
///
/// Returns `ConfigError` if the text cannot be parsed or fails validation.
pub fn parse_tracker_config(content: &str) -> Result<TrackerConfig, ConfigError> {
    let config: TrackerConfig =
        serde_yaml::from_str(content).map_err(ConfigError::TrackerFileParse)?;
    validate_tracker_config(&config)?;
    Ok(config)
}

fn validate_tracker_config(config: &TrackerConfig) -> Result<(), ConfigError> {
    let mut targets: BTreeMap<&str, &AccountTarget> = BTreeMap::new();

    for target in &config.targets {
        if target.key.trim().is_empty() {
            return Err(ConfigError::Validation(
                "target key must be non-empty".to_string(),
            ));
        }
        if !target.kind_allowed() {
            return Err(ConfigError::Validation(format!(
                "target '{}': kind '{}' is not valid for platform '{}'",
                target.key, target.kind, target.platform
            )));
        }
        if target.platform == Platform::Kit && target.window.is_none() {
            return Err(ConfigError::Validation(format!(
                "kit target '{}' must set a window",
                target.key
            )));
        }
        if matches!(target.platform, Platform::Linkedin) && target.id.is_none() {
            return Err(ConfigError::Validation(format!(
                "linkedin target '{}' must set its page url as id",
                target.key
            )));
        }
        if targets.insert(target.key.as_str(), target).is_some() {
            return Err(ConfigError::Validation(format!(
                "duplicate target key: '{}'",
                target.key
            )));
        }
    }

    let mut seen_forms = HashSet::new();
    for form in &config.forms {
        if !seen_forms.insert(form.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate form name: '{}'",
                form.name
            )));
        }

        let mut seen_labels = HashSet::new();
        for field in &form.fields {
            if !seen_labels.insert(field.label.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "form '{}': duplicate field label '{}'",
                    form.name, field.label
                )));
            }
            let Some(target) = targets.get(field.target.as_str()) else {
                return Err(ConfigError::Validation(format!(
                    "form '{}': field '{}' references unknown target '{}'",
                    form.name, field.label, field.target
                )));
            };
            if !target.metrics().contains(&field.metric.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "form '{}': target '{}' does not yield metric '{}'",
                    form.name, field.target, field.metric
                )));
            }
        }
    }

    Ok(())
}
