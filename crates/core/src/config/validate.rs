use std::collections::HashSet;

use regex_lite::Regex;
use tracing::{error, warn};

use super::types::{ArrInstanceConfig, Config};
use super::ConfigError;

/// An instance that failed validation and will not be registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceRejection {
    pub name: String,
    pub reason: String,
}

/// Validate process-wide configuration. Failures here abort start-up.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.qbittorrent.url.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "qbittorrent.url cannot be empty".to_string(),
        ));
    }

    let settings = &config.settings;
    if settings.failed_category == settings.recheck_category {
        return Err(ConfigError::ValidationError(
            "settings.failed_category and settings.recheck_category must differ".to_string(),
        ));
    }

    if config.status.enabled && config.status.port == 0 {
        return Err(ConfigError::ValidationError(
            "status.port cannot be 0".to_string(),
        ));
    }

    for instance in &config.instances {
        let category = instance.category();
        if category == settings.failed_category || category == settings.recheck_category {
            return Err(ConfigError::ValidationError(format!(
                "instance '{}' uses reserved category '{}'",
                instance.name, category
            )));
        }
    }

    Ok(())
}

/// Split managed instances into those that can run and those rejected.
///
/// Unmanaged instances are dropped silently. Names and URIs must be unique
/// across accepted instances; the first occurrence wins.
pub fn validate_instances(
    instances: &[ArrInstanceConfig],
) -> (Vec<ArrInstanceConfig>, Vec<InstanceRejection>) {
    let mut accepted = Vec::new();
    let mut rejected = Vec::new();
    let mut names = HashSet::new();
    let mut uris = HashSet::new();
    let mut categories = HashSet::new();

    for instance in instances.iter().filter(|i| i.managed) {
        let reason = match check_instance(instance) {
            Err(reason) => Some(reason),
            Ok(_) if !names.insert(instance.name.clone()) => {
                Some(format!("duplicate instance name '{}'", instance.name))
            }
            Ok(uri) if !uris.insert(uri.clone()) => Some(format!("duplicate uri '{}'", uri)),
            Ok(_) if !categories.insert(instance.category().to_string()) => Some(format!(
                "duplicate category '{}'",
                instance.category()
            )),
            Ok(_) => None,
        };

        match reason {
            Some(reason) => {
                error!(instance = %instance.name, "Instance rejected: {}", reason);
                rejected.push(InstanceRejection {
                    name: instance.name.clone(),
                    reason,
                });
            }
            None => {
                let mut instance = instance.clone();
                fail_closed_search(&mut instance);
                accepted.push(instance);
            }
        }
    }

    (accepted, rejected)
}

/// Per-instance checks; returns the normalized URI on success.
fn check_instance(instance: &ArrInstanceConfig) -> Result<String, String> {
    if instance.name.trim().is_empty() {
        return Err("name cannot be empty".to_string());
    }
    let uri = required(&instance.uri, "uri")?;
    required(&instance.api_key, "api_key")?;

    let search = &instance.entry_search;
    if search.overseerr.enabled && search.ombi.enabled {
        return Err("overseerr and ombi cannot both be enabled".to_string());
    }
    if search.overseerr.enabled {
        required(&search.overseerr.uri, "entry_search.overseerr.uri")?;
        required(&search.overseerr.api_key, "entry_search.overseerr.api_key")?;
    }
    if search.ombi.enabled {
        required(&search.ombi.uri, "entry_search.ombi.uri")?;
        required(&search.ombi.api_key, "entry_search.ombi.api_key")?;
    }

    let torrent = &instance.torrent;
    for pattern in torrent
        .folder_exclusion_regex
        .iter()
        .chain(torrent.file_name_exclusion_regex.iter())
    {
        Regex::new(pattern).map_err(|e| format!("invalid regex '{}': {}", pattern, e))?;
    }

    Ok(uri.trim_end_matches('/').to_lowercase())
}

fn required<'a>(value: &'a Option<String>, key: &str) -> Result<&'a str, String> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(format!("missing required key '{}'", key)),
    }
}

fn fail_closed_search(instance: &mut ArrInstanceConfig) {
    let search = &mut instance.entry_search;
    if !search.search_missing {
        return;
    }
    let exists = search
        .database_file
        .as_ref()
        .map(|p| p.exists())
        .unwrap_or(false);
    if !exists {
        warn!(
            instance = %instance.name,
            "Content manager database not found, disabling missing search"
        );
        search.search_missing = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;

    fn config_with(instances: &str) -> Config {
        let toml = format!(
            r#"
[qbittorrent]
url = "http://localhost:8080"
{}
"#,
            instances
        );
        load_config_from_str(&toml).unwrap()
    }

    fn instance(name: &str, uri: &str) -> String {
        format!(
            r#"
[[instances]]
name = "{name}"
kind = "sonarr"
managed = true
uri = "{uri}"
api_key = "key"
"#
        )
    }

    #[test]
    fn test_validate_valid_config() {
        let config = config_with(&instance("Sonarr", "http://s:8989"));
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_reserved_category_fails() {
        let mut config = config_with(&instance("Sonarr", "http://s:8989"));
        config.instances[0].category = Some("failed".to_string());
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_validate_empty_qbit_url_fails() {
        let mut config = config_with("");
        config.qbittorrent.url = " ".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_duplicate_name_rejects_only_second() {
        let config = config_with(&format!(
            "{}{}",
            instance("Sonarr", "http://a:8989"),
            instance("Sonarr", "http://b:8989")
        ));
        let (accepted, rejected) = validate_instances(&config.instances);
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].uri.as_deref(), Some("http://a:8989"));
        assert_eq!(rejected.len(), 1);
        assert!(rejected[0].reason.contains("duplicate instance name"));
    }

    #[test]
    fn test_duplicate_uri_rejected() {
        let config = config_with(&format!(
            "{}{}",
            instance("One", "http://a:8989"),
            instance("Two", "http://A:8989/")
        ));
        let (accepted, rejected) = validate_instances(&config.instances);
        assert_eq!(accepted.len(), 1);
        assert_eq!(rejected[0].name, "Two");
    }

    #[test]
    fn test_missing_api_key_rejected() {
        let mut config = config_with(&instance("Sonarr", "http://s:8989"));
        config.instances[0].api_key = None;
        let (accepted, rejected) = validate_instances(&config.instances);
        assert!(accepted.is_empty());
        assert!(rejected[0].reason.contains("api_key"));
    }

    #[test]
    fn test_both_request_sources_rejected() {
        let mut config = config_with(&instance("Radarr", "http://r:7878"));
        let search = &mut config.instances[0].entry_search;
        search.overseerr.enabled = true;
        search.overseerr.uri = Some("http://o".into());
        search.overseerr.api_key = Some("k".into());
        search.ombi.enabled = true;
        search.ombi.uri = Some("http://m".into());
        search.ombi.api_key = Some("k".into());
        let (accepted, rejected) = validate_instances(&config.instances);
        assert!(accepted.is_empty());
        assert!(rejected[0].reason.contains("cannot both"));
    }

    #[test]
    fn test_invalid_regex_rejected() {
        let mut config = config_with(&instance("Sonarr", "http://s:8989"));
        config.instances[0]
            .torrent
            .file_name_exclusion_regex
            .push("(unclosed".to_string());
        let (accepted, rejected) = validate_instances(&config.instances);
        assert!(accepted.is_empty());
        assert!(rejected[0].reason.contains("invalid regex"));
    }

    #[test]
    fn test_unmanaged_instances_skipped() {
        let mut config = config_with(&instance("Sonarr", "http://s:8989"));
        config.instances[0].managed = false;
        let (accepted, rejected) = validate_instances(&config.instances);
        assert!(accepted.is_empty());
        assert!(rejected.is_empty());
    }

    #[test]
    fn test_search_disabled_without_database() {
        let mut config = config_with(&instance("Sonarr", "http://s:8989"));
        config.instances[0].entry_search.search_missing = true;
        config.instances[0].entry_search.database_file =
            Some("/nonexistent/sonarr.db".into());
        let (accepted, _) = validate_instances(&config.instances);
        assert!(!accepted[0].entry_search.search_missing);
    }
}
