//! Backup policy resolution from service definition labels
//!

use std::{
    collections::{BTreeMap, HashMap},
    fs, io,
    path::PathBuf,
};

use serde_yaml::{Mapping, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{config::LabelConfig, discovery::ServiceDirectory};

/// The resolved policies of a service, keyed by container type name.
pub type ServicePolicies = BTreeMap<String, ContainerTypePolicy>;

/// How a container type declared in a service definition is backed up.
///
/// Only container types with backups enabled and at least one data location have a policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerTypePolicy {
    /// The container type's name in the service definition.
    pub type_name: String,

    /// Commands run inside the container before the data is copied.
    pub pre_scripts: Vec<String>,

    /// Commands run inside the container after the data is copied.
    pub post_scripts: Vec<String>,

    /// Absolute in-container paths to copy.
    pub data_locations: Vec<String>,
}

/// Read and resolve the policies of a service.
pub fn resolve_policies(
    service: &ServiceDirectory,
    labels: &LabelConfig,
) -> Result<ServicePolicies, ResolveError> {
    let definition_file = service.definition_file();
    let contents = fs::read_to_string(definition_file)
        .map_err(|e| ResolveError::Read(e, definition_file.to_path_buf()))?;

    parse_policies(&contents, labels)
}

/// Resolve the policies from the contents of a service definition.
///
/// Both a top level `services` mapping and container types at the top level are accepted.
/// Merge keys are resolved first and `x-` extension fields are not container types.
pub fn parse_policies(
    contents: &str,
    labels: &LabelConfig,
) -> Result<ServicePolicies, ResolveError> {
    let mut document: Value = serde_yaml::from_str(contents)?;
    document.apply_merge()?;
    let root = document.as_mapping().ok_or(ResolveError::NotAMapping)?;

    let container_types = match root.get("services") {
        Some(Value::Mapping(services)) => services,
        _ => root,
    };

    let mut policies = ServicePolicies::new();

    for (type_name, definition) in container_types {
        let (Some(type_name), Some(definition)) = (type_name.as_str(), definition.as_mapping())
        else {
            continue;
        };

        if type_name.starts_with("x-") {
            continue;
        }

        if let Some(policy) = resolve_container_type(type_name, definition, labels) {
            policies.insert(type_name.to_string(), policy);
        }
    }

    Ok(policies)
}

fn resolve_container_type(
    type_name: &str,
    definition: &Mapping,
    config: &LabelConfig,
) -> Option<ContainerTypePolicy> {
    let Some(labels) = definition.get("labels").and_then(parse_labels) else {
        debug!("{type_name}: no labels");
        return None;
    };

    if labels.get(&config.enable) != Some(&config.enabled_value) {
        debug!("{type_name}: backup not enabled");
        return None;
    }

    let data_locations = data_locations(type_name, labels.get(&config.data));
    if data_locations.is_empty() {
        warn!("{type_name}: backup enabled but no data locations, skipping");
        return None;
    }

    Some(ContainerTypePolicy {
        type_name: type_name.to_string(),
        pre_scripts: split_list(labels.get(&config.pre_scripts)),
        post_scripts: split_list(labels.get(&config.post_scripts)),
        data_locations,
    })
}

/// Labels as a `KEY: VALUE` mapping or a list of `KEY=VALUE` strings.
fn parse_labels(value: &Value) -> Option<HashMap<String, String>> {
    match value {
        Value::Mapping(mapping) => Some(
            mapping
                .iter()
                .filter_map(|(key, value)| Some((scalar_string(key)?, scalar_string(value)?)))
                .collect(),
        ),

        Value::Sequence(sequence) => Some(
            sequence
                .iter()
                .filter_map(Value::as_str)
                .map(|label| match label.split_once('=') {
                    Some((key, value)) => (key.to_string(), value.to_string()),
                    None => (label.to_string(), String::new()),
                })
                .collect(),
        ),

        _ => None,
    }
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(string) => Some(string.clone()),
        Value::Bool(boolean) => Some(boolean.to_string()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// Split a comma separated label into trimmed, non-empty entries.
fn split_list(value: Option<&String>) -> Vec<String> {
    value
        .map(|value| {
            value
                .split(',')
                .map(str::trim)
                .filter(|entry| !entry.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn data_locations(type_name: &str, value: Option<&String>) -> Vec<String> {
    let mut locations: Vec<String> = Vec::new();

    for location in split_list(value) {
        if !location.starts_with('/') {
            warn!("{type_name}: ignoring data location '{location}', it is not absolute");
            continue;
        }

        if !locations.contains(&location) {
            locations.push(location);
        }
    }

    locations
}

#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Failed to read service definition {1:?}: {0}")]
    Read(#[source] io::Error, PathBuf),

    #[error("Failed to parse service definition: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Service definition is not a mapping")]
    NotAMapping,
}

#[cfg(test)]
mod tests {
    use super::{data_locations, split_list};

    #[test]
    fn split_list_trims_and_drops_empty() {
        let value = Some(" a ,b,, c ".to_string());
        assert_eq!(split_list(value.as_ref()), vec!["a", "b", "c"]);
    }

    #[test]
    fn split_list_absent_and_empty_are_equal() {
        assert!(split_list(None).is_empty());
        assert!(split_list(Some(&String::new())).is_empty());
    }

    #[test]
    fn data_locations_absolute_and_unique() {
        let value = Some("/data, relative, /data ,/logs".to_string());
        assert_eq!(data_locations("web", value.as_ref()), vec!["/data", "/logs"]);
    }
}
