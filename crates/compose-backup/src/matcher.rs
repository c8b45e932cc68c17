//! Matching running containers to container type policies
//!

use regex::{Regex, RegexBuilder};
use tracing::warn;

use crate::policy::{ContainerTypePolicy, ServicePolicies};

/// A running container selected for backup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerTarget<'a> {
    /// The container's name without the leading `/`.
    pub container_name: String,

    /// The policy of the container's type.
    pub policy: &'a ContainerTypePolicy,
}

/// Strip the leading separator the docker API puts in front of container names.
pub fn normalize_container_name(name: &str) -> &str {
    name.strip_prefix('/').unwrap_or(name)
}

/// Select the containers named `<prefix>_<type>_<ordinal>` for every policy, ignoring case.
///
/// Every matching container is its own target, so replicas of one type are all backed up.
/// Targets keep the order of `container_names`.
pub fn match_targets<'a, S: AsRef<str>>(
    prefix: &str,
    policies: &'a ServicePolicies,
    container_names: &[S],
) -> Vec<ContainerTarget<'a>> {
    let patterns: Vec<(Regex, &'a ContainerTypePolicy)> = policies
        .values()
        .filter_map(|policy| match container_pattern(prefix, &policy.type_name) {
            Ok(pattern) => Some((pattern, policy)),
            Err(error) => {
                warn!("Could not build pattern for '{}': {error}", policy.type_name);
                None
            }
        })
        .collect();

    let mut targets: Vec<ContainerTarget<'a>> = Vec::new();

    for name in container_names {
        let name = normalize_container_name(name.as_ref());

        if targets.iter().any(|target| target.container_name == name) {
            continue;
        }

        if let Some((_, policy)) = patterns.iter().find(|(pattern, _)| pattern.is_match(name)) {
            targets.push(ContainerTarget {
                container_name: name.to_string(),
                policy: *policy,
            });
        }
    }

    targets
}

fn container_pattern(prefix: &str, type_name: &str) -> Result<Regex, regex::Error> {
    let pattern = format!(
        "^{}_{}_[0-9]+$",
        regex::escape(prefix),
        regex::escape(type_name)
    );

    RegexBuilder::new(&pattern).case_insensitive(true).build()
}
