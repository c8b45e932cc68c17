//! Tests for container matching
//!

use compose_backup::{
    matcher::match_targets,
    policy::{ContainerTypePolicy, ServicePolicies},
};

fn policies(types: &[&str]) -> ServicePolicies {
    types
        .iter()
        .map(|type_name| {
            (
                type_name.to_string(),
                ContainerTypePolicy {
                    type_name: type_name.to_string(),
                    pre_scripts: Vec::new(),
                    post_scripts: Vec::new(),
                    data_locations: vec!["/data".into()],
                },
            )
        })
        .collect()
}

fn matched(targets: &[compose_backup::matcher::ContainerTarget<'_>]) -> Vec<String> {
    targets
        .iter()
        .map(|target| format!("{}={}", target.container_name, target.policy.type_name))
        .collect()
}

#[test]
fn matches_prefix_type_ordinal_case_insensitive() {
    let policies = policies(&["web", "db"]);
    let names = [
        "/shop_web_1",
        "/SHOP_DB_2",
        "/shop_web",
        "/shop_cache_1",
        "/other_web_1",
        "/shop_web_1_extra",
    ];

    let targets = match_targets("shop", &policies, &names);
    assert_eq!(matched(&targets), vec!["shop_web_1=web", "SHOP_DB_2=db"]);
}

#[test]
fn every_replica_is_a_target() {
    let policies = policies(&["web"]);
    let names = ["/shop_web_1", "/shop_web_2", "/shop_web_10"];

    let targets = match_targets("shop", &policies, &names);
    assert_eq!(
        matched(&targets),
        vec!["shop_web_1=web", "shop_web_2=web", "shop_web_10=web"]
    );
}

#[test]
fn names_with_and_without_separator_are_one_target() {
    let policies = policies(&["web"]);
    let names = ["/shop_web_1", "shop_web_1"];

    let targets = match_targets("shop", &policies, &names);
    assert_eq!(matched(&targets), vec!["shop_web_1=web"]);
}

#[test]
fn no_policies_no_targets() {
    let policies = policies(&[]);

    let targets = match_targets("shop", &policies, &["/shop_web_1"]);
    assert!(targets.is_empty());
}
