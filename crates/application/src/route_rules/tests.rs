use std::str::FromStr;

use gatehouse_domain::{
    AuthorizationOutcome, PermissionId, PermissionMode, PermissionSet, RoutePattern, RouteRule,
};

use super::{RouteRuleTable, matches_any};

fn rule(pattern: &str, permissions: &[&str]) -> RouteRule {
    RouteRule::new(
        RoutePattern::parse(pattern).unwrap_or_else(|error| panic!("{error}")),
        permissions
            .iter()
            .map(|value| PermissionId::from_str(value).unwrap_or_else(|error| panic!("{error}")))
            .collect(),
    )
}

fn table(rules: Vec<RouteRule>) -> RouteRuleTable {
    RouteRuleTable::new(rules).unwrap_or_else(|error| panic!("{error}"))
}

fn matched_pattern(table: &RouteRuleTable, path: &str) -> Option<String> {
    table
        .match_route(path)
        .map(|rule| rule.pattern().to_string())
}

#[test]
fn specific_route_wins_over_shorter_one() {
    let table = table(vec![
        rule("/roles", &["role:read"]),
        rule("/roles/create", &["role:create"]),
        rule("/roles/[id]", &["role:read"]),
    ]);

    assert_eq!(matched_pattern(&table, "/roles/create"), Some("/roles/create".to_owned()));
    assert_eq!(matched_pattern(&table, "/roles/42"), Some("/roles/[id]".to_owned()));
    assert_eq!(matched_pattern(&table, "/roles"), Some("/roles".to_owned()));
}

#[test]
fn longer_patterns_are_tried_before_catch_all() {
    let table = table(vec![
        rule("/admin/[...rest]", &["admin:access"]),
        rule("/admin/users/[id]/edit", &["user:update"]),
    ]);

    assert_eq!(
        matched_pattern(&table, "/admin/users/7/edit"),
        Some("/admin/users/[id]/edit".to_owned())
    );
    assert_eq!(
        matched_pattern(&table, "/admin/a/b/c"),
        Some("/admin/[...rest]".to_owned())
    );
    assert_eq!(matched_pattern(&table, "/admin/a"), Some("/admin/[...rest]".to_owned()));
}

#[test]
fn unmatched_path_has_no_rule() {
    let table = table(vec![rule("/roles", &["role:read"])]);
    assert!(table.match_route("/profile").is_none());
}

#[test]
fn matching_is_idempotent() {
    let table = table(vec![
        rule("/roles/[id]", &["role:read"]),
        rule("/admin/[...rest]", &["admin:access"]),
    ]);

    for path in ["/roles/1", "/admin/x/y", "/nowhere"] {
        assert_eq!(matched_pattern(&table, path), matched_pattern(&table, path));
    }
}

#[test]
fn trailing_slash_and_query_do_not_change_the_match() {
    let table = table(vec![rule("/roles/create", &["role:create"])]);
    assert_eq!(
        matched_pattern(&table, "/roles/create/?from=menu"),
        Some("/roles/create".to_owned())
    );
}

#[test]
fn duplicate_patterns_are_rejected() {
    let result = RouteRuleTable::new(vec![
        rule("/roles/[id]", &["role:read"]),
        rule("/roles/[id]", &["role:update"]),
    ]);
    assert!(result.is_err());
}

#[test]
fn tied_overlapping_patterns_are_rejected() {
    let result = RouteRuleTable::new(vec![
        rule("/roles/[id]", &["role:read"]),
        rule("/[section]/create", &["role:create"]),
    ]);
    assert!(result.is_err());
}

#[test]
fn explicit_priority_resolves_a_tie() {
    let table = table(vec![
        rule("/roles/[id]", &["role:read"]),
        rule("/[section]/create", &["role:create"]).with_priority(10),
    ]);

    assert_eq!(
        matched_pattern(&table, "/roles/create"),
        Some("/[section]/create".to_owned())
    );
    assert_eq!(matched_pattern(&table, "/roles/9"), Some("/roles/[id]".to_owned()));
}

#[test]
fn literal_and_placeholder_siblings_may_coexist() {
    let result = RouteRuleTable::new(vec![
        rule("/roles/create", &["role:create"]),
        rule("/roles/[id]", &["role:read"]),
    ]);
    assert!(result.is_ok());
}

#[test]
fn end_to_end_any_and_all_rules() {
    let table = table(vec![
        rule("/roles", &["role:read", "role:list"]),
        rule("/roles/[id]/permissions", &["role:update", "permission:manage"])
            .with_mode(PermissionMode::All),
    ]);
    let granted = PermissionSet::parse(["role:read"]).unwrap_or_default();

    let Some(list_rule) = table.match_route("/roles") else {
        panic!("list rule should match");
    };
    assert!(RouteRuleTable::authorize(list_rule, &granted).is_granted());

    let Some(manage_rule) = table.match_route("/roles/3/permissions") else {
        panic!("manage rule should match");
    };
    let missing = PermissionSet::parse(["role:update", "permission:manage"])
        .unwrap_or_default()
        .iter()
        .cloned()
        .collect::<Vec<_>>();
    let AuthorizationOutcome::Denied { missing: reported } =
        RouteRuleTable::authorize(manage_rule, &granted)
    else {
        panic!("manage rule should deny");
    };
    let mut reported = reported;
    reported.sort();
    assert_eq!(reported, missing);
}

#[test]
fn pattern_lists_match_paths() {
    let public = vec![
        RoutePattern::parse("/auth/[...rest]").unwrap_or_else(|error| panic!("{error}")),
        RoutePattern::parse("/health").unwrap_or_else(|error| panic!("{error}")),
    ];
    assert!(matches_any(&public, "/auth/signin"));
    assert!(matches_any(&public, "/health"));
    assert!(!matches_any(&public, "/roles"));
}
