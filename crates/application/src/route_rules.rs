use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};

use gatehouse_core::{AppError, AppResult};
use gatehouse_domain::{
    AuthorizationOutcome, PermissionSet, RoutePattern, RouteRule, normalize_path, path_segments,
};

/// Validated, precedence-ordered table of route rules.
///
/// Lookup first tries an exact match of the normalized path against the
/// rule patterns, then walks the rules by descending priority, descending
/// segment count and declaration order.
#[derive(Debug, Clone)]
pub struct RouteRuleTable {
    rules: Vec<RouteRule>,
    exact: HashMap<String, usize>,
}

impl RouteRuleTable {
    /// Builds a table, failing fast on duplicate or ambiguous rules.
    ///
    /// Two rules are ambiguous when they share priority and segment count
    /// and some path matches both. Fully literal patterns never conflict
    /// because the exact-match pass resolves them first.
    pub fn new(rules: Vec<RouteRule>) -> AppResult<Self> {
        let mut seen = HashSet::new();
        for rule in &rules {
            let key = rule.pattern().to_string();
            if !seen.insert(key.clone()) {
                return Err(AppError::Validation(format!(
                    "route pattern '{key}' is declared more than once"
                )));
            }
        }

        for (index, left) in rules.iter().enumerate() {
            for right in rules.iter().skip(index + 1) {
                if is_ambiguous(left, right) {
                    return Err(AppError::Validation(format!(
                        "route patterns '{}' and '{}' tie in precedence and overlap; \
                         give one of them an explicit priority",
                        left.pattern(),
                        right.pattern()
                    )));
                }
            }
        }

        let mut rules = rules;
        rules.sort_by_key(|rule| (Reverse(rule.priority()), Reverse(rule.pattern().segment_count())));

        let exact = rules
            .iter()
            .enumerate()
            .map(|(index, rule)| (rule.pattern().to_string(), index))
            .collect();

        Ok(Self { rules, exact })
    }

    /// Builds a table from fallible rule declarations.
    pub fn from_declarations<I>(declarations: I) -> AppResult<Self>
    where
        I: IntoIterator<Item = AppResult<RouteRule>>,
    {
        let rules = declarations.into_iter().collect::<AppResult<Vec<_>>>()?;
        Self::new(rules)
    }

    /// Returns the rule governing a request path, if any.
    ///
    /// `None` means the route only requires authentication.
    #[must_use]
    pub fn match_route(&self, path: &str) -> Option<&RouteRule> {
        let normalized = normalize_path(path);
        if let Some(index) = self.exact.get(normalized.as_str()) {
            return self.rules.get(*index);
        }

        let segments = path_segments(path);
        self.rules
            .iter()
            .find(|rule| rule.pattern().matches_segments(segments.as_slice()))
    }

    /// Evaluates a matched rule against the caller's permissions.
    #[must_use]
    pub fn authorize(rule: &RouteRule, granted: &PermissionSet) -> AuthorizationOutcome {
        rule.authorize(granted)
    }

    /// Returns rules in evaluation order.
    #[must_use]
    pub fn rules(&self) -> &[RouteRule] {
        self.rules.as_slice()
    }

    /// Returns the number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns whether the table has no rule.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn is_ambiguous(left: &RouteRule, right: &RouteRule) -> bool {
    left.priority() == right.priority()
        && left.pattern().segment_count() == right.pattern().segment_count()
        && !left.pattern().is_literal()
        && !right.pattern().is_literal()
        && left.pattern().overlaps(right.pattern())
}

/// Returns whether any pattern in the list matches the path.
#[must_use]
pub fn matches_any(patterns: &[RoutePattern], path: &str) -> bool {
    let segments = path_segments(path);
    patterns
        .iter()
        .any(|pattern| pattern.matches_segments(segments.as_slice()))
}

#[cfg(test)]
mod tests;
