//! Runtime version constraint matching
//!
//! Supported constraint forms, in recognition order:
//! - `1.20.1` - exact string equality
//! - `["1.20.1", "1.20.2"]` - array, matches if any element matches
//! - `>=1.20.0 <=1.20.4` - combined range (an exclusive `<` upper bound is also accepted)
//! - `1.20.x`, `1.20.*` - trailing wildcard, prefix match on `1.20.`
//! - `>=1.20`, `>1.20`, `<=1.20`, `<1.20` - single-bound comparators
//! - `~1.20.4` - same major.minor as the given version
//! - `*` - any version

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// A version constraint as declared by an archive manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VersionConstraint {
    One(String),
    AnyOf(Vec<VersionConstraint>),
}

impl VersionConstraint {
    pub fn is_empty(&self) -> bool {
        match self {
            VersionConstraint::One(expr) => expr.trim().is_empty(),
            VersionConstraint::AnyOf(items) => items.iter().all(|c| c.is_empty()),
        }
    }
}

impl From<&str> for VersionConstraint {
    fn from(expr: &str) -> Self {
        VersionConstraint::One(expr.to_string())
    }
}

impl std::fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VersionConstraint::One(expr) => f.write_str(expr),
            VersionConstraint::AnyOf(items) => {
                let parts: Vec<String> = items.iter().map(|c| c.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}

/// Check whether `target` satisfies the constraint
pub fn matches(constraint: &VersionConstraint, target: &str) -> bool {
    match constraint {
        VersionConstraint::One(expr) => matches_expr(expr, target),
        VersionConstraint::AnyOf(items) => items.iter().any(|c| matches(c, target)),
    }
}

/// Check whether `target` satisfies a single constraint expression
pub fn matches_expr(expr: &str, target: &str) -> bool {
    let expr = expr.trim();
    let target = target.trim();

    if expr.is_empty() || target.is_empty() {
        return false;
    }

    if expr == target {
        return true;
    }

    if expr == "*" {
        return true;
    }

    if let Some(range) = Bound::parse_range(expr) {
        return range.iter().all(|bound| bound.satisfied_by(target));
    }

    if let Some(prefix) = wildcard_prefix(expr) {
        return target.starts_with(&prefix);
    }

    if let Some(bound) = Bound::parse(expr) {
        return bound.satisfied_by(target);
    }

    if let Some(rest) = expr.strip_prefix('~') {
        return approx_matches(rest.trim(), target);
    }

    false
}

/// A single comparator bound like `>=1.20`
#[derive(Debug, Clone, PartialEq, Eq)]
enum Bound<'a> {
    Gte(&'a str),
    Gt(&'a str),
    Lte(&'a str),
    Lt(&'a str),
}

impl<'a> Bound<'a> {
    fn parse(expr: &'a str) -> Option<Self> {
        let expr = expr.trim();
        let bound = if let Some(rest) = expr.strip_prefix(">=") {
            Bound::Gte(rest.trim())
        } else if let Some(rest) = expr.strip_prefix('>') {
            Bound::Gt(rest.trim())
        } else if let Some(rest) = expr.strip_prefix("<=") {
            Bound::Lte(rest.trim())
        } else if let Some(rest) = expr.strip_prefix('<') {
            Bound::Lt(rest.trim())
        } else {
            return None;
        };

        // The operand must be a comparable version
        parse_numeric(bound.operand())?;
        Some(bound)
    }

    /// Parse a space-separated `lower upper` pair
    fn parse_range(expr: &'a str) -> Option<[Self; 2]> {
        let parts: Vec<&'a str> = expr.split_whitespace().collect();
        if parts.len() != 2 {
            return None;
        }

        let lower = Bound::parse(parts[0])?;
        let upper = Bound::parse(parts[1])?;

        match (&lower, &upper) {
            (Bound::Gte(_) | Bound::Gt(_), Bound::Lte(_) | Bound::Lt(_)) => Some([lower, upper]),
            _ => None,
        }
    }

    fn operand(&self) -> &'a str {
        match self {
            Bound::Gte(v) | Bound::Gt(v) | Bound::Lte(v) | Bound::Lt(v) => *v,
        }
    }

    fn satisfied_by(&self, target: &str) -> bool {
        let Some(ordering) = compare_versions(target, self.operand()) else {
            return false;
        };

        match self {
            Bound::Gte(_) => ordering != Ordering::Less,
            Bound::Gt(_) => ordering == Ordering::Greater,
            Bound::Lte(_) => ordering != Ordering::Greater,
            Bound::Lt(_) => ordering == Ordering::Less,
        }
    }
}

/// `1.20.x` / `1.20.*` -> `1.20.`
fn wildcard_prefix(expr: &str) -> Option<String> {
    let base = expr
        .strip_suffix(".x")
        .or_else(|| expr.strip_suffix(".X"))
        .or_else(|| expr.strip_suffix(".*"))?;

    if base.is_empty() || base.contains(char::is_whitespace) {
        return None;
    }

    Some(format!("{base}."))
}

/// `~1.20.4` matches any 1.20.* release
fn approx_matches(base: &str, target: &str) -> bool {
    let (Some(base), Some(target)) = (parse_numeric(base), parse_numeric(target)) else {
        return false;
    };

    let component = |parts: &[u64], i: usize| parts.get(i).copied().unwrap_or(0);
    component(&base, 0) == component(&target, 0) && component(&base, 1) == component(&target, 1)
}

/// Split a version into integer components, ignoring any `-suffix`.
///
/// Examples:
/// - "1.20.4" -> [1, 20, 4]
/// - "1.21-pre1" -> [1, 21]
/// - "1.20.x" -> None
pub fn parse_numeric(version: &str) -> Option<Vec<u64>> {
    let core = version.split('-').next().unwrap_or(version).trim();
    if core.is_empty() {
        return None;
    }

    core.split('.').map(|part| part.parse::<u64>().ok()).collect()
}

/// Compare two versions component-wise, treating missing components as zero.
/// Returns `None` when either side is not numeric.
pub fn compare_versions(a: &str, b: &str) -> Option<Ordering> {
    let a = parse_numeric(a)?;
    let b = parse_numeric(b)?;
    let len = a.len().max(b.len());

    for i in 0..len {
        let left = a.get(i).copied().unwrap_or(0);
        let right = b.get(i).copied().unwrap_or(0);
        match left.cmp(&right) {
            Ordering::Equal => continue,
            other => return Some(other),
        }
    }

    Some(Ordering::Equal)
}

/// Collapse a list of supported versions into one constraint.
///
/// A single entry is kept verbatim, several entries become `>=min <=max`.
/// Lists without any numeric entry are kept as an array.
pub fn collapse_versions(versions: &[String]) -> Option<VersionConstraint> {
    let versions: Vec<&String> = versions.iter().filter(|v| !v.trim().is_empty()).collect();

    match versions.as_slice() {
        [] => None,
        [only] => Some(VersionConstraint::One(only.trim().to_string())),
        _ => {
            let mut numeric: Vec<&String> = versions
                .iter()
                .copied()
                .filter(|v| parse_numeric(v).is_some())
                .collect();

            if numeric.is_empty() {
                return Some(VersionConstraint::AnyOf(
                    versions
                        .iter()
                        .map(|v| VersionConstraint::One(v.to_string()))
                        .collect(),
                ));
            }

            numeric.sort_by(|a, b| compare_versions(a, b).unwrap_or(Ordering::Equal));
            let min = numeric[0];
            let max = numeric[numeric.len() - 1];
            Some(VersionConstraint::One(format!(">={min} <={max}")))
        }
    }
}
