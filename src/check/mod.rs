//! Dependency rules.
//!
//! A rule pairs a `from` glob with a `to` glob and an allow/deny policy.
//! Globs match paths relative to the graph root using `/` separators, and
//! `*` may cross directory boundaries. For each edge the most specific
//! matching rule decides (longest literal prefix of `from` plus `to`, ties
//! going to the rule declared first); edges no rule matches fall back to the
//! default policy.
use globset::{Glob, GlobMatcher};
use serde::{Deserialize, Serialize};

use crate::errors::DepTreeError;
use crate::graph::ModuleGraph;
use crate::query::{CycleDetectionQuery, Query};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Policy {
    Allow,
    #[default]
    Deny,
}

/// A rule as written in the configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSpec {
    pub policy: Policy,
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl RuleSpec {
    pub fn new(policy: Policy, from: impl Into<String>, to: impl Into<String>) -> Self {
        Self { policy, from: from.into(), to: to.into(), reason: None }
    }
}

#[derive(Debug, Clone)]
struct CompiledRule {
    spec: RuleSpec,
    from: GlobMatcher,
    to: GlobMatcher,
    specificity: usize,
}

fn literal_prefix_len(pattern: &str) -> usize {
    pattern.chars().take_while(|c| !matches!(c, '*' | '?' | '[' | '{')).count()
}

fn compile(pattern: &str) -> Result<GlobMatcher, DepTreeError> {
    Glob::new(pattern)
        .map(|g| g.compile_matcher())
        .map_err(|e| DepTreeError::Config(format!("rule pattern '{pattern}' is not correctly formatted: {e}")))
}

#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<CompiledRule>,
    default_policy: Policy,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self { rules: Vec::new(), default_policy: Policy::default() }
    }
}

impl RuleSet {
    /// Compile rule globs.
    ///
    /// # Errors
    /// Returns `DepTreeError::Config` when a pattern is malformed.
    pub fn new(specs: Vec<RuleSpec>, default_policy: Policy) -> Result<Self, DepTreeError> {
        let rules = specs
            .into_iter()
            .map(|spec| {
                Ok(CompiledRule {
                    from: compile(&spec.from)?,
                    to: compile(&spec.to)?,
                    specificity: literal_prefix_len(&spec.from) + literal_prefix_len(&spec.to),
                    spec,
                })
            })
            .collect::<Result<Vec<_>, DepTreeError>>()?;
        Ok(Self { rules, default_policy })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Index of the deciding rule for a `from -> to` pair, if any matches.
    #[must_use]
    pub fn matching_rule(&self, from: &str, to: &str) -> Option<usize> {
        let mut best: Option<(usize, usize)> = None;
        for (i, r) in self.rules.iter().enumerate() {
            if !(r.from.is_match(from) && r.to.is_match(to)) {
                continue;
            }
            if best.map_or(true, |(_, s)| r.specificity > s) {
                best = Some((i, r.specificity));
            }
        }
        best.map(|(i, _)| i)
    }

    #[must_use]
    pub fn decide(&self, from: &str, to: &str) -> Policy {
        self.matching_rule(from, to).map_or(self.default_policy, |i| self.rules[i].spec.policy)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub from: String,
    pub to: String,
    /// Zero-based index of the deny rule, `None` under the default policy.
    pub rule: Option<usize>,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CheckReport {
    pub violations: Vec<Violation>,
    pub cycles: Vec<Vec<String>>,
}

impl CheckReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty() && self.cycles.is_empty()
    }
}

/// One violation per offending edge, in edge order.
#[must_use]
pub fn check(graph: &ModuleGraph, rules: &RuleSet) -> Vec<Violation> {
    let mut out = Vec::new();
    for edge in graph.edges() {
        let from = graph.display_name(&edge.from);
        let to = graph.display_name(&edge.to);
        let rule = rules.matching_rule(&from, &to);
        let policy = rule.map_or(rules.default_policy, |i| rules.rules[i].spec.policy);
        if policy == Policy::Allow {
            continue;
        }
        let reason = match rule {
            Some(i) => rules.rules[i]
                .spec
                .reason
                .clone()
                .unwrap_or_else(|| format!("denied by rule #{}: {} -> {}", i + 1, rules.rules[i].spec.from, rules.rules[i].spec.to)),
            None => "no rule allows this dependency".to_string(),
        };
        out.push(Violation { from, to, rule, reason });
    }
    out
}

/// Rule check plus the circular dependency check.
pub struct CheckQuery {
    pub rules: RuleSet,
    pub allow_circular_dependencies: bool,
}

impl Query<CheckReport> for CheckQuery {
    fn run(&self, graph: &ModuleGraph) -> CheckReport {
        let violations = check(graph, &self.rules);
        let cycles = if self.allow_circular_dependencies {
            Vec::new()
        } else {
            CycleDetectionQuery::new()
                .run(graph)
                .into_iter()
                .map(|c| c.iter().map(|id| graph.display_name(id)).collect())
                .collect()
        };
        CheckReport { violations, cycles }
    }
}
