//! Intercept Rule Set
//!
//! Known question shapes answered by hand-written handlers without touching the
//! text-generation collaborator. Rules are evaluated in declaration order against
//! the trimmed input and the first match wins.

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use tracing::debug;

/// Which hand-written handler answers the question, with its argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intercept {
    /// Full project summary for an upper-cased project name
    ProjectSummary(String),
    /// Status of every phase of a project
    PhaseStatus(String),
    /// Invoice totals for every project
    BudgetAll,
    /// Every invoice of one project
    ProjectBudget(String),
}

pub struct InterceptRule {
    pub name: &'static str,
    pattern: Regex,
    extract: fn(&Captures) -> Intercept,
}

impl InterceptRule {
    // patterns are compile-time constants
    fn new(name: &'static str, pattern: &str, extract: fn(&Captures) -> Intercept) -> Self {
        Self {
            name,
            pattern: Regex::new(pattern).unwrap(),
            extract,
        }
    }

    pub fn apply(&self, text: &str) -> Option<Intercept> {
        self.pattern.captures(text).map(|caps| (self.extract)(&caps))
    }
}

fn upper_name(caps: &Captures) -> String {
    caps.get(1)
        .map(|m| m.as_str().to_uppercase())
        .unwrap_or_default()
}

lazy_static! {
    static ref STANDARD_RULES: Vec<InterceptRule> = vec![
        InterceptRule::new(
            "project_details",
            r"(?i)\bdetails? of\s+([A-Za-z0-9\-]+)\s+project",
            |caps| Intercept::ProjectSummary(upper_name(caps)),
        ),
        InterceptRule::new(
            "phase_status",
            r"(?i)\b(?:status|progress) of\s+([A-Za-z0-9\-]+)",
            |caps| Intercept::PhaseStatus(upper_name(caps)),
        ),
        InterceptRule::new(
            "budget_all_projects",
            r"(?i)\bbudget status for all projects",
            |_| Intercept::BudgetAll,
        ),
        InterceptRule::new(
            "project_budget",
            r"(?i)\bbudget status for\s+([A-Za-z0-9\-]+)\s+project",
            |caps| Intercept::ProjectBudget(upper_name(caps)),
        ),
    ];
}

/// Ordered rule list
pub struct InterceptRuleSet {
    rules: &'static [InterceptRule],
}

impl Default for InterceptRuleSet {
    fn default() -> Self {
        Self::standard()
    }
}

impl InterceptRuleSet {
    pub fn standard() -> Self {
        Self {
            rules: STANDARD_RULES.as_slice(),
        }
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name).collect()
    }

    pub fn match_first(&self, text: &str) -> Option<Intercept> {
        let text = text.trim();
        self.rules.iter().find_map(|rule| {
            let hit = rule.apply(text)?;
            debug!("Intercept rule '{}' matched: {:?}", rule.name, hit);
            Some(hit)
        })
    }
}
