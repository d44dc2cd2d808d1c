//! Entity Resolver
//!
//! Maps a user-typed name onto a real record in three tiers:
//! 1. exact: case-insensitive equality via the live lookup
//! 2. fuzzy: up to three catalog names whose similarity clears the threshold
//! 3. none: the whole catalog, so the user can pick
//!
//! Similarity is a normalized Levenshtein ratio on upper-cased names
//! (1.0 = identical, symmetric).

use crate::db::EntityCatalog;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strsim::normalized_levenshtein;
use tracing::debug;

/// Resolution level at which a name was matched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Exact,
    Fuzzy,
    None,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution<R> {
    pub requested: String,
    pub tier: Tier,
    /// Full record, present only for [`Tier::Exact`]
    pub primary: Option<R>,
    /// Fuzzy matches (best first) or the whole catalog
    pub suggestions: Vec<String>,
}

/// Live exact-match lookup, usually a database query.
#[async_trait]
pub trait EntityLookup: Send + Sync {
    type Record: Send;

    /// Case-insensitive equality lookup.
    async fn find_exact(&self, name: &str) -> Result<Option<Self::Record>>;
}

/// In-memory name list, serving as both the exact lookup and the catalog.
#[derive(Debug, Clone, Default)]
pub struct NameCatalog {
    names: Vec<String>,
}

impl NameCatalog {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

#[async_trait]
impl EntityLookup for NameCatalog {
    type Record = String;

    async fn find_exact(&self, name: &str) -> Result<Option<String>> {
        let wanted = name.to_uppercase();
        Ok(self.names.iter().find(|n| n.to_uppercase() == wanted).cloned())
    }
}

#[async_trait]
impl EntityCatalog for NameCatalog {
    async fn list_names(&self, _table: &str) -> Result<Vec<String>> {
        Ok(self.names.clone())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredName {
    pub name: String,
    pub score: f64,
}

/// Fuzzy ranking over a name catalog
#[derive(Debug, Clone)]
pub struct FuzzyMatcher {
    /// Minimum similarity (0.0-1.0) for a catalog name to be suggested
    pub similarity_threshold: f64,
    /// Maximum number of suggestions
    pub limit: usize,
}

impl Default for FuzzyMatcher {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.6,
            limit: 3,
        }
    }
}

impl FuzzyMatcher {
    pub fn new(similarity_threshold: f64, limit: usize) -> Self {
        Self {
            similarity_threshold,
            limit,
        }
    }

    pub fn similarity(&self, a: &str, b: &str) -> f64 {
        normalized_levenshtein(&a.to_uppercase(), &b.to_uppercase())
    }

    /// Catalog names clearing the threshold, best first. Equal scores keep
    /// catalog order.
    pub fn rank(&self, raw: &str, known: &[String]) -> Vec<ScoredName> {
        let mut scored: Vec<ScoredName> = known
            .iter()
            .map(|name| ScoredName {
                name: name.clone(),
                score: self.similarity(raw, name),
            })
            .filter(|s| s.score >= self.similarity_threshold)
            .collect();

        // sort_by is stable
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(self.limit);
        scored
    }
}

#[derive(Debug, Clone, Default)]
pub struct EntityResolver {
    matcher: FuzzyMatcher,
}

impl EntityResolver {
    pub fn new(matcher: FuzzyMatcher) -> Self {
        Self { matcher }
    }

    pub fn matcher(&self) -> &FuzzyMatcher {
        &self.matcher
    }

    /// Exact lookup first; the catalog for `table` is read only on a miss.
    pub async fn resolve<L, C>(
        &self,
        lookup: &L,
        raw: &str,
        catalog: &C,
        table: &str,
    ) -> Result<Resolution<L::Record>>
    where
        L: EntityLookup,
        C: EntityCatalog + ?Sized,
    {
        if let Some(record) = lookup.find_exact(raw).await? {
            debug!("Resolved '{}' exactly", raw);
            return Ok(Resolution {
                requested: raw.to_string(),
                tier: Tier::Exact,
                primary: Some(record),
                suggestions: Vec::new(),
            });
        }

        let known = catalog.list_names(table).await?;
        Ok(self.fallback(raw, &known))
    }

    fn fallback<R>(&self, raw: &str, known: &[String]) -> Resolution<R> {
        let ranked = self.matcher.rank(raw, known);
        if !ranked.is_empty() {
            debug!("Resolved '{}' fuzzily: {:?}", raw, ranked);
            return Resolution {
                requested: raw.to_string(),
                tier: Tier::Fuzzy,
                primary: None,
                suggestions: ranked.into_iter().map(|s| s.name).collect(),
            };
        }

        debug!("No match for '{}', offering {} catalog names", raw, known.len());
        Resolution {
            requested: raw.to_string(),
            tier: Tier::None,
            primary: None,
            suggestions: known.to_vec(),
        }
    }
}
