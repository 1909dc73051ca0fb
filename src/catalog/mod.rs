//! Plan registry and feature catalog.
//!
//! The catalog is loaded once at startup from a version-controlled YAML
//! document, validated, and then shared read-only. Each tier's feature set
//! is cumulative: it contains every feature of every lower tier.

mod document;

pub use document::*;

use crate::models::{Feature, Plan, Tier};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

const BUILTIN_CATALOG: &str = include_str!("../../catalog.yaml");

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("unknown plan `{0}`")]
    UnknownPlan(String),
    #[error("catalog invariant violated: {0}")]
    InvariantViolation(String),
    #[error("failed to parse catalog: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("failed to read catalog file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct Catalog {
    version: String,
    features: HashMap<String, Feature>,
    plans: BTreeMap<String, Plan>,
    cumulative: BTreeMap<Tier, Vec<Feature>>,
}

impl Catalog {
    /// The catalog compiled into the binary from `catalog.yaml`.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_yaml(BUILTIN_CATALOG)
    }

    /// Loads `path` when given, the built-in catalog otherwise.
    pub fn load(path: Option<&str>) -> Result<Self, CatalogError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Self::builtin(),
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, CatalogError> {
        let document: CatalogDocument = serde_yaml::from_str(raw)?;
        Self::from_document(document)
    }

    pub fn from_document(document: CatalogDocument) -> Result<Self, CatalogError> {
        if document.version.trim().is_empty() {
            return Err(violation("catalog version is empty"));
        }

        let mut features = HashMap::with_capacity(document.features.len());
        for entry in document.features {
            if entry.key.trim().is_empty() || entry.label.trim().is_empty() {
                return Err(violation(format!(
                    "feature `{}` must have a non-empty key and label",
                    entry.key
                )));
            }
            let feature = Feature {
                key: entry.key,
                label: entry.label,
            };
            if let Some(previous) = features.insert(feature.key.clone(), feature) {
                return Err(violation(format!("feature `{}` is declared twice", previous.key)));
            }
        }

        let cumulative = cumulative_features(&document.tiers, &features)?;

        let granted: HashSet<&str> = cumulative
            .values()
            .flatten()
            .map(|feature| feature.key.as_str())
            .collect();
        if let Some(orphan) = features.keys().find(|key| !granted.contains(key.as_str())) {
            return Err(violation(format!("feature `{}` is not granted by any tier", orphan)));
        }

        let mut plans = BTreeMap::new();
        for entry in document.plans {
            if entry.id.trim().is_empty() {
                return Err(violation("plan id is empty"));
            }
            if entry.price_cents < 0 {
                return Err(violation(format!("plan `{}` has a negative price", entry.id)));
            }
            if entry.currency.len() != 3 {
                return Err(violation(format!(
                    "plan `{}` has an invalid currency code `{}`",
                    entry.id, entry.currency
                )));
            }
            let plan = Plan {
                id: entry.id,
                tier: entry.tier,
                cycle: entry.cycle,
                price_cents: entry.price_cents,
                currency: entry.currency.to_uppercase(),
            };
            if let Some(previous) = plans.insert(plan.id.clone(), plan) {
                return Err(violation(format!("plan `{}` is declared twice", previous.id)));
            }
        }

        Ok(Self {
            version: document.version,
            features,
            plans,
            cumulative,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Fails with `UnknownPlan` for identifiers the catalog does not know.
    /// Callers must block access in that case rather than pick a tier.
    pub fn resolve_plan(&self, plan_id: &str) -> Result<&Plan, CatalogError> {
        self.plans
            .get(plan_id)
            .ok_or_else(|| CatalogError::UnknownPlan(plan_id.to_string()))
    }

    /// Plans ordered by tier, then billing cycle.
    pub fn plans(&self) -> Vec<&Plan> {
        let mut plans: Vec<&Plan> = self.plans.values().collect();
        plans.sort_by(|a, b| (a.tier, a.cycle, &a.id).cmp(&(b.tier, b.cycle, &b.id)));
        plans
    }

    /// Every feature the tier grants, lower-tier features first.
    pub fn features_for_tier(&self, tier: Tier) -> &[Feature] {
        self.cumulative
            .get(&tier)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn feature(&self, key: &str) -> Option<&Feature> {
        self.features.get(key)
    }

    /// The lowest tier whose feature set contains `key`.
    pub fn minimum_tier_for(&self, key: &str) -> Option<Tier> {
        self.cumulative
            .iter()
            .find(|(_, features)| features.iter().any(|feature| feature.key == key))
            .map(|(tier, _)| *tier)
    }
}

fn violation(message: impl Into<String>) -> CatalogError {
    CatalogError::InvariantViolation(message.into())
}

/// Walks the tiers in rank order and builds each tier's complete feature
/// set from the one below it, then checks that no tier loses a feature.
fn cumulative_features(
    entries: &[TierEntry],
    features: &HashMap<String, Feature>,
) -> Result<BTreeMap<Tier, Vec<Feature>>, CatalogError> {
    let mut by_tier: HashMap<Tier, &TierEntry> = HashMap::with_capacity(entries.len());
    for entry in entries {
        if by_tier.insert(entry.tier, entry).is_some() {
            return Err(violation(format!("tier `{}` is declared twice", entry.tier)));
        }
    }

    let mut cumulative: BTreeMap<Tier, Vec<Feature>> = BTreeMap::new();
    let mut previous: Vec<Feature> = Vec::new();

    for tier in Tier::ALL {
        let entry = by_tier
            .get(&tier)
            .ok_or_else(|| violation(format!("tier `{}` is missing", tier)))?;

        let mut set: Vec<Feature> = if entry.inherit {
            previous.clone()
        } else {
            Vec::with_capacity(entry.features.len())
        };

        for key in &entry.features {
            let feature = features.get(key).ok_or_else(|| {
                violation(format!("tier `{}` references unknown feature `{}`", tier, key))
            })?;
            if set.iter().any(|existing| existing.key == feature.key) {
                return Err(violation(format!(
                    "tier `{}` grants feature `{}` more than once",
                    tier, key
                )));
            }
            set.push(feature.clone());
        }

        let missing: Vec<&str> = previous
            .iter()
            .filter(|feature| !set.iter().any(|f| f.key == feature.key))
            .map(|feature| feature.key.as_str())
            .collect();
        if !missing.is_empty() {
            return Err(violation(format!(
                "tier `{}` drops lower-tier features: {}",
                tier,
                missing.join(", ")
            )));
        }

        previous = set.clone();
        cumulative.insert(tier, set);
    }

    Ok(cumulative)
}
