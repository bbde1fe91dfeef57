//! Column classification.
//!
//! Sheets are not named consistently, so the aggregate summary decides which
//! columns hold promotion or sales data through a [`ColumnClassifier`]. The
//! default [`SubstringClassifier`] tags a column when its name contains a
//! known fragment ("promo", "venta", ...). Deployments that want deterministic
//! behavior can list columns explicitly with [`ExplicitClassifier`].

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::schema::normalize_column_name;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnTag {
    Promo,
    Sales,
    Zone,
    Area,
}

pub type TagSet = BTreeSet<ColumnTag>;

pub trait ColumnClassifier: Send + Sync {
    fn classify(&self, column: &str) -> TagSet;

    fn has_tag(&self, column: &str, tag: ColumnTag) -> bool {
        self.classify(column).contains(&tag)
    }
}

impl<F> ColumnClassifier for F
where
    F: Fn(&str) -> TagSet + Send + Sync,
{
    fn classify(&self, column: &str) -> TagSet {
        self(column)
    }
}

const DEFAULT_PATTERNS: &[(&str, ColumnTag)] = &[
    ("promo", ColumnTag::Promo),
    ("venta", ColumnTag::Sales),
    ("sales", ColumnTag::Sales),
    ("zona", ColumnTag::Zone),
    ("area", ColumnTag::Area),
];

/// Tags a column for every pattern its lowercased name contains.
#[derive(Debug, Clone)]
pub struct SubstringClassifier {
    patterns: Vec<(String, ColumnTag)>,
}

impl SubstringClassifier {
    pub fn new(patterns: Vec<(String, ColumnTag)>) -> Self {
        let patterns = patterns
            .into_iter()
            .map(|(fragment, tag)| (fragment.to_lowercase(), tag))
            .collect();
        Self { patterns }
    }
}

impl Default for SubstringClassifier {
    fn default() -> Self {
        Self::new(
            DEFAULT_PATTERNS
                .iter()
                .map(|(fragment, tag)| (fragment.to_string(), *tag))
                .collect(),
        )
    }
}

impl ColumnClassifier for SubstringClassifier {
    fn classify(&self, column: &str) -> TagSet {
        let name = column.to_lowercase();
        self.patterns
            .iter()
            .filter(|(fragment, _)| name.contains(fragment.as_str()))
            .map(|(_, tag)| *tag)
            .collect()
    }
}

/// Tags exactly the listed columns, compared by normalized name.
#[derive(Debug, Clone, Default)]
pub struct ExplicitClassifier {
    columns: BTreeMap<String, TagSet>,
}

impl ExplicitClassifier {
    pub fn new(by_tag: &BTreeMap<ColumnTag, Vec<String>>) -> Self {
        let mut columns: BTreeMap<String, TagSet> = BTreeMap::new();
        for (tag, names) in by_tag {
            for name in names {
                columns
                    .entry(normalize_column_name(name))
                    .or_default()
                    .insert(*tag);
            }
        }
        Self { columns }
    }
}

impl ColumnClassifier for ExplicitClassifier {
    fn classify(&self, column: &str) -> TagSet {
        self.columns
            .get(&normalize_column_name(column))
            .cloned()
            .unwrap_or_default()
    }
}
