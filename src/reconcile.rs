//! Multi-source reconciliation.
//!
//! Each source table is normalized and key-resolved on its own, then folded
//! into an accumulator with a full outer join on [`CANONICAL_KEY`], in
//! [`SourceKind`] preference order. The result is one unified table with a row
//! per distinct store key, plus an [`AggregateSummary`] derived from it.
//!
//! Problems with individual sources never abort the run; they are collected as
//! [`SourceWarning`]s next to whatever the remaining sources produced.

use std::{
    borrow::Borrow,
    collections::{BTreeMap, HashMap, HashSet},
    fmt,
};

use log::{debug, info, warn};
use serde::Serialize;

use crate::{
    classify::{ColumnClassifier, ColumnTag, SubstringClassifier, TagSet},
    data::Value,
    schema::{self, CANONICAL_KEY},
    source::SourceKind,
    table::{Row, Table, free_name},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AggregateSummary {
    pub total: usize,
    pub with_promos: usize,
    pub without_sales: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceWarning {
    LoadFailed { source: SourceKind, reason: String },
    MissingKey { source: SourceKind },
    BlankKeys { source: SourceKind, count: usize },
    DuplicateKeys { source: SourceKind, count: usize },
}

impl fmt::Display for SourceWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceWarning::LoadFailed { source, reason } => {
                write!(f, "{source}: could not be loaded ({reason})")
            }
            SourceWarning::MissingKey { source } => {
                write!(f, "{source}: no store number column found; source skipped")
            }
            SourceWarning::BlankKeys { source, count } => {
                write!(f, "{source}: {count} row(s) without a store number ignored")
            }
            SourceWarning::DuplicateKeys { source, count } => write!(
                f,
                "{source}: {count} repeated store number row(s) ignored; first occurrence kept"
            ),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Reconciliation {
    pub unified: Table,
    pub summary: AggregateSummary,
    pub warnings: Vec<SourceWarning>,
    pub contributing: Vec<SourceKind>,
}

/// Joins sources using a key alias list and a column classifier.
pub struct Reconciler {
    key_aliases: Vec<String>,
    classifier: Box<dyn ColumnClassifier>,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(
            schema::default_key_aliases(),
            Box::new(SubstringClassifier::default()),
        )
    }
}

impl fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reconciler")
            .field("key_aliases", &self.key_aliases)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    pub fn new(key_aliases: Vec<String>, classifier: Box<dyn ColumnClassifier>) -> Self {
        Self {
            key_aliases,
            classifier,
        }
    }

    pub fn classifier(&self) -> &dyn ColumnClassifier {
        self.classifier.as_ref()
    }

    pub fn reconcile<B: Borrow<Table>>(
        &self,
        sources: &BTreeMap<SourceKind, B>,
    ) -> Reconciliation {
        let mut warnings = Vec::new();
        let mut contributing = Vec::new();
        let mut accumulator = Accumulator::default();

        for (kind, table) in sources {
            let table = table.borrow();
            if table.is_empty() {
                debug!("Source {kind} is empty; skipping");
                continue;
            }
            let Some(prepared) = self.prepare(*kind, table) else {
                warn!("Source {kind} has no store number column; excluded from join");
                warnings.push(SourceWarning::MissingKey { source: *kind });
                continue;
            };
            let keyed = dedupe_keys(*kind, &prepared, &mut warnings);
            accumulator.join(*kind, &prepared, keyed, self.classifier());
            contributing.push(*kind);
        }

        let (unified, tags) = accumulator.into_table();
        let summary = summarize_tagged(&unified, &tags);
        info!(
            "Reconciled {} source(s) into {} store(s): {} with promotions, {} without sales",
            contributing.len(),
            summary.total,
            summary.with_promos,
            summary.without_sales
        );
        Reconciliation {
            unified,
            summary,
            warnings,
            contributing,
        }
    }

    /// Normalizes `table` and renames its key column, or `None` when no alias matches.
    fn prepare(&self, kind: SourceKind, table: &Table) -> Option<Table> {
        let normalized = schema::normalize(table);
        let key = schema::resolve_key(&normalized, &self.key_aliases)?;
        debug!("Source {kind} keyed on column '{key}'");
        match schema::rename_key(&normalized, &key) {
            Ok(renamed) => Some(renamed),
            Err(err) => {
                warn!("Source {kind}: renaming key column '{key}' failed: {err}");
                None
            }
        }
    }
}

/// Reconciles with the default key aliases and substring classifier.
pub fn reconcile<B: Borrow<Table>>(sources: &BTreeMap<SourceKind, B>) -> Reconciliation {
    Reconciler::default().reconcile(sources)
}

/// Derives the aggregate counts from a table, classifying its column names as
/// they stand.
///
/// [`Reconciler::reconcile`] does not go through here: it classifies each
/// column under its source name, before any collision suffix is added.
pub fn summarize(table: &Table, classifier: &dyn ColumnClassifier) -> AggregateSummary {
    let tags = table
        .columns()
        .iter()
        .map(|name| classifier.classify(name))
        .collect::<Vec<_>>();
    summarize_tagged(table, &tags)
}

/// `tags[i]` holds the tags of column `i`.
fn summarize_tagged(table: &Table, tags: &[TagSet]) -> AggregateSummary {
    let Some(key_idx) = table.column_index(CANONICAL_KEY) else {
        return AggregateSummary::default();
    };
    let tagged = |tag: ColumnTag| -> Vec<usize> {
        tags.iter()
            .enumerate()
            .filter(|(idx, set)| *idx != key_idx && set.contains(&tag))
            .map(|(idx, _)| idx)
            .collect()
    };
    let promo_columns = tagged(ColumnTag::Promo);
    let sales_columns = tagged(ColumnTag::Sales);

    let mut seen = HashSet::new();
    let mut summary = AggregateSummary::default();
    for row in table.rows() {
        let Some(key) = row[key_idx].as_ref().map(Value::as_display) else {
            continue;
        };
        if key.trim().is_empty() || !seen.insert(schema::normalize_key(&key)) {
            continue;
        }
        summary.total += 1;
        if promo_columns.iter().any(|idx| row[*idx].is_some()) {
            summary.with_promos += 1;
        }
        if sales_columns.iter().all(|idx| row[*idx].is_none()) {
            summary.without_sales += 1;
        }
    }
    summary
}

/// Rows of one source that survive key checks, with their display key.
struct KeyedRow<'a> {
    join_key: String,
    key_text: String,
    row: &'a Row,
}

/// First occurrence of each key wins; blank keys are dropped.
fn dedupe_keys<'a>(
    kind: SourceKind,
    table: &'a Table,
    warnings: &mut Vec<SourceWarning>,
) -> Vec<KeyedRow<'a>> {
    let key_idx = table.column_index(CANONICAL_KEY).unwrap_or_default();
    let mut seen = HashSet::new();
    let mut blank = 0usize;
    let mut duplicates = 0usize;
    let mut kept = Vec::with_capacity(table.row_count());
    for row in table.rows() {
        let key_text = row[key_idx]
            .as_ref()
            .map(|value| value.as_display().trim().to_string())
            .unwrap_or_default();
        if key_text.is_empty() {
            blank += 1;
            continue;
        }
        let join_key = schema::normalize_key(&key_text);
        if !seen.insert(join_key.clone()) {
            duplicates += 1;
            continue;
        }
        kept.push(KeyedRow {
            join_key,
            key_text,
            row,
        });
    }
    if blank > 0 {
        warn!("Source {kind}: {blank} row(s) without a store number ignored");
        warnings.push(SourceWarning::BlankKeys {
            source: kind,
            count: blank,
        });
    }
    if duplicates > 0 {
        warn!("Source {kind}: {duplicates} duplicate store number row(s) ignored");
        warnings.push(SourceWarning::DuplicateKeys {
            source: kind,
            count: duplicates,
        });
    }
    kept
}

/// Running outer join. The key column is always first.
///
/// `tags` runs parallel to `columns` and records how each column was
/// classified under its source name.
struct Accumulator {
    columns: Vec<String>,
    tags: Vec<TagSet>,
    taken: HashSet<String>,
    rows: Vec<Row>,
    index: HashMap<String, usize>,
}

impl Default for Accumulator {
    fn default() -> Self {
        Self {
            columns: vec![CANONICAL_KEY.to_string()],
            tags: vec![TagSet::new()],
            taken: HashSet::from([CANONICAL_KEY.to_string()]),
            rows: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl Accumulator {
    fn join(
        &mut self,
        kind: SourceKind,
        table: &Table,
        keyed: Vec<KeyedRow<'_>>,
        classifier: &dyn ColumnClassifier,
    ) {
        // (position in source row, position in accumulator row)
        let mut mapping = Vec::with_capacity(table.column_count());
        for (src_idx, name) in table.columns().iter().enumerate() {
            if name == CANONICAL_KEY {
                continue;
            }
            let output = if self.taken.contains(name) {
                free_name(&format!("{name}_{}", kind.label()), &self.taken)
            } else {
                name.clone()
            };
            if &output != name {
                debug!("Source {kind}: column '{name}' renamed to '{output}' to avoid collision");
            }
            self.taken.insert(output.clone());
            self.columns.push(output);
            self.tags.push(classifier.classify(name));
            mapping.push((src_idx, self.columns.len() - 1));
        }

        let width = self.columns.len();
        for row in &mut self.rows {
            row.resize(width, None);
        }

        for keyed_row in keyed {
            let target = match self.index.get(&keyed_row.join_key) {
                Some(existing) => *existing,
                None => {
                    let mut fresh: Row = vec![None; width];
                    fresh[0] = Some(Value::Text(keyed_row.key_text));
                    self.rows.push(fresh);
                    self.index.insert(keyed_row.join_key, self.rows.len() - 1);
                    self.rows.len() - 1
                }
            };
            for (src_idx, dst_idx) in &mapping {
                self.rows[target][*dst_idx] = keyed_row.row[*src_idx].clone();
            }
        }
    }

    fn into_table(self) -> (Table, Vec<TagSet>) {
        if self.rows.is_empty() {
            return (Table::empty(), Vec::new());
        }
        (Table::from_raw(self.columns, self.rows), self.tags)
    }
}
