//! Schema/data comparison of two relational stores.
//!
//! Verification-only: after an export→import round trip, this engine diffs
//! the original database against the rebuilt one table-by-table (table
//! sets, column definitions, row counts, then pk-ordered row data) and
//! reports every difference it finds. It never writes to either store.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::error::Result;
use crate::relational::RelationalPool;
use crate::schema::Table;

/// Per-table comparison outcome.
#[derive(Debug, Clone, Serialize)]
pub struct TableCompareResult {
    pub table: String,
    /// Human-readable column mismatches (missing columns, type changes).
    pub column_diffs: Vec<String>,
    pub baseline_rows: i64,
    pub candidate_rows: i64,
    /// Rows differing on the compared (shared) columns, pk-ordered.
    pub mismatched_rows: usize,
    pub identical: bool,
}

/// Whole-run comparison outcome.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CompareReport {
    pub missing_in_candidate: Vec<String>,
    pub extra_in_candidate: Vec<String>,
    pub tables: Vec<TableCompareResult>,
    pub identical: bool,
}

/// Comparator over a baseline and a candidate store.
pub struct CompareEngine {
    baseline: Arc<RelationalPool>,
    candidate: Arc<RelationalPool>,
}

impl CompareEngine {
    pub fn new(baseline: Arc<RelationalPool>, candidate: Arc<RelationalPool>) -> Self {
        Self {
            baseline,
            candidate,
        }
    }

    /// Diff the two stores.
    pub async fn run(&self) -> Result<CompareReport> {
        let baseline_tables = self.baseline.extract_schema().await?;
        let candidate_tables = self.candidate.extract_schema().await?;
        let mut report = CompareReport::default();

        for table in &baseline_tables {
            if !candidate_tables.iter().any(|t| t.name == table.name) {
                report.missing_in_candidate.push(table.name.clone());
            }
        }
        for table in &candidate_tables {
            if !baseline_tables.iter().any(|t| t.name == table.name) {
                report.extra_in_candidate.push(table.name.clone());
            }
        }

        for baseline_table in &baseline_tables {
            let Some(candidate_table) = candidate_tables
                .iter()
                .find(|t| t.name == baseline_table.name)
            else {
                continue;
            };
            match self.compare_table(baseline_table, candidate_table).await {
                Ok(result) => report.tables.push(result),
                Err(e) => {
                    warn!("Comparing table {} failed: {}", baseline_table.name, e);
                    report.tables.push(TableCompareResult {
                        table: baseline_table.name.clone(),
                        column_diffs: vec![format!("comparison failed: {}", e)],
                        baseline_rows: -1,
                        candidate_rows: -1,
                        mismatched_rows: 0,
                        identical: false,
                    });
                }
            }
        }

        report.identical = report.missing_in_candidate.is_empty()
            && report.extra_in_candidate.is_empty()
            && report.tables.iter().all(|t| t.identical);

        info!(
            "Comparison finished: {} tables compared, identical = {}",
            report.tables.len(),
            report.identical
        );
        Ok(report)
    }

    async fn compare_table(
        &self,
        baseline: &Table,
        candidate: &Table,
    ) -> Result<TableCompareResult> {
        let column_diffs = diff_columns(baseline, candidate);

        let baseline_rows = self.baseline.exact_row_count(&baseline.name).await?;
        let candidate_rows = self.candidate.exact_row_count(&candidate.name).await?;

        // Row data compared on the columns both sides share, in baseline
        // column order, both sides pk-ordered.
        let shared: Vec<&str> = baseline
            .columns
            .iter()
            .filter(|c| candidate.column(&c.name).is_some())
            .map(|c| c.name.as_str())
            .collect();

        let baseline_idx: Vec<usize> = shared
            .iter()
            .filter_map(|name| baseline.columns.iter().position(|c| &c.name == name))
            .collect();
        let candidate_idx: Vec<usize> = shared
            .iter()
            .filter_map(|name| candidate.columns.iter().position(|c| &c.name == name))
            .collect();

        let baseline_data = self.baseline.read_all(baseline).await?;
        let candidate_data = self.candidate.read_all(candidate).await?;

        let mut mismatched_rows = 0usize;
        for (left, right) in baseline_data.iter().zip(candidate_data.iter()) {
            let equal = baseline_idx
                .iter()
                .zip(&candidate_idx)
                .all(|(li, ri)| left.values()[*li] == right.values()[*ri]);
            if !equal {
                mismatched_rows += 1;
            }
        }
        mismatched_rows +=
            (baseline_data.len() as i64 - candidate_data.len() as i64).unsigned_abs() as usize;

        let identical =
            column_diffs.is_empty() && baseline_rows == candidate_rows && mismatched_rows == 0;

        Ok(TableCompareResult {
            table: baseline.name.clone(),
            column_diffs,
            baseline_rows,
            candidate_rows,
            mismatched_rows,
            identical,
        })
    }
}

/// Column-level differences between two versions of a table.
fn diff_columns(baseline: &Table, candidate: &Table) -> Vec<String> {
    let mut diffs = Vec::new();

    for col in &baseline.columns {
        match candidate.column(&col.name) {
            None => diffs.push(format!("column {} missing in candidate", col.name)),
            Some(other) => {
                if other.ty != col.ty {
                    diffs.push(format!(
                        "column {} type changed: {} -> {}",
                        col.name,
                        col.ty.tag(),
                        other.ty.tag()
                    ));
                }
            }
        }
    }
    for col in &candidate.columns {
        if baseline.column(&col.name).is_none() {
            diffs.push(format!("column {} only in candidate", col.name));
        }
    }

    let baseline_pk = baseline.pk_names();
    let candidate_pk = candidate.pk_names();
    if baseline_pk != candidate_pk {
        diffs.push(format!(
            "primary key changed: {:?} -> {:?}",
            baseline_pk, candidate_pk
        ));
    }

    diffs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Column;
    use crate::typemap::CanonicalType;

    fn table(name: &str, cols: &[(&str, CanonicalType, i32)]) -> Table {
        let mut t = Table::new(name);
        t.columns = cols
            .iter()
            .map(|(name, ty, pk)| Column {
                name: (*name).into(),
                ty: ty.clone(),
                is_nullable: *pk == 0,
                pk_ordinal: *pk,
                default: None,
            })
            .collect();
        t
    }

    #[test]
    fn test_identical_columns_produce_no_diffs() {
        let a = table(
            "person",
            &[("id", CanonicalType::Int64, 1), ("name", CanonicalType::Text, 0)],
        );
        assert!(diff_columns(&a, &a.clone()).is_empty());
    }

    #[test]
    fn test_missing_and_extra_columns_reported() {
        let a = table(
            "person",
            &[("id", CanonicalType::Int64, 1), ("name", CanonicalType::Text, 0)],
        );
        let b = table(
            "person",
            &[("id", CanonicalType::Int64, 1), ("age", CanonicalType::Int32, 0)],
        );
        let diffs = diff_columns(&a, &b);
        assert!(diffs.iter().any(|d| d.contains("name missing")));
        assert!(diffs.iter().any(|d| d.contains("age only in candidate")));
    }

    #[test]
    fn test_type_change_reported() {
        let a = table("t", &[("v", CanonicalType::Int32, 0)]);
        let b = table("t", &[("v", CanonicalType::Text, 0)]);
        let diffs = diff_columns(&a, &b);
        assert_eq!(diffs.len(), 1);
        assert!(diffs[0].contains("INTEGER -> TEXT"));
    }

    #[test]
    fn test_pk_change_reported() {
        let a = table("t", &[("id", CanonicalType::Int64, 1)]);
        let b = table("t", &[("id", CanonicalType::Int64, 0)]);
        let diffs = diff_columns(&a, &b);
        assert!(diffs.iter().any(|d| d.contains("primary key changed")));
    }
}
