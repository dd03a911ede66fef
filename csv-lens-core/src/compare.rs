use crate::report::{ColumnReport, ProfileReport};
use crate::schema::ColumnKind;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

// --- schema diff ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum DiffStatus {
    Added,
    Removed,
    KindChanged,
    Matching,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSchemaDiff {
    pub name: String,
    pub status: DiffStatus,
    pub left_kind: Option<ColumnKind>,
    pub right_kind: Option<ColumnKind>,
}

pub fn diff_schemas(left: &[ColumnReport], right: &[ColumnReport]) -> Vec<ColumnSchemaDiff> {
    let lmap: HashMap<&str, &ColumnReport> = left.iter().map(|c| (c.name.as_str(), c)).collect();
    let rmap: HashMap<&str, &ColumnReport> = right.iter().map(|c| (c.name.as_str(), c)).collect();
    let mut diffs = Vec::new();
    for (name, lc) in &lmap {
        let (status, right_kind) = match rmap.get(name) {
            Some(rc) if rc.kind == lc.kind => (DiffStatus::Matching, Some(rc.kind)),
            Some(rc) => (DiffStatus::KindChanged, Some(rc.kind)),
            None => (DiffStatus::Removed, None),
        };
        diffs.push(ColumnSchemaDiff {
            name: name.to_string(),
            status,
            left_kind: Some(lc.kind),
            right_kind,
        });
    }
    for (name, rc) in &rmap {
        if !lmap.contains_key(name) {
            diffs.push(ColumnSchemaDiff {
                name: name.to_string(),
                status: DiffStatus::Added,
                left_kind: None,
                right_kind: Some(rc.kind),
            });
        }
    }
    diffs.sort_by(|a, b| a.name.cmp(&b.name));
    diffs
}

// --- numeric drift ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NumericDiff {
    pub name: String,
    pub mean_delta: Option<f64>,
    pub stddev_delta: Option<f64>,
    /// mean moved by more than a tenth of the left standard deviation
    pub mean_shift_significant: bool,
}

pub fn diff_numeric(left: &[ColumnReport], right: &[ColumnReport]) -> Vec<NumericDiff> {
    let rmap: HashMap<&str, &ColumnReport> = right.iter().map(|c| (c.name.as_str(), c)).collect();
    let mut diffs = Vec::new();
    for lc in left {
        let (Some(ln), Some(rn)) = (
            lc.numeric.as_ref(),
            rmap.get(lc.name.as_str()).and_then(|rc| rc.numeric.as_ref()),
        ) else {
            continue;
        };
        let mean_delta = ln.mean.zip(rn.mean).map(|(l, r)| r - l);
        let stddev_delta = ln.stddev.zip(rn.stddev).map(|(l, r)| r - l);
        let mean_shift_significant = match (mean_delta, ln.stddev) {
            (Some(d), Some(sd)) if sd > 0.0 => d.abs() > sd * 0.10,
            (Some(d), _) => d != 0.0,
            (None, _) => false,
        };
        diffs.push(NumericDiff {
            name: lc.name.clone(),
            mean_delta,
            stddev_delta,
            mean_shift_significant,
        });
    }
    diffs
}

// --- top-k overlap ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopValuesDiff {
    pub name: String,
    /// Jaccard index of the two top-k value sets
    pub overlap: f64,
    pub only_left: Vec<String>,
    pub only_right: Vec<String>,
}

pub fn diff_top_values(left: &[ColumnReport], right: &[ColumnReport]) -> Vec<TopValuesDiff> {
    let rmap: HashMap<&str, &ColumnReport> = right.iter().map(|c| (c.name.as_str(), c)).collect();
    let mut diffs = Vec::new();
    for lc in left {
        let (Some(lt), Some(rt)) = (
            lc.top_values.as_ref(),
            rmap.get(lc.name.as_str()).and_then(|rc| rc.top_values.as_ref()),
        ) else {
            continue;
        };
        let lset: HashSet<&str> = lt.top_values.iter().map(|e| e.value.as_str()).collect();
        let rset: HashSet<&str> = rt.top_values.iter().map(|e| e.value.as_str()).collect();
        let union = lset.union(&rset).count();
        let overlap = if union == 0 {
            1.0
        } else {
            lset.intersection(&rset).count() as f64 / union as f64
        };
        // keep rank order in the listings
        let only_left = lt
            .top_values
            .iter()
            .filter(|e| !rset.contains(e.value.as_str()))
            .map(|e| e.value.clone())
            .collect();
        let only_right = rt
            .top_values
            .iter()
            .filter(|e| !lset.contains(e.value.as_str()))
            .map(|e| e.value.clone())
            .collect();
        diffs.push(TopValuesDiff {
            name: lc.name.clone(),
            overlap,
            only_left,
            only_right,
        });
    }
    diffs
}

// --- dataset comparison ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportComparison {
    pub left_rows: u64,
    pub right_rows: u64,
    pub row_delta: i64,
    pub row_delta_pct: f64,
    pub schema_diffs: Vec<ColumnSchemaDiff>,
    pub numeric_diffs: Vec<NumericDiff>,
    pub top_value_diffs: Vec<TopValuesDiff>,
}

pub fn compare_reports(left: &ProfileReport, right: &ProfileReport) -> ReportComparison {
    let row_delta = right.rows_profiled as i64 - left.rows_profiled as i64;
    let row_delta_pct = if left.rows_profiled > 0 {
        row_delta as f64 / left.rows_profiled as f64 * 100.0
    } else {
        0.0
    };
    ReportComparison {
        left_rows: left.rows_profiled,
        right_rows: right.rows_profiled,
        row_delta,
        row_delta_pct,
        schema_diffs: diff_schemas(&left.columns, &right.columns),
        numeric_diffs: diff_numeric(&left.columns, &right.columns),
        top_value_diffs: diff_top_values(&left.columns, &right.columns),
    }
}
