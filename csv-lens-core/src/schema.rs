use csv_lens_common::{CsvLensError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Numeric,
    Categorical,
}

impl std::fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Numeric => f.write_str("numeric"),
            Self::Categorical => f.write_str("categorical"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnDescriptor {
    pub name: String,
    pub kind: ColumnKind,
    pub position: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Schema {
    columns: Vec<ColumnDescriptor>,
}

impl Schema {
    /// Columns named in `numeric` are profiled as numeric, the rest as categorical.
    pub fn from_header(header: &[String], numeric: &[String]) -> Result<Self> {
        if let Some(missing) = numeric.iter().find(|n| !header.contains(n)) {
            return Err(CsvLensError::UnknownColumn(missing.clone()));
        }
        let columns = header
            .iter()
            .enumerate()
            .map(|(position, name)| ColumnDescriptor {
                name: name.clone(),
                kind: if numeric.contains(name) {
                    ColumnKind::Numeric
                } else {
                    ColumnKind::Categorical
                },
                position,
            })
            .collect();
        Ok(Self { columns })
    }

    /// A column is numeric when it has at least one non-empty sampled value
    /// and every non-empty sampled value parses as a finite float.
    /// Sample rows whose width differs from the header are ignored.
    pub fn infer<S: AsRef<str>>(header: &[String], sample: &[Vec<S>]) -> Self {
        let mut seen = vec![0usize; header.len()];
        let mut numeric = vec![true; header.len()];
        for row in sample.iter().filter(|r| r.len() == header.len()) {
            for (i, field) in row.iter().enumerate() {
                let field = field.as_ref().trim();
                if field.is_empty() {
                    continue;
                }
                seen[i] += 1;
                if numeric[i] && parse_numeric(field).is_none() {
                    numeric[i] = false;
                }
            }
        }
        let columns = header
            .iter()
            .enumerate()
            .map(|(position, name)| ColumnDescriptor {
                name: name.clone(),
                kind: if seen[position] > 0 && numeric[position] {
                    ColumnKind::Numeric
                } else {
                    ColumnKind::Categorical
                },
                position,
            })
            .collect();
        Self { columns }
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

/// Finite floats only; NaN and infinities count as type errors.
pub fn parse_numeric(field: &str) -> Option<f64> {
    field.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(cols: &[&str]) -> Vec<String> {
        cols.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn declared_numeric_columns() {
        let s = Schema::from_header(&header(&["Index", "Name"]), &["Index".into()]).unwrap();
        assert_eq!(s.width(), 2);
        assert_eq!(s.column("Index").unwrap().kind, ColumnKind::Numeric);
        assert_eq!(s.column("Name").unwrap().kind, ColumnKind::Categorical);
        assert_eq!(s.column("Name").unwrap().position, 1);
    }

    #[test]
    fn unknown_numeric_column_is_error() {
        let err = Schema::from_header(&header(&["a"]), &["b".into()]).unwrap_err();
        assert!(matches!(err, CsvLensError::UnknownColumn(c) if c == "b"));
    }

    #[test]
    fn infer_kinds_from_sample() {
        let sample = vec![
            vec!["1", "x", "", "2.5"],
            vec!["2", "3", "", "nan"],
            vec!["3", "y", "", "1e3"],
        ];
        let s = Schema::infer(&header(&["id", "mixed", "blank", "float"]), &sample);
        let kinds: Vec<ColumnKind> = s.columns().iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ColumnKind::Numeric,
                ColumnKind::Categorical,
                ColumnKind::Categorical,
                ColumnKind::Categorical, // "nan" is not a finite number
            ]
        );
    }

    #[test]
    fn infer_ignores_ragged_rows() {
        let sample = vec![vec!["1", "2"], vec!["oops"]];
        let s = Schema::infer(&header(&["a", "b"]), &sample);
        assert_eq!(s.column("a").unwrap().kind, ColumnKind::Numeric);
    }

    #[test]
    fn parse_numeric_trims_and_rejects_non_finite() {
        assert_eq!(parse_numeric(" 42 "), Some(42.0));
        assert_eq!(parse_numeric("inf"), None);
        assert_eq!(parse_numeric("abc"), None);
    }
}
