use super::cardinality::HllEstimator;
use super::frequency::{FrequencyCounter, FrequencyEvent, FrequencyPolicy};
use super::numeric::NumericAccumulator;
use crate::report::{ColumnReport, ProfileReport};
use crate::schema::{parse_numeric, ColumnKind, Schema};
use csv_lens_common::{CsvLensError, ProfilingConfig, Result};
use tracing::{debug, warn};

/// Validated knobs for the per-column accumulators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfileOptions {
    pub top_k: usize,
    pub frequency: FrequencyPolicy,
}

impl ProfileOptions {
    pub fn new(top_k: usize, frequency: FrequencyPolicy) -> Result<Self> {
        frequency.validate(top_k)?;
        Ok(Self { top_k, frequency })
    }

    pub fn from_config(cfg: &ProfilingConfig) -> Result<Self> {
        Self::new(
            cfg.top_k,
            FrequencyPolicy {
                mode: cfg.frequency_mode,
                max_distinct: cfg.max_distinct,
                capacity: cfg.sketch_capacity,
            },
        )
    }
}

impl Default for ProfileOptions {
    fn default() -> Self {
        let cfg = ProfilingConfig::default();
        Self {
            top_k: cfg.top_k,
            frequency: FrequencyPolicy {
                mode: cfg.frequency_mode,
                max_distinct: cfg.max_distinct,
                capacity: cfg.sketch_capacity,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOutcome {
    Profiled,
    /// wrong field count or undecodable bytes; nothing was accumulated
    Malformed,
}

#[derive(Debug)]
enum Accumulator {
    Numeric(NumericAccumulator),
    Categorical(FrequencyCounter),
}

#[derive(Debug)]
struct ColumnState {
    missing: u64,
    type_errors: u64,
    distinct: HllEstimator,
    acc: Accumulator,
}

/// Single-pass accumulator state for one input, or one shard of it.
///
/// Rows are fed through [`Profiler::update`]; [`Profiler::finish`] consumes
/// the profiler, so a finalized profile can never receive more rows.
#[derive(Debug)]
pub struct Profiler {
    schema: Schema,
    options: ProfileOptions,
    columns: Vec<ColumnState>,
    sources: Vec<String>,
    rows_read: u64,
    parse_errors: u64,
    truncated: bool,
}

impl Profiler {
    pub fn new(schema: Schema, options: ProfileOptions) -> Result<Self> {
        options.frequency.validate(options.top_k)?;
        let columns = schema
            .columns()
            .iter()
            .map(|c| ColumnState::new(c.kind, HllEstimator::new(), options))
            .collect();
        Ok(Self {
            schema,
            options,
            columns,
            sources: Vec::new(),
            rows_read: 0,
            parse_errors: 0,
            truncated: false,
        })
    }

    /// Empty profiler for another shard; its state can be merged back.
    pub fn fork(&self) -> Self {
        let columns = self
            .schema
            .columns()
            .iter()
            .zip(&self.columns)
            .map(|(c, state)| ColumnState::new(c.kind, state.distinct.fork(), self.options))
            .collect();
        Self {
            schema: self.schema.clone(),
            options: self.options,
            columns,
            sources: Vec::new(),
            rows_read: 0,
            parse_errors: 0,
            truncated: false,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    pub fn add_source(&mut self, source: impl Into<String>) {
        self.sources.push(source.into());
    }

    pub fn mark_truncated(&mut self) {
        self.truncated = true;
    }

    /// Counts a row that could not be tokenised or decoded.
    pub fn record_parse_error(&mut self) {
        self.rows_read += 1;
        self.parse_errors += 1;
    }

    /// Feeds one data row. `seen_at` orders first appearances for top-k
    /// tie-breaking and must increase along the input.
    pub fn update<S: AsRef<str>>(&mut self, fields: &[S], seen_at: u64) -> Result<RowOutcome> {
        if fields.len() != self.schema.width() {
            debug!(
                seen_at,
                expected = self.schema.width(),
                found = fields.len(),
                "skipping malformed row"
            );
            self.record_parse_error();
            return Ok(RowOutcome::Malformed);
        }
        self.rows_read += 1;
        for ((desc, state), field) in self
            .schema
            .columns()
            .iter()
            .zip(self.columns.iter_mut())
            .zip(fields)
        {
            let value = field.as_ref();
            if value.trim().is_empty() {
                state.missing += 1;
                continue;
            }
            match &mut state.acc {
                Accumulator::Numeric(acc) => match parse_numeric(value) {
                    Some(x) => {
                        acc.add(x);
                        state.distinct.add(value);
                    }
                    None => state.type_errors += 1,
                },
                Accumulator::Categorical(counter) => {
                    state.distinct.add(value);
                    match counter.add(value, seen_at) {
                        FrequencyEvent::Counted => {}
                        FrequencyEvent::Degraded => warn!(
                            column = %desc.name,
                            capacity = self.options.frequency.capacity,
                            "distinct values passed the cap, top-k is now approximate"
                        ),
                        FrequencyEvent::Overflow { limit } => {
                            return Err(CsvLensError::CardinalityExceeded {
                                column: desc.name.clone(),
                                limit,
                            })
                        }
                    }
                }
            }
        }
        Ok(RowOutcome::Profiled)
    }

    /// Folds another shard into this one. Both must share a schema.
    pub fn merge(&mut self, other: Profiler) -> Result<()> {
        if self.schema != other.schema {
            return Err(CsvLensError::SchemaMismatch);
        }
        self.rows_read += other.rows_read;
        self.parse_errors += other.parse_errors;
        self.truncated |= other.truncated;
        self.sources.extend(other.sources);
        for ((desc, mine), theirs) in self
            .schema
            .columns()
            .iter()
            .zip(self.columns.iter_mut())
            .zip(other.columns)
        {
            mine.missing += theirs.missing;
            mine.type_errors += theirs.type_errors;
            mine.distinct.merge(&theirs.distinct);
            match (&mut mine.acc, theirs.acc) {
                (Accumulator::Numeric(a), Accumulator::Numeric(b)) => a.merge(b),
                (Accumulator::Categorical(a), Accumulator::Categorical(b)) => match a.merge(b) {
                    FrequencyEvent::Counted => {}
                    FrequencyEvent::Degraded => warn!(
                        column = %desc.name,
                        "merged shards passed the distinct cap, top-k is now approximate"
                    ),
                    FrequencyEvent::Overflow { limit } => {
                        return Err(CsvLensError::CardinalityExceeded {
                            column: desc.name.clone(),
                            limit,
                        })
                    }
                },
                _ => return Err(CsvLensError::SchemaMismatch),
            }
        }
        Ok(())
    }

    pub fn finish(self) -> ProfileReport {
        let top_k = self.options.top_k;
        let columns: Vec<ColumnReport> = self
            .schema
            .columns()
            .iter()
            .zip(self.columns)
            .map(|(desc, state)| {
                let distinct_estimate = state.distinct.estimate();
                let (numeric, top_values) = match state.acc {
                    Accumulator::Numeric(acc) => (Some(acc.finish()), None),
                    Accumulator::Categorical(counter) => (None, Some(counter.top_k(top_k))),
                };
                ColumnReport {
                    name: desc.name.clone(),
                    kind: desc.kind,
                    position: desc.position,
                    missing: state.missing,
                    type_errors: state.type_errors,
                    distinct_estimate,
                    numeric,
                    top_values,
                }
            })
            .collect();
        ProfileReport {
            sources: self.sources,
            rows_read: self.rows_read,
            rows_profiled: self.rows_read - self.parse_errors,
            parse_errors: self.parse_errors,
            type_errors: columns.iter().map(|c| c.type_errors).sum(),
            truncated: self.truncated,
            columns,
        }
    }
}

impl ColumnState {
    fn new(kind: ColumnKind, distinct: HllEstimator, options: ProfileOptions) -> Self {
        let acc = match kind {
            ColumnKind::Numeric => Accumulator::Numeric(NumericAccumulator::new()),
            ColumnKind::Categorical => {
                Accumulator::Categorical(FrequencyCounter::new(options.frequency))
            }
        };
        Self {
            missing: 0,
            type_errors: 0,
            distinct,
            acc,
        }
    }
}

/// Profiles in-memory rows; `seen_at` is the row ordinal.
pub fn profile_rows<I, R, S>(schema: Schema, rows: I, options: ProfileOptions) -> Result<ProfileReport>
where
    I: IntoIterator<Item = R>,
    R: AsRef<[S]>,
    S: AsRef<str>,
{
    let mut profiler = Profiler::new(schema, options)?;
    for (i, row) in rows.into_iter().enumerate() {
        profiler.update(row.as_ref(), i as u64)?;
    }
    Ok(profiler.finish())
}
