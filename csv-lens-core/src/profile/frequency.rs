use super::space_saving::{sort_ranked, SketchSlot, SpaceSaving};
use csv_lens_common::{CsvLensError, FrequencyMode, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FrequencyEntry {
    pub value: String,
    pub count: u64,
    pub percentage: f64,
    /// overestimation bound, only present for sketched columns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TopValues {
    pub top_values: Vec<FrequencyEntry>,
    pub total_count: u64,
    pub approximate: bool,
}

/// How a categorical column trades exactness for memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrequencyPolicy {
    pub mode: FrequencyMode,
    pub max_distinct: Option<usize>,
    pub capacity: usize,
}

impl FrequencyPolicy {
    pub fn validate(&self, top_k: usize) -> Result<()> {
        if top_k == 0 {
            return Err(CsvLensError::Config("top_k must be at least 1".into()));
        }
        if self.max_distinct == Some(0) {
            return Err(CsvLensError::Config(
                "max_distinct must be at least 1 (leave it unset for no cap)".into(),
            ));
        }
        match self.mode {
            FrequencyMode::Exact => Ok(()),
            FrequencyMode::Approximate | FrequencyMode::Adaptive if self.capacity < top_k => {
                Err(CsvLensError::Config(format!(
                    "sketch_capacity ({}) must be >= top_k ({top_k})",
                    self.capacity
                )))
            }
            FrequencyMode::Approximate => Ok(()),
            FrequencyMode::Adaptive => match self.max_distinct {
                Some(cap) if cap >= self.capacity => Ok(()),
                Some(cap) => Err(CsvLensError::Config(format!(
                    "max_distinct ({cap}) must be >= sketch_capacity ({}) in adaptive mode",
                    self.capacity
                ))),
                None => Err(CsvLensError::Config(
                    "adaptive mode needs a max_distinct cap; use exact mode for unbounded counting"
                        .into(),
                )),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrequencyEvent {
    Counted,
    /// the exact table was just replaced by a sketch
    Degraded,
    /// exact mode passed its cap; the value was not counted
    Overflow { limit: usize },
}

#[derive(Debug, Clone)]
enum Table {
    Exact(HashMap<String, SketchSlot>),
    Sketch(SpaceSaving),
}

#[derive(Debug, Clone)]
pub struct FrequencyCounter {
    table: Table,
    total: u64,
    policy: FrequencyPolicy,
}

impl FrequencyCounter {
    pub fn new(policy: FrequencyPolicy) -> Self {
        let table = match policy.mode {
            FrequencyMode::Approximate => Table::Sketch(SpaceSaving::new(policy.capacity)),
            FrequencyMode::Exact | FrequencyMode::Adaptive => Table::Exact(HashMap::new()),
        };
        Self {
            table,
            total: 0,
            policy,
        }
    }

    pub fn is_approximate(&self) -> bool {
        matches!(self.table, Table::Sketch(_))
    }

    pub fn distinct_tracked(&self) -> usize {
        match &self.table {
            Table::Exact(map) => map.len(),
            Table::Sketch(s) => s.len(),
        }
    }

    pub fn add(&mut self, value: &str, seen_at: u64) -> FrequencyEvent {
        let map = match &mut self.table {
            Table::Sketch(sketch) => {
                sketch.add(value, seen_at);
                self.total += 1;
                return FrequencyEvent::Counted;
            }
            Table::Exact(map) => map,
        };
        if let Some(slot) = map.get_mut(value) {
            slot.count += 1;
            self.total += 1;
            return FrequencyEvent::Counted;
        }
        match self.policy.max_distinct {
            Some(limit) if map.len() >= limit => match self.policy.mode {
                FrequencyMode::Exact => FrequencyEvent::Overflow { limit },
                _ => {
                    self.degrade();
                    if let Table::Sketch(sketch) = &mut self.table {
                        sketch.add(value, seen_at);
                    }
                    self.total += 1;
                    FrequencyEvent::Degraded
                }
            },
            _ => {
                map.insert(
                    value.to_owned(),
                    SketchSlot {
                        count: 1,
                        error: 0,
                        first_seen: seen_at,
                    },
                );
                self.total += 1;
                FrequencyEvent::Counted
            }
        }
    }

    fn degrade(&mut self) {
        if let Table::Exact(map) = &mut self.table {
            let entries: Vec<(String, SketchSlot)> = std::mem::take(map).into_iter().collect();
            self.table = Table::Sketch(SpaceSaving::from_entries(self.policy.capacity, entries));
        }
    }

    /// Combines counts from another shard. Exact tables merge exactly; if
    /// either side is sketched the result is a sketch.
    pub fn merge(&mut self, other: FrequencyCounter) -> FrequencyEvent {
        self.total += other.total;
        let mut event = FrequencyEvent::Counted;
        match other.table {
            Table::Exact(theirs) => match &mut self.table {
                Table::Exact(mine) => {
                    for (value, slot) in theirs {
                        merge_slot(mine, value, slot);
                    }
                    if let Some(limit) = self.policy.max_distinct {
                        if mine.len() > limit {
                            if self.policy.mode == FrequencyMode::Exact {
                                return FrequencyEvent::Overflow { limit };
                            }
                            self.degrade();
                            event = FrequencyEvent::Degraded;
                        }
                    }
                }
                Table::Sketch(mine) => {
                    mine.merge(SpaceSaving::from_entries(
                        mine.capacity(),
                        theirs.into_iter().collect(),
                    ));
                }
            },
            Table::Sketch(theirs) => {
                if !self.is_approximate() {
                    self.degrade();
                    event = FrequencyEvent::Degraded;
                }
                if let Table::Sketch(mine) = &mut self.table {
                    mine.merge(theirs);
                }
            }
        }
        event
    }

    /// Highest counts first, ties broken by first appearance. Never padded.
    pub fn top_k(self, k: usize) -> TopValues {
        let total = self.total;
        let approximate = self.is_approximate();
        let mut entries: Vec<(String, SketchSlot)> = match self.table {
            Table::Exact(map) => map.into_iter().collect(),
            Table::Sketch(sketch) => sketch.into_entries(),
        };
        sort_ranked(&mut entries);
        let top_values = entries
            .into_iter()
            .take(k)
            .map(|(value, slot)| FrequencyEntry {
                percentage: if total > 0 {
                    slot.count as f64 / total as f64 * 100.0
                } else {
                    0.0
                },
                value,
                count: slot.count,
                error: approximate.then_some(slot.error),
            })
            .collect();
        TopValues {
            top_values,
            total_count: total,
            approximate,
        }
    }
}

fn merge_slot(map: &mut HashMap<String, SketchSlot>, value: String, theirs: SketchSlot) {
    map.entry(value)
        .and_modify(|mine| {
            mine.count += theirs.count;
            mine.error += theirs.error;
            mine.first_seen = mine.first_seen.min(theirs.first_seen);
        })
        .or_insert(theirs);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(mode: FrequencyMode, max_distinct: Option<usize>, capacity: usize) -> FrequencyPolicy {
        FrequencyPolicy {
            mode,
            max_distinct,
            capacity,
        }
    }

    fn feed(counter: &mut FrequencyCounter, values: &[&str], offset: u64) {
        for (i, v) in values.iter().enumerate() {
            counter.add(v, offset + i as u64);
        }
    }

    fn pairs(top: &TopValues) -> Vec<(&str, u64)> {
        top.top_values
            .iter()
            .map(|e| (e.value.as_str(), e.count))
            .collect()
    }

    #[test]
    fn ties_follow_first_seen_order() {
        let mut c = FrequencyCounter::new(policy(FrequencyMode::Exact, None, 0));
        feed(&mut c, &["a", "a", "b", "c"], 0);
        let top = c.top_k(2);
        assert_eq!(pairs(&top), vec![("a", 2), ("b", 1)]);
        assert_eq!(top.total_count, 4);
        assert!((top.top_values[0].percentage - 50.0).abs() < 1e-9);
        assert!(!top.approximate);
        assert_eq!(top.top_values[0].error, None);
    }

    #[test]
    fn sketch_counts_rows_sharing_a_position() {
        let mut c = FrequencyCounter::new(policy(FrequencyMode::Approximate, None, 2));
        for v in ["a", "b", "c", "a", "a", "a"] {
            c.add(v, 7);
        }
        let top = c.top_k(2);
        assert_eq!(top.total_count, 6);
        assert_eq!(top.top_values[0].value, "a");
        assert!(top.top_values[0].count >= 4);
        let counted: u64 = top.top_values.iter().map(|e| e.count).sum();
        assert_eq!(counted, 6);
    }

    #[test]
    fn fewer_distinct_than_k_is_not_padded() {
        let mut c = FrequencyCounter::new(policy(FrequencyMode::Exact, None, 0));
        feed(&mut c, &["x", "y", "x"], 0);
        assert_eq!(c.top_k(5).top_values.len(), 2);
    }

    #[test]
    fn exact_mode_overflows_at_cap() {
        let mut c = FrequencyCounter::new(policy(FrequencyMode::Exact, Some(2), 0));
        assert_eq!(c.add("a", 0), FrequencyEvent::Counted);
        assert_eq!(c.add("b", 1), FrequencyEvent::Counted);
        assert_eq!(c.add("a", 2), FrequencyEvent::Counted);
        assert_eq!(c.add("c", 3), FrequencyEvent::Overflow { limit: 2 });
    }

    #[test]
    fn adaptive_mode_degrades_to_sketch() {
        let mut c = FrequencyCounter::new(policy(FrequencyMode::Adaptive, Some(3), 2));
        feed(&mut c, &["a", "a", "b", "c"], 0);
        assert!(!c.is_approximate());
        assert_eq!(c.add("d", 10), FrequencyEvent::Degraded);
        assert!(c.is_approximate());
        assert!(c.distinct_tracked() <= 2);
        let top = c.top_k(1);
        assert!(top.approximate);
        assert_eq!(top.total_count, 5);
        assert_eq!(pairs(&top)[0].0, "a");
    }

    #[test]
    fn exact_merge_respects_first_seen_across_shards() {
        let p = policy(FrequencyMode::Exact, None, 0);
        let mut left = FrequencyCounter::new(p);
        feed(&mut left, &["b", "a"], 0);
        let mut right = FrequencyCounter::new(p);
        feed(&mut right, &["a", "b", "c"], 100);
        left.merge(right);
        let top = left.top_k(3);
        // a and b tie at 2; b appeared first
        assert_eq!(pairs(&top), vec![("b", 2), ("a", 2), ("c", 1)]);
        assert_eq!(top.total_count, 5);
    }

    #[test]
    fn exact_merge_past_cap_overflows() {
        let p = policy(FrequencyMode::Exact, Some(2), 0);
        let mut left = FrequencyCounter::new(p);
        feed(&mut left, &["a", "b"], 0);
        let mut right = FrequencyCounter::new(p);
        feed(&mut right, &["c"], 10);
        assert_eq!(left.merge(right), FrequencyEvent::Overflow { limit: 2 });
    }

    #[test]
    fn sketch_merge_into_exact_degrades() {
        let mut left = FrequencyCounter::new(policy(FrequencyMode::Adaptive, Some(10), 3));
        feed(&mut left, &["a"], 0);
        let mut right = FrequencyCounter::new(policy(FrequencyMode::Approximate, None, 3));
        feed(&mut right, &["a", "b"], 5);
        assert_eq!(left.merge(right), FrequencyEvent::Degraded);
        let top = left.top_k(3);
        assert!(top.approximate);
        assert_eq!(pairs(&top), vec![("a", 2), ("b", 1)]);
    }

    #[test]
    fn policy_validation() {
        assert!(policy(FrequencyMode::Exact, None, 0).validate(5).is_ok());
        assert!(policy(FrequencyMode::Exact, Some(0), 0).validate(5).is_err());
        assert!(policy(FrequencyMode::Approximate, None, 3).validate(5).is_err());
        assert!(policy(FrequencyMode::Adaptive, None, 10).validate(5).is_err());
        assert!(policy(FrequencyMode::Adaptive, Some(5), 10).validate(5).is_err());
        assert!(policy(FrequencyMode::Adaptive, Some(100), 10).validate(5).is_ok());
        assert!(policy(FrequencyMode::Exact, None, 0).validate(0).is_err());
    }
}
