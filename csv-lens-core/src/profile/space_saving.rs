use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SketchSlot {
    pub count: u64,
    /// upper bound on how much `count` overestimates the true frequency
    pub error: u64,
    pub first_seen: u64,
}

/// Space-Saving heavy-hitters summary with a fixed number of counters.
///
/// When full, a new value replaces the counter with the smallest count and
/// inherits that count as its error bound. Among equal counts the most
/// recently first-seen value is replaced first, so earlier values survive
/// ties. The value itself completes the index key, so positions may repeat.
#[derive(Debug, Clone)]
pub(crate) struct SpaceSaving {
    capacity: usize,
    slots: HashMap<String, SketchSlot>,
    order: BTreeSet<(u64, Reverse<u64>, String)>,
}

impl SpaceSaving {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            slots: HashMap::with_capacity(capacity),
            order: BTreeSet::new(),
        }
    }

    /// Seeds a sketch from exact counts, keeping the `capacity` best entries.
    pub fn from_entries(capacity: usize, entries: Vec<(String, SketchSlot)>) -> Self {
        let mut sketch = Self::new(capacity);
        let mut entries = entries;
        sort_ranked(&mut entries);
        entries.truncate(sketch.capacity);
        for (value, slot) in entries {
            sketch.insert(value, slot);
        }
        sketch
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    fn insert(&mut self, value: String, slot: SketchSlot) {
        self.order
            .insert((slot.count, Reverse(slot.first_seen), value.clone()));
        self.slots.insert(value, slot);
    }

    pub fn add(&mut self, value: &str, seen_at: u64) {
        if let Some(slot) = self.slots.get_mut(value) {
            let mut key = (slot.count, Reverse(slot.first_seen), value.to_owned());
            self.order.remove(&key);
            slot.count += 1;
            key.0 = slot.count;
            self.order.insert(key);
            return;
        }
        if self.slots.len() < self.capacity {
            self.insert(
                value.to_owned(),
                SketchSlot {
                    count: 1,
                    error: 0,
                    first_seen: seen_at,
                },
            );
            return;
        }
        if let Some((min_count, _, victim)) = self.order.pop_first() {
            self.slots.remove(&victim);
            self.insert(
                value.to_owned(),
                SketchSlot {
                    count: min_count + 1,
                    error: min_count,
                    first_seen: seen_at,
                },
            );
        }
    }

    /// Sums matching counters, then keeps the `capacity` highest.
    pub fn merge(&mut self, other: SpaceSaving) {
        let mut combined: HashMap<String, SketchSlot> = std::mem::take(&mut self.slots);
        for (value, theirs) in other.slots {
            combined
                .entry(value)
                .and_modify(|mine| {
                    mine.count += theirs.count;
                    mine.error += theirs.error;
                    mine.first_seen = mine.first_seen.min(theirs.first_seen);
                })
                .or_insert(theirs);
        }
        let capacity = self.capacity.max(other.capacity);
        *self = Self::from_entries(capacity, combined.into_iter().collect());
    }

    pub fn into_entries(self) -> Vec<(String, SketchSlot)> {
        self.slots.into_iter().collect()
    }
}

/// Count descending, then first-seen ascending, then value.
pub(crate) fn sort_ranked(entries: &mut [(String, SketchSlot)]) {
    entries.sort_by(|a, b| {
        b.1.count
            .cmp(&a.1.count)
            .then(a.1.first_seen.cmp(&b.1.first_seen))
            .then_with(|| a.0.cmp(&b.0))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(sketch: SpaceSaving) -> Vec<(String, u64)> {
        let mut e = sketch.into_entries();
        sort_ranked(&mut e);
        e.into_iter().map(|(v, s)| (v, s.count)).collect()
    }

    #[test]
    fn exact_while_under_capacity() {
        let mut s = SpaceSaving::new(4);
        for (i, v) in ["a", "b", "a", "c", "a", "b"].iter().enumerate() {
            s.add(v, i as u64);
        }
        assert_eq!(
            counts(s),
            vec![("a".into(), 3), ("b".into(), 2), ("c".into(), 1)]
        );
    }

    #[test]
    fn evicts_latest_minimum_and_inherits_error() {
        let mut s = SpaceSaving::new(2);
        s.add("a", 0);
        s.add("a", 1);
        s.add("b", 2);
        s.add("c", 3); // replaces b (count 1)
        assert_eq!(s.len(), 2);
        let mut e = s.into_entries();
        sort_ranked(&mut e);
        assert_eq!(e[0].0, "a");
        assert_eq!(e[1].0, "c");
        assert_eq!(e[1].1.count, 2);
        assert_eq!(e[1].1.error, 1);
    }

    #[test]
    fn heavy_hitter_survives_unique_stream() {
        let mut s = SpaceSaving::new(10);
        let mut seq = 0u64;
        for i in 0..10_000 {
            s.add("hot", seq);
            seq += 1;
            s.add(&format!("id-{i}"), seq);
            seq += 1;
        }
        let top = counts(s);
        assert_eq!(top[0].0, "hot");
        assert!(top[0].1 >= 10_000);
    }

    #[test]
    fn merge_sums_and_truncates() {
        let mut a = SpaceSaving::new(2);
        a.add("x", 0);
        a.add("y", 1);
        let mut b = SpaceSaving::new(2);
        b.add("y", 10);
        b.add("z", 11);
        a.merge(b);
        let top = counts(a);
        assert_eq!(top, vec![("y".into(), 2), ("x".into(), 1)]);
    }

    #[test]
    fn repeated_positions_keep_every_counter() {
        let mut s = SpaceSaving::new(2);
        for v in ["a", "b", "c", "a", "a", "a"] {
            s.add(v, 7);
        }
        assert_eq!(s.len(), 2);
        assert_eq!(s.order.len(), 2);
        let mut e = s.into_entries();
        sort_ranked(&mut e);
        let total: u64 = e.iter().map(|(_, slot)| slot.count).sum();
        assert_eq!(total, 6);
        assert_eq!(e[0].0, "a");
        assert!(e[0].1.count >= 4);
    }
}
