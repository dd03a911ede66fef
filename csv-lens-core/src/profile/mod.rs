pub mod cardinality;
pub mod frequency;
pub mod full_scan;
pub mod numeric;
pub mod profiler;
mod space_saving;

pub use cardinality::HllEstimator;
pub use frequency::{FrequencyCounter, FrequencyEntry, FrequencyEvent, FrequencyPolicy, TopValues};
pub use full_scan::{profile_path, profile_paths, profile_reader, CancelToken, ScanSettings};
pub use numeric::{NumericAccumulator, NumericSummary};
pub use profiler::{profile_rows, ProfileOptions, Profiler, RowOutcome};
