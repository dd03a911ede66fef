pub mod compare;
pub mod export;
pub mod parallel_reader;
pub mod profile;
pub mod reader;
pub mod report;
pub mod scanner;
pub mod schema;

pub use compare::{compare_reports, ReportComparison};
pub use csv_lens_common::{Config, CsvLensError, FrequencyMode, Result};
pub use export::{export_comparison_json, export_csv, export_json, print_summary, write_csv, write_summary};
pub use parallel_reader::plan_shards;
pub use profile::{
    profile_path, profile_paths, profile_reader, profile_rows, CancelToken, FrequencyPolicy,
    NumericSummary, ProfileOptions, Profiler, RowOutcome, ScanSettings, TopValues,
};
pub use reader::{read_header, read_preview, ReadOptions};
pub use report::{ColumnReport, ProfileReport};
pub use scanner::resolve_paths;
pub use schema::{ColumnDescriptor, ColumnKind, Schema};
