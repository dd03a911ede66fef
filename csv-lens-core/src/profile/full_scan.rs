use super::profiler::{ProfileOptions, Profiler};
use crate::parallel_reader::profile_file_sharded;
use crate::reader::{read_header, read_preview, ReadOptions};
use crate::report::ProfileReport;
use csv::ByteRecord;
use csv_lens_common::{Config, CsvLensError, Result};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// rows between cancellation/timeout checks
const CHECK_EVERY: u64 = 1024;

/// Shared flag for stopping a scan early, e.g. from a Ctrl-C handler.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct StopCheck {
    cancel: CancelToken,
    deadline: Option<Instant>,
}

impl StopCheck {
    pub(crate) fn should_stop(&self) -> bool {
        self.cancel.is_cancelled() || self.deadline.is_some_and(|dl| Instant::now() >= dl)
    }
}

#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub read: ReadOptions,
    pub profile: ProfileOptions,
    /// 1 = sequential, 0 = one shard per rayon thread
    pub shards: usize,
    pub timeout: Option<Duration>,
    pub cancel: CancelToken,
}

impl ScanSettings {
    pub fn from_config(cfg: &Config) -> Result<Self> {
        Ok(Self {
            read: ReadOptions::from_config(&cfg.input)?,
            profile: ProfileOptions::from_config(&cfg.profiling)?,
            shards: cfg.profiling.shards,
            timeout: cfg.profiling.timeout_secs.map(Duration::from_secs),
            cancel: CancelToken::new(),
        })
    }

    fn stop_check(&self) -> StopCheck {
        StopCheck {
            cancel: self.cancel.clone(),
            deadline: self.timeout.map(|t| Instant::now() + t),
        }
    }
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            read: ReadOptions::default(),
            profile: ProfileOptions::default(),
            shards: 1,
            timeout: None,
            cancel: CancelToken::new(),
        }
    }
}

/// Streams records into `profiler` until EOF or a stop request.
/// `base_offset` is added to each record's byte position.
pub(crate) fn scan_records<R: Read>(
    reader: &mut csv::Reader<R>,
    profiler: &mut Profiler,
    base_offset: u64,
    read: &ReadOptions,
    stop: &StopCheck,
) -> Result<()> {
    let mut record = ByteRecord::new();
    let mut since_check = 0u64;
    loop {
        since_check += 1;
        if since_check >= CHECK_EVERY {
            since_check = 0;
            if stop.should_stop() {
                warn!(rows = profiler.rows_read(), "scan stopped early, results are partial");
                profiler.mark_truncated();
                return Ok(());
            }
        }
        match reader.read_byte_record(&mut record) {
            Ok(true) => {}
            Ok(false) => return Ok(()),
            Err(e) if e.is_io_error() => return Err(e.into()),
            Err(e) => {
                debug!(error = %e, "unparseable record");
                profiler.record_parse_error();
                continue;
            }
        }
        let seen_at = base_offset + record.position().map_or(0, |p| p.byte());
        feed_record(profiler, &record, seen_at, read)?;
    }
}

fn feed_record(profiler: &mut Profiler, record: &ByteRecord, seen_at: u64, read: &ReadOptions) -> Result<()> {
    match read.decode_record(record) {
        Some(fields) => {
            profiler.update(fields.as_slice(), seen_at)?;
        }
        None => {
            debug!(seen_at, encoding = read.encoding.name(), "undecodable record");
            profiler.record_parse_error();
        }
    }
    Ok(())
}

/// Profiles any byte stream (stdin, sockets). The inference sample is
/// buffered and replayed, so the stream is still read once.
pub fn profile_reader<R: Read>(settings: &ScanSettings, source: &str, input: R) -> Result<ProfileReport> {
    let read = &settings.read;
    let stop = settings.stop_check();
    let mut reader = read.csv_builder(true).from_reader(input);
    let header = read.decode_header(reader.byte_headers()?)?;

    let mut buffered: Vec<ByteRecord> = Vec::new();
    let mut sample: Vec<Vec<String>> = Vec::new();
    if read.infers_schema() {
        let mut record = ByteRecord::new();
        while buffered.len() < read.infer_sample_rows && reader.read_byte_record(&mut record)? {
            if let Some(fields) = read.decode_record(&record) {
                sample.push(fields.into_iter().map(|f| f.into_owned()).collect());
            }
            buffered.push(record.clone());
        }
    }
    let schema = read.resolve_schema(&header, &sample)?;
    let mut profiler = Profiler::new(schema, settings.profile)?;
    profiler.add_source(source);
    for record in &buffered {
        let seen_at = record.position().map_or(0, |p| p.byte());
        feed_record(&mut profiler, record, seen_at, read)?;
    }
    scan_records(&mut reader, &mut profiler, 0, read, &stop)?;
    info!(source, rows = profiler.rows_read(), "profile complete");
    Ok(profiler.finish())
}

pub fn profile_path(settings: &ScanSettings, path: &Path) -> Result<ProfileReport> {
    profile_paths(settings, &[path.to_path_buf()])
}

/// Profiles several files with identical headers as one dataset. Byte
/// offsets continue across files so first-seen order spans the whole input.
pub fn profile_paths(settings: &ScanSettings, paths: &[PathBuf]) -> Result<ProfileReport> {
    let first = paths
        .first()
        .ok_or_else(|| CsvLensError::Other("no input files".into()))?;
    let read = &settings.read;
    let sample_rows = if read.infers_schema() {
        read.infer_sample_rows
    } else {
        0
    };
    let (header, sample) = read_preview(first, read, sample_rows)?;
    let schema = read.resolve_schema(&header, &sample)?;
    debug!(columns = schema.width(), "schema resolved");
    let mut root = Profiler::new(schema, settings.profile)?;
    let stop = settings.stop_check();

    let mut base_offset = 0u64;
    for path in paths {
        if stop.should_stop() {
            root.mark_truncated();
            break;
        }
        if path != first && read_header(path, read)? != header {
            return Err(CsvLensError::HeaderMismatch {
                path: path.display().to_string(),
            });
        }
        let part = if settings.shards == 1 {
            profile_file(&root, path, base_offset, settings, &stop)?
        } else {
            profile_file_sharded(&root, path, base_offset, settings, &stop)?
        };
        root.merge(part)?;
        base_offset += std::fs::metadata(path)?.len();
    }
    info!(files = paths.len(), rows = root.rows_read(), "profile complete");
    Ok(root.finish())
}

fn profile_file(
    root: &Profiler,
    path: &Path,
    base_offset: u64,
    settings: &ScanSettings,
    stop: &StopCheck,
) -> Result<Profiler> {
    let file = std::fs::File::open(path)?;
    let mut reader = settings.read.csv_builder(true).from_reader(file);
    reader.byte_headers()?;
    let mut part = root.fork();
    part.add_source(path.display().to_string());
    scan_records(&mut reader, &mut part, base_offset, &settings.read, stop)?;
    debug!(path = %path.display(), rows = part.rows_read(), "file scanned");
    Ok(part)
}
