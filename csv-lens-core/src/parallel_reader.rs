use crate::profile::full_scan::{scan_records, ScanSettings, StopCheck};
use crate::profile::Profiler;
use csv_lens_common::{CsvLensError, Result};
use memmap2::Mmap;
use rayon::prelude::*;
use std::ops::Range;
use std::path::Path;
use tracing::info;

/// Splits `data[start..]` into at most `shards` contiguous ranges, each
/// starting at the beginning of a line. Assumes no record embeds a newline
/// inside quotes.
pub fn plan_shards(data: &[u8], start: usize, shards: usize) -> Vec<Range<usize>> {
    let len = data.len();
    if start >= len {
        return Vec::new();
    }
    let n = shards.max(1);
    let span = len - start;
    let mut bounds = vec![start];
    for i in 1..n {
        let cut = align_to_line(data, start + span * i / n);
        let last = bounds.last().copied().unwrap_or(start);
        if cut > last && cut < len {
            bounds.push(cut);
        }
    }
    bounds.push(len);
    bounds.windows(2).map(|w| w[0]..w[1]).collect()
}

fn align_to_line(data: &[u8], pos: usize) -> usize {
    if pos == 0 || data[pos - 1] == b'\n' {
        return pos;
    }
    data[pos..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(data.len(), |i| pos + i + 1)
}

/// Memory-maps `path`, profiles each shard on the rayon pool with a fork of
/// `root`, and merges the shards in file order.
pub(crate) fn profile_file_sharded(
    root: &Profiler,
    path: &Path,
    base_offset: u64,
    settings: &ScanSettings,
    stop: &StopCheck,
) -> Result<Profiler> {
    let file = std::fs::File::open(path)?;
    if file.metadata()?.len() == 0 {
        return Err(CsvLensError::EmptyInput(path.display().to_string()));
    }
    let mmap: Mmap = unsafe { Mmap::map(&file)? };
    let read = &settings.read;

    let mut header_reader = read.csv_builder(true).from_reader(&mmap[..]);
    header_reader.byte_headers()?;
    let data_start = header_reader.position().byte() as usize;

    let shards = if settings.shards == 0 {
        rayon::current_num_threads()
    } else {
        settings.shards
    };
    let ranges = plan_shards(&mmap, data_start, shards);
    let parts: Vec<Result<Profiler>> = ranges
        .par_iter()
        .map(|range| {
            let mut part = root.fork();
            let mut reader = read.csv_builder(false).from_reader(&mmap[range.clone()]);
            scan_records(&mut reader, &mut part, base_offset + range.start as u64, read, stop)?;
            Ok(part)
        })
        .collect();

    // the merge is the only point where shards meet
    let mut merged = root.fork();
    merged.add_source(path.display().to_string());
    for part in parts {
        merged.merge(part?)?;
    }
    info!(path = %path.display(), shards = ranges.len(), rows = merged.rows_read(), "sharded scan complete");
    Ok(merged)
}
