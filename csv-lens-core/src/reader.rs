use crate::schema::Schema;
use csv::ByteRecord;
use csv_lens_common::{CsvLensError, InputConfig, Result};
use encoding_rs::Encoding;
use std::borrow::Cow;
use std::path::Path;

/// How raw bytes become header names and field values.
#[derive(Debug, Clone)]
pub struct ReadOptions {
    pub delimiter: u8,
    pub quote: u8,
    pub encoding: &'static Encoding,
    /// declared numeric columns; empty means infer from a sample
    pub numeric_columns: Vec<String>,
    pub infer_sample_rows: usize,
}

impl ReadOptions {
    pub fn from_config(cfg: &InputConfig) -> Result<Self> {
        let encoding = Encoding::for_label(cfg.encoding.trim().as_bytes())
            .ok_or_else(|| CsvLensError::Encoding(cfg.encoding.clone()))?;
        // the tokenizer works on bytes, so delimiters must mean the same in every encoding
        if !encoding.is_ascii_compatible() {
            return Err(CsvLensError::Encoding(format!(
                "{} (only ASCII-compatible encodings are supported)",
                encoding.name()
            )));
        }
        Ok(Self {
            delimiter: cfg.delimiter_byte()?,
            quote: cfg.quote_byte()?,
            encoding,
            numeric_columns: cfg.numeric_columns.clone(),
            infer_sample_rows: cfg.infer_sample_rows,
        })
    }

    pub fn infers_schema(&self) -> bool {
        self.numeric_columns.is_empty()
    }

    pub(crate) fn csv_builder(&self, has_headers: bool) -> csv::ReaderBuilder {
        let mut builder = csv::ReaderBuilder::new();
        builder
            .has_headers(has_headers)
            .flexible(true) // ragged rows are counted, not fatal
            .delimiter(self.delimiter)
            .quote(self.quote);
        builder
    }

    /// `None` when any field is not valid in the configured encoding.
    pub(crate) fn decode_record<'a>(&self, record: &'a ByteRecord) -> Option<Vec<Cow<'a, str>>> {
        record
            .iter()
            .map(|field| {
                self.encoding
                    .decode_without_bom_handling_and_without_replacement(field)
            })
            .collect()
    }

    pub(crate) fn decode_header(&self, record: &ByteRecord) -> Result<Vec<String>> {
        if record.is_empty() {
            return Err(CsvLensError::EmptyInput("missing header row".into()));
        }
        let mut names: Vec<String> = self
            .decode_record(record)
            .ok_or_else(|| {
                CsvLensError::Encoding(format!("header is not valid {}", self.encoding.name()))
            })?
            .into_iter()
            .map(|f| f.trim().to_string())
            .collect();
        if let Some(first) = names.first_mut() {
            if let Some(stripped) = first.strip_prefix('\u{feff}') {
                *first = stripped.to_string();
            }
        }
        Ok(names)
    }

    pub fn resolve_schema(&self, header: &[String], sample: &[Vec<String>]) -> Result<Schema> {
        if self.infers_schema() {
            Ok(Schema::infer(header, sample))
        } else {
            Schema::from_header(header, &self.numeric_columns)
        }
    }
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            quote: b'"',
            encoding: encoding_rs::UTF_8,
            numeric_columns: Vec::new(),
            infer_sample_rows: 1000,
        }
    }
}

/// Header plus up to `rows` decodable data rows from the start of a file.
pub fn read_preview(path: &Path, read: &ReadOptions, rows: usize) -> Result<(Vec<String>, Vec<Vec<String>>)> {
    let file = std::fs::File::open(path)?;
    let mut reader = read.csv_builder(true).from_reader(file);
    let header = read.decode_header(reader.byte_headers()?)?;
    let mut sample = Vec::with_capacity(rows.min(1024));
    let mut record = ByteRecord::new();
    while sample.len() < rows && reader.read_byte_record(&mut record)? {
        if let Some(fields) = read.decode_record(&record) {
            sample.push(fields.into_iter().map(Cow::into_owned).collect());
        }
    }
    Ok((header, sample))
}

pub fn read_header(path: &Path, read: &ReadOptions) -> Result<Vec<String>> {
    read_preview(path, read, 0).map(|(header, _)| header)
}
