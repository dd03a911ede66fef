use crate::{CsvLensError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrequencyMode {
    /// exact counts; fails when a column passes `max_distinct`
    Exact,
    /// exact counts until `max_distinct`, then a Space-Saving sketch
    #[default]
    Adaptive,
    /// Space-Saving sketch from the first row
    Approximate,
}

impl std::str::FromStr for FrequencyMode {
    type Err = CsvLensError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "exact" => Ok(Self::Exact),
            "adaptive" => Ok(Self::Adaptive),
            "approximate" | "approx" => Ok(Self::Approximate),
            other => Err(CsvLensError::Config(format!(
                "unknown frequency mode {other:?} (use exact, adaptive or approximate)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    #[serde(default = "default_quote")]
    pub quote: char,
    #[serde(default = "default_encoding")]
    pub encoding: String,
    /// columns profiled as numeric; empty means infer from a sample
    #[serde(default)]
    pub numeric_columns: Vec<String>,
    #[serde(default = "default_infer_rows")]
    pub infer_sample_rows: usize,
}

fn default_delimiter() -> char {
    ','
}
fn default_quote() -> char {
    '"'
}
fn default_encoding() -> String {
    "utf-8".into()
}
fn default_infer_rows() -> usize {
    1000
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
            quote: default_quote(),
            encoding: default_encoding(),
            numeric_columns: Vec::new(),
            infer_sample_rows: default_infer_rows(),
        }
    }
}

impl InputConfig {
    pub fn delimiter_byte(&self) -> Result<u8> {
        ascii_byte("delimiter", self.delimiter)
    }

    pub fn quote_byte(&self) -> Result<u8> {
        ascii_byte("quote", self.quote)
    }
}

fn ascii_byte(what: &str, c: char) -> Result<u8> {
    if c.is_ascii() && c != '\n' && c != '\r' {
        Ok(c as u8)
    } else {
        Err(CsvLensError::Config(format!(
            "{what} must be a single ASCII character other than a line break, got {c:?}"
        )))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfilingConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default)]
    pub frequency_mode: FrequencyMode,
    #[serde(default = "default_max_distinct")]
    pub max_distinct: Option<usize>,
    #[serde(default = "default_capacity")]
    pub sketch_capacity: usize,
    /// 1 = sequential scan, 0 = one shard per rayon thread
    #[serde(default = "default_shards")]
    pub shards: usize,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_top_k() -> usize {
    5
}
fn default_max_distinct() -> Option<usize> {
    Some(100_000)
}
fn default_capacity() -> usize {
    1000
}
fn default_shards() -> usize {
    1
}

impl Default for ProfilingConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            frequency_mode: FrequencyMode::default(),
            max_distinct: default_max_distinct(),
            sketch_capacity: default_capacity(),
            shards: default_shards(),
            timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

fn default_format() -> String {
    "text".into()
}
fn default_output_dir() -> String {
    ".".into()
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
            output_dir: default_output_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub profiling: ProfilingConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

impl Config {
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("csv-lens")
            .join("config.toml")
    }

    /// Path actually used by [`Config::load`] and [`Config::save`]:
    /// `$CSV_LENS_CONFIG` when set, otherwise [`Config::config_path`].
    pub fn active_path() -> PathBuf {
        std::env::var_os("CSV_LENS_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(Self::config_path)
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::active_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| CsvLensError::Config(e.to_string()))
    }

    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::active_path();
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| CsvLensError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let cfg = Config::from_toml("").unwrap();
        assert_eq!(cfg.profiling.top_k, 5);
        assert_eq!(cfg.profiling.frequency_mode, FrequencyMode::Adaptive);
        assert_eq!(cfg.input.delimiter, ',');
        assert_eq!(cfg.export.format, "text");
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = Config::from_toml(
            "[input]\ndelimiter = ';'\nnumeric_columns = [\"Index\"]\n\n[profiling]\nfrequency_mode = \"exact\"\nmax_distinct = 10\n",
        )
        .unwrap();
        assert_eq!(cfg.input.delimiter_byte().unwrap(), b';');
        assert_eq!(cfg.input.numeric_columns, vec!["Index".to_string()]);
        assert_eq!(cfg.input.encoding, "utf-8");
        assert_eq!(cfg.profiling.frequency_mode, FrequencyMode::Exact);
        assert_eq!(cfg.profiling.max_distinct, Some(10));
        assert_eq!(cfg.profiling.sketch_capacity, 1000);
    }

    #[test]
    fn bad_toml_is_config_error() {
        assert!(matches!(
            Config::from_toml("[profiling]\ntop_k = \"five\""),
            Err(CsvLensError::Config(_))
        ));
    }

    #[test]
    fn non_ascii_delimiter_rejected() {
        let cfg = InputConfig { delimiter: '§', ..Default::default() };
        assert!(cfg.delimiter_byte().is_err());
    }

    #[test]
    fn mode_parses_case_insensitively() {
        assert_eq!("APPROX".parse::<FrequencyMode>().unwrap(), FrequencyMode::Approximate);
        assert!("fuzzy".parse::<FrequencyMode>().is_err());
    }

    #[test]
    fn saved_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut cfg = Config::default();
        cfg.profiling.top_k = 9;
        cfg.profiling.frequency_mode = FrequencyMode::Exact;
        cfg.export.output_dir = "reports".into();
        cfg.save_to(&path).unwrap();
        let back = Config::load_from(&path).unwrap();
        assert_eq!(back.profiling.top_k, 9);
        assert_eq!(back.profiling.frequency_mode, FrequencyMode::Exact);
        assert_eq!(back.export.output_dir, "reports");
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.export.output_dir, ".");
    }
}
