use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use csv_lens_common::{Config, ExportConfig};
use csv_lens_core::{
    compare_reports, export_comparison_json, export_csv, export_json, print_summary,
    profile_paths, profile_reader, read_preview, resolve_paths, write_csv, FrequencyMode,
    ProfileReport, ReportComparison, ScanSettings,
};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

fn parse_mode(s: &str) -> Result<FrequencyMode, String> {
    s.parse().map_err(|e| format!("{e}"))
}

#[derive(Parser)]
#[command(name = "csv-lens", version, about = "Single-pass column profiler for delimited files")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Debug, Default)]
struct InputArgs {
    /// field delimiter (single ASCII character)
    #[arg(long)]
    delimiter: Option<char>,
    /// WHATWG encoding label, e.g. utf-8 or windows-1252
    #[arg(long)]
    encoding: Option<String>,
    /// numeric columns; other columns are categorical. Omit to infer
    #[arg(long, value_delimiter = ',')]
    numeric: Option<Vec<String>>,
    /// rows sampled for type inference
    #[arg(long)]
    infer_rows: Option<usize>,
}

#[derive(clap::Args, Debug, Default)]
struct ProfileArgs {
    #[command(flatten)]
    input: InputArgs,
    #[arg(long)]
    top_k: Option<usize>,
    /// exact, adaptive or approximate
    #[arg(long, value_parser = parse_mode)]
    mode: Option<FrequencyMode>,
    /// distinct values kept exactly per column (0 = no cap)
    #[arg(long)]
    max_distinct: Option<usize>,
    /// Space-Saving counters per column
    #[arg(long)]
    capacity: Option<usize>,
    /// 1 = sequential, 0 = one per CPU
    #[arg(long)]
    shards: Option<usize>,
    /// stop after this many seconds and report partial figures
    #[arg(long)]
    timeout: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Profile a file, directory, glob pattern, or "-" for stdin
    Profile {
        path: String,
        #[command(flatten)]
        args: ProfileArgs,
        /// text, json or csv
        #[arg(long)]
        format: Option<String>,
        /// output file ("-" for stdout); json and csv default to the
        /// configured output_dir
        #[arg(long)]
        output: Option<String>,
    },
    /// Show the header and the kind each column would be profiled as
    Schema {
        path: String,
        #[command(flatten)]
        input: InputArgs,
    },
    /// Profile two inputs and report drift between them
    Compare {
        left: String,
        right: String,
        #[command(flatten)]
        args: ProfileArgs,
        /// text or json
        #[arg(long, default_value = "text")]
        format: String,
        /// output file ("-" for stdout); json defaults to the configured
        /// output_dir
        #[arg(long)]
        output: Option<String>,
    },
    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Print shell completions
    Completions { shell: Shell },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write the current settings (defaults plus any existing file) to disk
    Init {
        /// overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the config path and effective settings
    Show,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("csv_lens=info,csv_lens_core=info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match Config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!(error = %e, path = %Config::active_path().display(), "ignoring unreadable config");
            Config::default()
        }
    };
    match cli.command {
        Commands::Profile { path, args, format, output } => run_profile(&path, args, format, output, config)?,
        Commands::Schema { path, input } => run_schema(&path, input, config)?,
        Commands::Compare { left, right, args, format, output } => run_compare(&left, &right, args, &format, output, config)?,
        Commands::Config { action } => run_config(action, config)?,
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "csv-lens", &mut std::io::stdout());
        }
    }
    Ok(())
}

fn apply_input(config: &mut Config, input: InputArgs) {
    if let Some(d) = input.delimiter {
        config.input.delimiter = d;
    }
    if let Some(e) = input.encoding {
        config.input.encoding = e;
    }
    if let Some(n) = input.numeric {
        config.input.numeric_columns = n;
    }
    if let Some(r) = input.infer_rows {
        config.input.infer_sample_rows = r;
    }
}

fn apply_profile(config: &mut Config, args: ProfileArgs) {
    apply_input(config, args.input);
    let p = &mut config.profiling;
    if let Some(k) = args.top_k {
        p.top_k = k;
    }
    if let Some(m) = args.mode {
        p.frequency_mode = m;
    }
    if let Some(d) = args.max_distinct {
        p.max_distinct = (d > 0).then_some(d);
    }
    if let Some(c) = args.capacity {
        p.sketch_capacity = c;
    }
    if let Some(s) = args.shards {
        p.shards = s;
    }
    if args.timeout.is_some() {
        p.timeout_secs = args.timeout;
    }
}

fn settings_with_ctrlc(config: &Config) -> anyhow::Result<ScanSettings> {
    let settings = ScanSettings::from_config(config)?;
    let cancel = settings.cancel.clone();
    ctrlc::set_handler(move || cancel.cancel())?;
    Ok(settings)
}

fn rp(input: &str) -> anyhow::Result<Vec<PathBuf>> {
    let paths = resolve_paths(input)?;
    if paths.is_empty() {
        anyhow::bail!("No delimited files found: {input}");
    }
    Ok(paths)
}

fn profile_input(settings: &ScanSettings, input: &str) -> anyhow::Result<ProfileReport> {
    let report = if input == "-" {
        profile_reader(settings, "stdin", std::io::stdin().lock())?
    } else {
        let paths = rp(input)?;
        debug!(files = paths.len(), "resolved input");
        profile_paths(settings, &paths)?
    };
    if report.truncated {
        warn!("profile is partial: the scan was interrupted");
    }
    Ok(report)
}

/// Where a document goes: `--output` wins, "-" means stdout, and file
/// formats fall back to `<output_dir>/<default_name>`.
fn output_target(export: &ExportConfig, output: Option<String>, format: &str, default_name: &str) -> Option<PathBuf> {
    match output.as_deref() {
        Some("-") => None,
        Some(o) => Some(PathBuf::from(o)),
        None if format == "text" => None,
        None => Some(Path::new(&export.output_dir).join(default_name)),
    }
}

fn run_profile(input: &str, args: ProfileArgs, format: Option<String>, output: Option<String>, mut config: Config) -> anyhow::Result<()> {
    apply_profile(&mut config, args);
    let settings = settings_with_ctrlc(&config)?;
    let report = profile_input(&settings, input)?;
    let format = format.unwrap_or_else(|| config.export.format.clone());
    let out_path = output_target(&config.export, output, &format, &format!("profile.{format}"));
    if let Some(parent) = out_path.as_deref().and_then(Path::parent) {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    match (format.as_str(), out_path) {
        ("text", None) => print_summary(&report)?,
        ("text", Some(p)) => {
            let mut file = std::fs::File::create(&p)?;
            csv_lens_core::write_summary(&mut file, &report)?;
            println!("Summary saved to {}", p.display());
        }
        ("json", None) => println!("{}", serde_json::to_string_pretty(&report)?),
        ("json", Some(p)) => {
            export_json(&p, &report)?;
            println!("Exported to {}", p.display());
        }
        ("csv", None) => write_csv(std::io::stdout().lock(), &report)?,
        ("csv", Some(p)) => {
            export_csv(&p, &report)?;
            println!("Exported to {}", p.display());
        }
        (other, _) => anyhow::bail!("Unknown format: {other} (use text, json or csv)"),
    }
    Ok(())
}

fn run_schema(input: &str, args: InputArgs, mut config: Config) -> anyhow::Result<()> {
    apply_input(&mut config, args);
    let settings = ScanSettings::from_config(&config)?;
    let paths = rp(input)?;
    let read = &settings.read;
    let rows = if read.infers_schema() { read.infer_sample_rows } else { 0 };
    let (header, sample) = read_preview(&paths[0], read, rows)?;
    let schema = read.resolve_schema(&header, &sample)?;
    println!("{:<6} {:<32} {}", "pos", "column", "kind");
    for col in schema.columns() {
        println!("{:<6} {:<32} {}", col.position, col.name, col.kind);
    }
    Ok(())
}

fn print_comparison(cmp: &ReportComparison) {
    println!("{:<16} {} -> {} ({:+}, {:+.2}%)", "Rows:", cmp.left_rows, cmp.right_rows, cmp.row_delta, cmp.row_delta_pct);
    for d in &cmp.schema_diffs {
        println!("{:<16} {:<24} {:?}", "Column:", d.name, d.status);
    }
    for d in &cmp.numeric_diffs {
        let mean = d.mean_delta.map_or("-".into(), |v| format!("{v:+.4}"));
        let std = d.stddev_delta.map_or("-".into(), |v| format!("{v:+.4}"));
        let flag = if d.mean_shift_significant { " *" } else { "" };
        println!("{:<16} {:<24} mean {mean} std {std}{flag}", "Numeric:", d.name);
    }
    for d in &cmp.top_value_diffs {
        println!("{:<16} {:<24} overlap {:.2}", "Top values:", d.name, d.overlap);
    }
}

fn run_compare(left: &str, right: &str, args: ProfileArgs, format: &str, output: Option<String>, mut config: Config) -> anyhow::Result<()> {
    apply_profile(&mut config, args);
    let settings = settings_with_ctrlc(&config)?;
    let left_report = profile_input(&settings, left)?;
    let right_report = profile_input(&settings, right)?;
    let comparison = compare_reports(&left_report, &right_report);
    match (format, output_target(&config.export, output, format, "comparison.json")) {
        ("text", None) => print_comparison(&comparison),
        ("json", None) => println!("{}", serde_json::to_string_pretty(&comparison)?),
        ("text" | "json", Some(p)) => {
            if let Some(parent) = p.parent().filter(|d| !d.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            export_comparison_json(&p, &comparison)?;
            println!("Comparison saved to {}", p.display());
        }
        (other, _) => anyhow::bail!("Unknown format: {other} (use text or json)"),
    }
    Ok(())
}

fn run_config(action: ConfigAction, config: Config) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init { force } => {
            let path = Config::active_path();
            if path.exists() && !force {
                anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
            }
            let path = config.save()?;
            println!("Config written to {}", path.display());
        }
        ConfigAction::Show => {
            println!("# {}", Config::active_path().display());
            print!("{}", config.to_toml()?);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_override_config() {
        let cli = Cli::try_parse_from([
            "csv-lens", "profile", "data.csv", "--numeric", "Index,Score", "--mode", "approx",
            "--capacity", "64", "--max-distinct", "0", "--delimiter", ";", "--shards", "4",
        ])
        .unwrap();
        let Commands::Profile { args, .. } = cli.command else {
            panic!("expected profile command");
        };
        let mut config = Config::default();
        apply_profile(&mut config, args);
        assert_eq!(config.input.numeric_columns, vec!["Index", "Score"]);
        assert_eq!(config.input.delimiter, ';');
        assert_eq!(config.profiling.frequency_mode, FrequencyMode::Approximate);
        assert_eq!(config.profiling.sketch_capacity, 64);
        assert_eq!(config.profiling.max_distinct, None);
        assert_eq!(config.profiling.shards, 4);
    }

    #[test]
    fn bad_mode_is_rejected_at_parse_time() {
        assert!(Cli::try_parse_from(["csv-lens", "profile", "x.csv", "--mode", "fuzzy"]).is_err());
    }

    #[test]
    fn file_formats_default_to_output_dir() {
        let export = ExportConfig {
            format: "text".into(),
            output_dir: "reports".into(),
        };
        assert_eq!(
            output_target(&export, None, "json", "profile.json"),
            Some(Path::new("reports").join("profile.json"))
        );
        assert_eq!(output_target(&export, None, "text", "profile.text"), None);
        assert_eq!(output_target(&export, Some("-".into()), "csv", "profile.csv"), None);
        assert_eq!(
            output_target(&export, Some("out/x.csv".into()), "csv", "profile.csv"),
            Some(PathBuf::from("out/x.csv"))
        );
    }

    #[test]
    fn config_subcommands_parse() {
        let cli = Cli::try_parse_from(["csv-lens", "config", "init", "--force"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Config { action: ConfigAction::Init { force: true } }
        ));
        assert!(Cli::try_parse_from(["csv-lens", "config", "show"]).is_ok());
    }
}
