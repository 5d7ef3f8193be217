//! epi-variants - weekly variant time series from sequencing metadata
//!
//! **Usage:**
//! ```bash
//! epi-variants analyse [-i gisaid/metadata.tsv] [-o output] [--country ARG [--region "Buenos Aires"]]
//! epi-variants correlate [-o output]
//! epi-variants fake [-n 100] [-s 10] > metadata.tsv
//! ```

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use epi_variants::config::DEFAULT_VARIANTS;
use epi_variants::dominance::DEFAULT_THRESHOLD;
use epi_variants::{
    correlation, synthetic, table, AnalysisConfig, CountryReferenceMap, InputPaths,
    OutputLayout, ReferenceData, SurveillanceModel,
};

#[derive(Parser, Debug)]
#[command(name = "epi-variants")]
#[command(about = "Weekly per-country variant counts from sequencing metadata")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Filter, aggregate and report on a metadata file
    Analyse(AnalyseArgs),
    /// Correlate per-country subset tables against their index table
    Correlate(CorrelateArgs),
    /// Generate synthetic metadata records (tab-separated)
    Fake(FakeArgs),
}

#[derive(Args, Debug)]
struct AnalyseArgs {
    /// Input metadata file
    #[arg(short, long, default_value = "gisaid/metadata.tsv")]
    input: PathBuf,

    /// Output folder
    #[arg(short, long, default_value = "output")]
    output: PathBuf,

    /// Country name → ISO3 mapping (JSON)
    #[arg(long, default_value = "data/countries.json", env = "EPI_VARIANTS_COUNTRIES")]
    countries: PathBuf,

    /// Per-country gender vocabulary (JSON)
    #[arg(long, default_value = "data/gender.json", env = "EPI_VARIANTS_GENDERS")]
    genders: PathBuf,

    /// Vaccination reports to merge into the all-countries weekly table
    #[arg(long, value_name = "FILE")]
    vaccinations: Option<PathBuf>,

    /// ISO3 code of country to limit results to
    #[arg(long)]
    country: Option<String>,

    /// Comma-separated regions to filter for, requires --country
    #[arg(long)]
    region: Option<String>,

    /// Drop records without a valid age, requires --country
    #[arg(long)]
    filter_age: bool,

    /// Map genders to canonical labels and drop unmapped ones, requires --country
    #[arg(long)]
    filter_gender: bool,

    /// Stratify the weekly table by age group, requires --country
    #[arg(long)]
    group_by_age: bool,

    /// Stratify the weekly table by gender, requires --country
    #[arg(long)]
    group_by_gender: bool,

    /// Tracked variants
    #[arg(long, value_delimiter = ',', default_values_t = DEFAULT_VARIANTS.map(String::from))]
    variants: Vec<String>,

    /// Share of sequenced cases at which a variant counts as dominant
    #[arg(long, default_value_t = DEFAULT_THRESHOLD)]
    threshold: f64,
}

#[derive(Args, Debug)]
struct CorrelateArgs {
    /// Output folder holding per-country tables
    #[arg(short, long, default_value = "output")]
    output: PathBuf,

    /// Country name → ISO3 mapping (JSON)
    #[arg(long, default_value = "data/countries.json", env = "EPI_VARIANTS_COUNTRIES")]
    countries: PathBuf,

    /// Tracked variants
    #[arg(long, value_delimiter = ',', default_values_t = DEFAULT_VARIANTS.map(String::from))]
    variants: Vec<String>,
}

#[derive(Args, Debug)]
struct FakeArgs {
    /// How many entries to generate
    #[arg(short, long, default_value_t = synthetic::DEFAULT_COUNT)]
    number: usize,

    /// Random number seed to use
    #[arg(short, long, default_value_t = synthetic::DEFAULT_SEED)]
    seed: u64,

    /// Write to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn analyse(args: AnalyseArgs) -> Result<()> {
    let config = AnalysisConfig {
        country: args.country,
        regions: args.region.as_deref().map(AnalysisConfig::parse_regions),
        filter_age: args.filter_age,
        filter_gender: args.filter_gender,
        group_by_age: args.group_by_age,
        group_by_gender: args.group_by_gender,
        variants: args.variants,
        threshold: args.threshold,
    };
    config.validate()?;

    let inputs = InputPaths {
        metadata: args.input,
        countries: args.countries,
        genders: Some(args.genders),
        vaccinations: args.vaccinations,
    };
    let reference = ReferenceData::load(&inputs.countries, inputs.genders.as_deref())
        .context("loading reference data")?;

    let model = SurveillanceModel::new(reference, config);
    let summary = model.run(&inputs, &OutputLayout::new(&args.output))?;
    info!(
        "Done: {} records, {} weekly rows, {} dominance windows",
        summary.records,
        summary.weekly.height(),
        summary.dominance.len()
    );
    Ok(())
}

fn correlate(args: CorrelateArgs) -> Result<()> {
    let countries = CountryReferenceMap::from_json_file(&args.countries)?;
    let report = correlation::correlation_report(&args.output, &countries.codes(), &args.variants)?;
    let path = args.output.join("correlations.json");
    correlation::write_report(&report, &path)?;
    info!("Wrote correlations for {} countries > {}", report.len(), path.display());
    Ok(())
}

fn fake(args: FakeArgs) -> Result<()> {
    let today = chrono::Utc::now().date_naive();
    let mut df = synthetic::generate(args.number, args.seed, today)?;
    match args.output {
        Some(path) => {
            let file = std::fs::File::create(&path)
                .with_context(|| format!("creating {}", path.display()))?;
            table::write_tsv(&mut df, file)?;
        }
        None => {
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            table::write_tsv(&mut df, &mut lock)?;
            lock.flush()?;
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match Cli::parse().command {
        Command::Analyse(args) => analyse(args),
        Command::Correlate(args) => correlate(args),
        Command::Fake(args) => fake(args),
    }
}
