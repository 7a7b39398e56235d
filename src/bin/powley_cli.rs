use clap::{Parser, Subcommand, ValueEnum};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::process;

use powley_engine::constants::{
    BAND_FAST_ABOVE, BAND_SLOW_BELOW, BORE_CAPACITY_PLOT_HISTORICAL, CHARGE_BARREL_EXPONENT, CHARGE_COEFFICIENT,
    CHARGE_VOLUME_EXPONENT,
};
use powley_engine::ingest::{read_cartridges, read_propellants, write_predictions, write_propellant_table};
use powley_engine::{
    render_rc_sd_chart, BatchPredictions, BurnBand, CartridgeRecord, ChargePredictor, CliOverrides, EngineConfig,
    LoadQuery, MissingBaEffPolicy, PropellantCatalog, Recommendation, Recommender, Result, SectionalDensityFormula,
    ValidationReport,
};

#[derive(Parser)]
#[command(name = "powley-cli")]
#[command(version)]
#[command(about = "Cartridge load analysis: charge prediction, model validation and propellant selection", long_about = None)]
struct Cli {
    /// Engine configuration file (TOML); defaults to $POWLEY_CONFIG
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging on stderr
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Bore capacity constant (gr H2O per cubic inch)
    #[arg(long, global = true)]
    bore_constant: Option<f64>,

    /// Sectional density definition
    #[arg(long, global = true)]
    sd_formula: Option<SdFormulaArg>,

    /// Handling of propellants without a Ba_eff
    #[arg(long, global = true)]
    missing_ba_eff: Option<MissingBaEffArg>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Predict charge mass for every load in a cartridge table
    Predict {
        /// Cartridge CSV
        input: PathBuf,

        /// Also write the predictions as CSV to this path
        #[arg(short = 'o', long)]
        out: Option<PathBuf>,

        /// Output format
        #[arg(short = 'f', long, default_value = "table")]
        format: OutputFormat,
    },

    /// Score the charge model against measured loads (one report per file)
    Validate {
        /// Cartridge CSV files
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Output format
        #[arg(short = 'f', long, default_value = "table")]
        format: ReportFormat,
    },

    /// Recommend propellants for a load
    Recommend {
        /// Groove diameter (in)
        #[arg(long)]
        groove_dia: f64,

        /// Case capacity (gr H2O)
        #[arg(long)]
        case_vol: f64,

        /// Barrel length (in)
        #[arg(long)]
        barrel_length: f64,

        /// Bullet mass (gr)
        #[arg(long)]
        bullet_mass: f64,

        /// Cartridge name
        #[arg(long, default_value = "Custom")]
        name: String,

        /// Propellant CSV; the calibrated table is used when omitted
        #[arg(long)]
        propellants: Option<PathBuf>,

        /// Reference cartridge CSV for the nearest-cartridge lookup
        #[arg(long)]
        reference: Option<PathBuf>,

        /// Number of propellants to list
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Draw the RC vs SD chart
        #[arg(long)]
        chart: bool,

        /// Save a text summary to this path
        #[arg(long)]
        summary: Option<PathBuf>,

        /// Output format
        #[arg(short = 'f', long, default_value = "table")]
        format: ReportFormat,
    },

    /// List propellants with their Ba_eff and burn band
    Catalog {
        /// Propellant CSV; the calibrated table is used when omitted
        #[arg(long)]
        propellants: Option<PathBuf>,

        /// Also write the table (with Ba_eff) as CSV to this path
        #[arg(short = 'o', long)]
        out: Option<PathBuf>,

        /// Output format
        #[arg(short = 'f', long, default_value = "table")]
        format: OutputFormat,
    },

    /// Display engine constants and the configuration in force
    Info {
        /// Output format
        #[arg(short = 'f', long, default_value = "table")]
        format: ReportFormat,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ReportFormat {
    Table,
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SdFormulaArg {
    Dimensional,
    MassProxy,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum MissingBaEffArg {
    Exclude,
    ImputeMean,
}

impl From<SdFormulaArg> for SectionalDensityFormula {
    fn from(arg: SdFormulaArg) -> Self {
        match arg {
            SdFormulaArg::Dimensional => SectionalDensityFormula::Dimensional,
            SdFormulaArg::MassProxy => SectionalDensityFormula::MassProxy,
        }
    }
}

impl From<MissingBaEffArg> for MissingBaEffPolicy {
    fn from(arg: MissingBaEffArg) -> Self {
        match arg {
            MissingBaEffArg::Exclude => MissingBaEffPolicy::Exclude,
            MissingBaEffArg::ImputeMean => MissingBaEffPolicy::ImputeMean,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    powley_engine::logging::init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let top_k = match &cli.command {
        Commands::Recommend { top_k, .. } => *top_k,
        _ => None,
    };
    let overrides = CliOverrides {
        top_k,
        bore_capacity_constant: cli.bore_constant,
        sectional_density: cli.sd_formula.map(Into::into),
        missing_ba_eff: cli.missing_ba_eff.map(Into::into),
    };
    let config = EngineConfig::load(cli.config.as_deref(), Some(&overrides))?;

    match cli.command {
        Commands::Predict { input, out, format } => {
            let records = read_cartridges(&input)?;
            let batch = ChargePredictor::default().predict_batch(&records);
            if let Some(path) = out {
                write_predictions(std::fs::File::create(&path)?, &batch.predictions)?;
            }
            display_predictions(&batch, format)
        }
        Commands::Validate { files, format } => run_validate(&files, format),
        Commands::Recommend {
            groove_dia,
            case_vol,
            barrel_length,
            bullet_mass,
            name,
            propellants,
            reference,
            top_k: _,
            chart,
            summary,
            format,
        } => {
            let catalog = load_catalog(propellants.as_deref(), &config)?;
            let reference: Vec<CartridgeRecord> = match reference {
                Some(path) => read_cartridges(&path)?,
                None => Vec::new(),
            };
            let query = LoadQuery { cartridge: name, groove_dia, case_vol, barrel_length, bullet_mass };
            let recommendation = Recommender::new(&config, &catalog, &reference)?.recommend(&query)?;

            if let Some(path) = summary {
                std::fs::write(&path, recommendation.to_string())?;
                tracing::debug!(path = %path.display(), "summary saved");
            }
            display_recommendation(&recommendation, &config, chart, format)
        }
        Commands::Catalog { propellants, out, format } => {
            let catalog = load_catalog(propellants.as_deref(), &config)?;
            if let Some(path) = out {
                write_propellant_table(std::fs::File::create(&path)?, &catalog)?;
            }
            display_catalog(&catalog, format)
        }
        Commands::Info { format } => display_info(&config, format),
    }
}

fn load_catalog(path: Option<&Path>, config: &EngineConfig) -> Result<PropellantCatalog> {
    match path {
        Some(p) => PropellantCatalog::from_config(read_propellants(p)?, config),
        None => Ok(PropellantCatalog::from_overrides(&config.ba_eff_overrides)),
    }
}

fn run_validate(files: &[PathBuf], format: ReportFormat) -> Result<()> {
    let predictor = ChargePredictor::default();
    let reports: Vec<(String, Result<ValidationReport>)> = files
        .par_iter()
        .map(|path| {
            let source = path.display().to_string();
            let report = read_cartridges(path).and_then(|records| ValidationReport::build(&source, &records, &predictor));
            (source, report)
        })
        .collect();

    let mut failed = 0;
    let mut ok = Vec::new();
    for (source, report) in reports {
        match report {
            Ok(r) => ok.push(r),
            Err(e) => {
                eprintln!("{}: {}", source, e);
                failed += 1;
            }
        }
    }

    match format {
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&ok)?),
        ReportFormat::Table => ok.iter().for_each(display_validation_table),
    }

    if failed > 0 {
        return Err(format!("{} of {} file(s) could not be validated", failed, files.len()).into());
    }
    Ok(())
}

fn display_predictions(batch: &BatchPredictions, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(batch)?);
        }
        OutputFormat::Csv => {
            write_predictions(std::io::stdout(), &batch.predictions)?;
        }
        OutputFormat::Table => {
            println!("╔════════════════════════════════════════════════════════════════════╗");
            println!("║                        CHARGE PREDICTIONS                          ║");
            println!("╠════════════════════════════════════════════════════════════════════╣");
            println!("║ {:<22} {:>8} {:>8} {:>8} {:>8} {:>8} ║", "Cartridge", "Vol", "Barrel", "Pred", "Actual", "Diff");
            println!("╟────────────────────────────────────────────────────────────────────╢");
            for p in &batch.predictions {
                println!(
                    "║ {:<22} {:>8.2} {:>8.2} {:>8.2} {:>8.2} {:>8.2} ║",
                    truncate(&p.cartridge, 22),
                    p.eff_case_vol,
                    p.eff_barrel_length,
                    p.predicted_charge,
                    p.actual_charge,
                    p.difference
                );
            }
            println!("╚════════════════════════════════════════════════════════════════════╝");
            if !batch.failures.is_empty() {
                println!("\nSkipped {} record(s):", batch.failures.len());
                for f in &batch.failures {
                    println!("  row {} ({}): {}", f.index + 1, f.cartridge, f.reason);
                }
            }
        }
    }
    Ok(())
}

fn display_validation_table(report: &ValidationReport) {
    let m = &report.metrics;
    println!("╔════════════════════════════════════════╗");
    println!("║         MODEL VALIDATION               ║");
    println!("╠════════════════════════════════════════╣");
    println!("║ Source: {:<30} ║", truncate(&report.source, 30));
    println!("║ Records:           {:>8}            ║", report.records);
    println!("║ Predicted:         {:>8}            ║", m.count);
    println!("║ MAE:               {:>8.3} gr         ║", m.mae);
    println!("║ RMSE:              {:>8.3} gr         ║", m.rmse);
    println!("║ Mean Difference:   {:>8.3} gr         ║", m.mean_difference);
    match m.r_squared {
        Some(r2) => println!("║ R²:                {:>8.4}            ║", r2),
        None => println!("║ R²:                 undefined           ║"),
    }
    if let Some(r) = report.velocity_barrel_correlation {
        println!("║ Vel/Barrel Corr:   {:>8.4}            ║", r);
    }
    println!("╚════════════════════════════════════════╝");

    if !report.muzzle_velocity_outliers.is_empty() {
        println!("\nMuzzle velocity outliers:");
        for o in &report.muzzle_velocity_outliers {
            println!("  {:<24} {:>8.1} fps", o.cartridge, o.value);
        }
    }
    if !report.failures.is_empty() {
        println!("\nSkipped {} record(s):", report.failures.len());
        for f in &report.failures {
            println!("  row {} ({}): {}", f.index + 1, f.cartridge, f.reason);
        }
    }
    println!();
}

fn display_recommendation(
    rec: &Recommendation,
    config: &EngineConfig,
    chart: bool,
    format: ReportFormat,
) -> Result<()> {
    if let ReportFormat::Json = format {
        println!("{}", serde_json::to_string_pretty(rec)?);
        return Ok(());
    }

    println!("╔════════════════════════════════════════╗");
    println!("║        LOAD RECOMMENDATION             ║");
    println!("╠════════════════════════════════════════╣");
    println!("║ Cartridge: {:<27} ║", truncate(&rec.query.cartridge, 27));
    println!("║ Eff Case Vol:      {:>8.2} gr H2O     ║", rec.eff_case_vol);
    println!("║ Eff Barrel Length: {:>8.2} in         ║", rec.eff_barrel_length);
    println!("║ Predicted Charge:  {:>8.2} gr         ║", rec.predicted_charge);
    println!("║ Relative Capacity: {:>8.3}            ║", rec.relative_capacity);
    match rec.sd_formula {
        SectionalDensityFormula::Dimensional => {
            println!("║ Sectional Density: {:>8.3} lb/in²     ║", rec.sectional_density)
        }
        SectionalDensityFormula::MassProxy => {
            println!("║ Sectional Density: {:>8.1} gr         ║", rec.sectional_density)
        }
    }
    if let Some(n) = &rec.nearest {
        println!("║ Closest: {:<29} ║", truncate(&n.cartridge, 29));
    }
    println!("║ Ideal Ba_eff:      {:>8.3} {:<10} ║", rec.ideal_ba_eff, rec.ideal_band.label());
    println!("╠════════════════════════════════════════╣");
    println!("║ #  Propellant      Ba_eff  Band        ║");
    println!("╟────────────────────────────────────────╢");
    for s in &rec.suggestions {
        println!("║ {:<2} {:<14} {:>7.3}  {:<11} ║", s.rank, truncate(&s.name, 14), s.ba_eff, s.band.label());
    }
    println!("╚════════════════════════════════════════╝");

    if !rec.excluded.is_empty() {
        println!("Excluded (no Ba_eff): {}", rec.excluded.join(", "));
    }
    if !rec.imputed.is_empty() {
        println!("Imputed (catalog mean): {}", rec.imputed.join(", "));
    }
    if chart {
        println!();
        print!("{}", render_rc_sd_chart(rec.relative_capacity, rec.sectional_density, &config.chart, rec.sd_formula));
    }
    Ok(())
}

fn display_catalog(catalog: &PropellantCatalog, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(catalog.entries())?),
        OutputFormat::Csv => write_propellant_table(std::io::stdout(), catalog)?,
        OutputFormat::Table => {
            println!("╔════════════════════════════════════════╗");
            println!("║         PROPELLANT CATALOG             ║");
            println!("╠════════════════════════════════════════╣");
            println!("║ Propellant      Ba_eff  Band   Source  ║");
            println!("╟────────────────────────────────────────╢");
            for e in catalog.entries() {
                let source = e.source.map(|s| format!("{:?}", s)).unwrap_or_else(|| "-".to_string());
                match e.ba_eff {
                    Some(v) => println!(
                        "║ {:<14} {:>7.3}  {:<6} {:<8}║",
                        truncate(&e.name, 14),
                        v,
                        BurnBand::classify(v).label(),
                        truncate(&source, 8)
                    ),
                    None => println!("║ {:<14} {:>7}  {:<6} {:<8}║", truncate(&e.name, 14), "n/a", "-", "-"),
                }
            }
            println!("╚════════════════════════════════════════╝");
        }
    }
    Ok(())
}

fn display_info(config: &EngineConfig, format: ReportFormat) -> Result<()> {
    if let ReportFormat::Json = format {
        println!("{}", serde_json::to_string_pretty(config)?);
        return Ok(());
    }

    println!("╔════════════════════════════════════════╗");
    info_row(&format!("     POWLEY ENGINE v{}", env!("CARGO_PKG_VERSION")));
    println!("╠════════════════════════════════════════╣");
    info_row("Charge model:");
    info_row(&format!(
        "  {:.2} · vol^{:.2} · barrel^{:.2}",
        CHARGE_COEFFICIENT, CHARGE_VOLUME_EXPONENT, CHARGE_BARREL_EXPONENT
    ));
    info_row(&format!("Bore constant:     {:>8.1} gr/in³", config.bore_capacity_constant));
    info_row(&format!("  (plot scripts:   {:>8.1})", BORE_CAPACITY_PLOT_HISTORICAL));
    info_row(&format!("SD formula:        {:?}", config.sectional_density));
    info_row(&format!("OAL offset:        {:>8.2} in", config.cartridge_oal_offset));
    info_row(&format!("Top k:             {:>8}", config.top_k));
    info_row(&format!("Missing Ba_eff:    {:?}", config.missing_ba_eff));
    info_row(&format!("Bands: Slow < {:.2} ≤ Medium", BAND_SLOW_BELOW));
    info_row(&format!("       Medium ≤ {:.2} < Fast", BAND_FAST_ABOVE));
    info_row(&format!("Calibrated propellants: {:>3}", config.ba_eff_overrides.len()));
    println!("╚════════════════════════════════════════╝");
    Ok(())
}

/// One line of the `info` box, padded to the frame width
fn info_row(text: &str) {
    println!("║ {:<38} ║", truncate(text, 38));
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        s.chars().take(width).collect()
    }
}
