use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use girder_design::discover::{discover_candidate_cells, text_contains};
use girder_design::{
    populate, render_text, verify, CellAddressMap, DesignInput, DesignOutput, IdentitySpec,
    VerificationResult,
};
use girder_model::CellValue;
use girder_xlsx::{read_worksheet, XlsxPackage};

#[derive(Clone, Debug, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser)]
#[command(
    name = "workbook-audit",
    about = "Populate a bridge-design workbook template and audit its engineering identities."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Write design input/output records into a template's INSERT sheets.
    Populate(PopulateArgs),
    /// Check engineering identities in a populated workbook.
    Verify(VerifyArgs),
    /// Scan a sheet for cells whose text matches a keyword.
    ///
    /// Exploratory helper for building cell maps; the authoritative binding
    /// of fields to coordinates is always the map passed to `populate`.
    Discover(DiscoverArgs),
}

#[derive(Parser)]
pub struct PopulateArgs {
    /// Template workbook (.xlsx).
    #[arg(long)]
    pub template: PathBuf,

    /// Design input record (JSON).
    #[arg(long)]
    pub input: PathBuf,

    /// Design output record (JSON).
    #[arg(long)]
    pub design: PathBuf,

    /// Destination for the populated workbook.
    #[arg(long)]
    pub out: PathBuf,

    /// Cell address map (JSON); defaults to the built-in template map.
    #[arg(long)]
    pub map: Option<PathBuf>,
}

#[derive(Parser)]
pub struct VerifyArgs {
    /// Populated workbook (.xlsx). Formula cells must carry cached values,
    /// i.e. the file was saved by a spreadsheet application after population.
    pub workbook: PathBuf,

    /// Identity specs (JSON list); defaults to the built-in deck-level check.
    #[arg(long)]
    pub identities: Option<PathBuf>,

    /// Override the tolerance of every loaded identity.
    #[arg(long)]
    pub tolerance: Option<f64>,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Exit 0 even when identities fail or error.
    #[arg(long)]
    pub no_fail: bool,
}

#[derive(Parser)]
pub struct DiscoverArgs {
    /// Workbook to scan (.xlsx).
    pub workbook: PathBuf,

    /// Sheet to scan (tab name).
    #[arg(long)]
    pub sheet: String,

    /// Case-insensitive substring to look for in cell text.
    #[arg(long)]
    pub contains: String,
}

#[derive(Debug, Serialize)]
struct JsonCounts {
    passed: usize,
    failed: usize,
    errored: usize,
}

#[derive(Debug, Serialize)]
struct JsonReport<'a> {
    workbook: &'a str,
    counts: JsonCounts,
    results: &'a [VerificationResult],
}

pub fn run() -> Result<()> {
    run_with_args(Args::parse())
}

pub fn run_with_args(args: Args) -> Result<()> {
    match args.command {
        Command::Populate(args) => run_populate(args),
        Command::Verify(args) => run_verify(args),
        Command::Discover(args) => run_discover(args),
    }
}

fn run_populate(args: PopulateArgs) -> Result<()> {
    let map = match args.map.as_deref() {
        Some(path) => load_json::<CellAddressMap>(path)?,
        None => CellAddressMap::bridge_template(),
    };
    let input: DesignInput = load_json(&args.input)?;
    let output: DesignOutput = load_json(&args.design)?;

    let template = std::fs::read(&args.template)
        .with_context(|| format!("read template {}", args.template.display()))?;
    let mut pkg = XlsxPackage::from_bytes(&template)
        .with_context(|| format!("open template {}", args.template.display()))?;

    populate(&mut pkg, &input, &output, &map)
        .with_context(|| format!("populate template {}", args.template.display()))?;

    let bytes = pkg.write_to_bytes().context("serialize populated workbook")?;
    std::fs::write(&args.out, bytes)
        .with_context(|| format!("write output {}", args.out.display()))?;

    println!(
        "Populated {} cells across {} sheets -> {}",
        map.len(),
        map.sheet_names().len(),
        args.out.display()
    );
    Ok(())
}

fn run_verify(args: VerifyArgs) -> Result<()> {
    let mut specs = match args.identities.as_deref() {
        Some(path) => load_json::<Vec<IdentitySpec>>(path)?,
        None => vec![IdentitySpec::deck_level()],
    };
    if let Some(tolerance) = args.tolerance {
        for spec in &mut specs {
            spec.tolerance = tolerance;
        }
    }

    let bytes = std::fs::read(&args.workbook)
        .with_context(|| format!("read workbook {}", args.workbook.display()))?;
    let pkg = XlsxPackage::from_bytes(&bytes)
        .with_context(|| format!("open workbook {}", args.workbook.display()))?;

    let results = verify(&pkg, &specs);
    let all_passed = results.iter().all(VerificationResult::passed);

    match args.format {
        OutputFormat::Text => {
            println!("Workbook audit: {}", args.workbook.display());
            println!();
            print!("{}", render_text(&results));
        }
        OutputFormat::Json => {
            let workbook = args.workbook.to_string_lossy().into_owned();
            let counts = JsonCounts {
                passed: results.iter().filter(|r| r.passed()).count(),
                failed: results
                    .iter()
                    .filter(|r| matches!(r.outcome, girder_design::Outcome::Fail { .. }))
                    .count(),
                errored: results
                    .iter()
                    .filter(|r| matches!(r.outcome, girder_design::Outcome::Error { .. }))
                    .count(),
            };
            let report = JsonReport {
                workbook: &workbook,
                counts,
                results: &results,
            };
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            serde_json::to_writer(&mut handle, &report)?;
            handle.write_all(b"\n")?;
        }
    }

    if !all_passed && !args.no_fail {
        std::process::exit(1);
    }
    Ok(())
}

fn run_discover(args: DiscoverArgs) -> Result<()> {
    let bytes = std::fs::read(&args.workbook)
        .with_context(|| format!("read workbook {}", args.workbook.display()))?;
    let pkg = XlsxPackage::from_bytes(&bytes)
        .with_context(|| format!("open workbook {}", args.workbook.display()))?;
    let ws = read_worksheet(&pkg, &args.sheet)
        .with_context(|| format!("read sheet {:?}", args.sheet))?;

    let hits = discover_candidate_cells(&ws, text_contains(&args.contains));
    for at in &hits {
        let text = match ws.cell(*at).and_then(|c| c.literal()) {
            Some(CellValue::String(s)) => s.clone(),
            Some(CellValue::Number(n)) => n.to_string(),
            _ => String::new(),
        };
        println!("{at}\t{text}");
    }
    println!("{} candidate cells for {:?}", hits.len(), args.contains);
    Ok(())
}

fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parse {}", path.display()))
}
