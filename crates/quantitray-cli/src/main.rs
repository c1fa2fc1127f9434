//! quantitray CLI: well counting and MPN estimation for Quanti-Tray photos.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};
use quantitray::{
    overlay, AnalyzeConfig, Analyzer, ImageOutcome, ImageSource, MpnTable, RawImage,
    RectifiedTray, ReferenceData, TrayAnalysis, TrayObserver, WellLayout, WellRole,
};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "tif", "tiff", "bmp"];

#[derive(Parser)]
#[command(name = "quantitray")]
#[command(about = "Count positive wells on Quanti-Tray photos and look up the MPN")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    reference: ReferenceArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a single photograph.
    Analyze(AnalyzeArgs),

    /// Analyze every image in a directory.
    Batch(BatchArgs),

    /// Print the well layout in use.
    LayoutInfo,

    /// Look up the MPN for a pair of positive well counts.
    Mpn {
        /// Positive large wells (including the overflow well).
        #[arg(long)]
        large: u32,
        /// Positive small wells.
        #[arg(long)]
        small: u32,
    },

    /// Print the effective analysis configuration as JSON.
    DumpConfig,

    /// Print the MPN table in use.
    DumpTable {
        #[arg(long, value_enum, default_value_t = TableFormat::Csv)]
        format: TableFormat,
    },
}

#[derive(Debug, Clone, Args)]
struct ReferenceArgs {
    /// Analysis configuration (JSON, any subset of fields).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Well layout (JSON). Defaults to the built-in Quanti-Tray/2000 layout.
    #[arg(long, global = true)]
    layout: Option<PathBuf>,

    /// MPN table (`.json` or `.csv`). Defaults to the generated table.
    #[arg(long, global = true)]
    mpn_table: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct AnalyzeArgs {
    /// Path to the input image.
    #[arg(long)]
    image: PathBuf,

    /// Path to write the analysis (JSON). Printed to stdout when omitted.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Path to write the rectified tray with well contours (PNG).
    #[arg(long)]
    overlay: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct BatchArgs {
    /// Directory containing tray photographs.
    #[arg(long)]
    input: PathBuf,

    /// Descend into subdirectories.
    #[arg(long)]
    recursive: bool,

    /// Output directory for results.json, results.csv and overlays.
    #[arg(long)]
    out_dir: PathBuf,

    /// Worker threads (default: one per core).
    #[arg(long)]
    threads: Option<usize>,

    /// Write `<stem>_contours.png` for every analyzed image.
    #[arg(long)]
    overlays: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TableFormat {
    Csv,
    Json,
}

impl ReferenceArgs {
    fn load_config(&self) -> CliResult<AnalyzeConfig> {
        let config = match &self.config {
            Some(path) => AnalyzeConfig::from_json_file(path)?,
            None => AnalyzeConfig::default(),
        };
        config.validate()?;
        Ok(config)
    }

    fn load_reference(&self) -> CliResult<ReferenceData> {
        let layout = match &self.layout {
            Some(path) => WellLayout::from_json_file(path)?,
            None => WellLayout::default(),
        };
        let table = match &self.mpn_table {
            Some(path) => load_table(path, &layout)?,
            None => MpnTable::quanti_tray_2000(),
        };
        Ok(ReferenceData::new(layout, table)?)
    }

    fn load_analyzer(&self) -> CliResult<Analyzer> {
        Ok(Analyzer::with_config(
            self.load_reference()?,
            self.load_config()?,
        ))
    }
}

fn load_table(path: &Path, layout: &WellLayout) -> CliResult<MpnTable> {
    let is_csv = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    let table = if is_csv {
        MpnTable::from_csv_file(path, layout.n_large() as u32, layout.n_small() as u32)?
    } else {
        MpnTable::from_json_file(path)?
    };
    tracing::info!(
        "Loaded MPN table '{}' ({} entries) from {}",
        table.name(),
        table.len(),
        path.display()
    );
    Ok(table)
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze(args) => run_analyze(&cli.reference, &args),
        Commands::Batch(args) => run_batch(&cli.reference, &args),
        Commands::LayoutInfo => run_layout_info(&cli.reference),
        Commands::Mpn { large, small } => run_mpn(&cli.reference, large, small),
        Commands::DumpConfig => run_dump_config(&cli.reference),
        Commands::DumpTable { format } => run_dump_table(&cli.reference, format),
    }
}

// ── layout-info ───────────────────────────────────────────────────────

fn run_layout_info(reference: &ReferenceArgs) -> CliResult<()> {
    let reference = reference.load_reference()?;
    let layout = reference.layout();
    let canvas_w = 480;

    println!("quantitray well layout");
    println!("  name:           {}", layout.name);
    println!("  aspect ratio:   {:.3}", layout.aspect_ratio);
    println!(
        "  canvas:         {}x{} px",
        canvas_w,
        layout.canvas_height(canvas_w)
    );
    println!("  large wells:    {}", layout.n_large());
    println!("  small wells:    {}", layout.n_small());
    println!(
        "  MPN table:      {} ({} entries)",
        reference.table().name(),
        reference.table().len()
    );

    for role in [WellRole::Large, WellRole::Small] {
        if let Some(first) = layout.slots_with_role(role).next() {
            println!(
                "  first {:?} slot: id={} center=({:.3}, {:.3}) size=({:.3}, {:.3})",
                role, first.id, first.center[0], first.center[1], first.size[0], first.size[1]
            );
        }
    }

    Ok(())
}

// ── mpn ────────────────────────────────────────────────────────────────

fn run_mpn(reference: &ReferenceArgs, large: u32, small: u32) -> CliResult<()> {
    let reference = reference.load_reference()?;
    let table = reference.table();
    let entry = table.entry(small, large).ok_or_else(|| -> CliError {
        format!(
            "no entry for {} large / {} small positive wells in table '{}'",
            large,
            small,
            table.name()
        )
        .into()
    })?;

    let upper = entry
        .upper
        .map(|u| format!("{:.1}", u))
        .unwrap_or_else(|| "unbounded".to_string());
    println!("Positive wells: {} large, {} small", large, small);
    println!("  MPN:          {} / 100 mL", entry.display_value());
    println!("  95% interval: {:.1} - {}", entry.lower, upper);

    Ok(())
}

// ── dump-config / dump-table ───────────────────────────────────────────

fn run_dump_config(reference: &ReferenceArgs) -> CliResult<()> {
    let config = reference.load_config()?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn run_dump_table(reference: &ReferenceArgs, format: TableFormat) -> CliResult<()> {
    let reference = reference.load_reference()?;
    match format {
        TableFormat::Csv => print!("{}", reference.table().to_csv()),
        TableFormat::Json => println!("{}", reference.table().to_json_string()?),
    }
    Ok(())
}

// ── analyze ────────────────────────────────────────────────────────────

fn open_rgb(path: &Path) -> CliResult<RawImage> {
    let img = image::open(path).map_err(|e| -> CliError {
        format!("Failed to open image {}: {}", path.display(), e).into()
    })?;
    Ok(img.to_rgb8())
}

fn log_analysis(analysis: &TrayAnalysis) {
    tracing::info!(
        "{}/{} wells matched; {} large / {} small positive; MPN {}",
        analysis.n_matched(),
        analysis.wells.len(),
        analysis.tally.large_positive,
        analysis.tally.small_positive,
        analysis.mpn.display_value(),
    );
}

fn run_analyze(reference: &ReferenceArgs, args: &AnalyzeArgs) -> CliResult<()> {
    let analyzer = reference.load_analyzer()?;

    tracing::info!("Loading image: {}", args.image.display());
    let img = open_rgb(&args.image)?;
    tracing::info!("Image size: {}x{}", img.width(), img.height());

    let (analysis, tray) = analyzer.analyze_with_tray(&img)?;
    log_analysis(&analysis);

    let json = serde_json::to_string_pretty(&analysis)?;
    match &args.out {
        Some(out) => {
            std::fs::write(out, &json)?;
            tracing::info!("Results written to {}", out.display());
        }
        None => println!("{}", json),
    }

    if let Some(path) = &args.overlay {
        overlay::draw_wells(&tray, &analysis.wells).save(path)?;
        tracing::info!("Overlay written to {}", path.display());
    }

    Ok(())
}

// ── batch ──────────────────────────────────────────────────────────────

/// Image files below a directory, keyed by their path relative to it.
struct DirectorySource {
    root: PathBuf,
    ids: Vec<String>,
}

impl DirectorySource {
    fn scan(root: &Path, recursive: bool) -> CliResult<Self> {
        if !root.is_dir() {
            return Err(format!("{} is not a directory", root.display()).into());
        }
        let max_depth = if recursive { usize::MAX } else { 1 };
        let mut ids = Vec::new();
        for entry in walkdir::WalkDir::new(root).max_depth(max_depth) {
            let entry = entry?;
            if !entry.file_type().is_file() || !is_image_file(entry.path()) {
                continue;
            }
            let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
            ids.push(rel.to_string_lossy().into_owned());
        }
        ids.sort();
        Ok(Self {
            root: root.to_path_buf(),
            ids,
        })
    }
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.iter().any(|x| e.eq_ignore_ascii_case(x)))
}

impl ImageSource for DirectorySource {
    fn ids(&self) -> Vec<String> {
        self.ids.clone()
    }

    fn load(&self, id: &str) -> Result<RawImage, String> {
        image::open(self.root.join(id))
            .map(|img| img.to_rgb8())
            .map_err(|e| e.to_string())
    }
}

/// Writes `<stem>_contours.png` for every rectified tray.
struct OverlayWriter {
    out_dir: PathBuf,
}

fn overlay_file_name(id: &str) -> String {
    let stem = Path::new(id).with_extension("");
    let flat: String = stem
        .to_string_lossy()
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    format!("{}_contours.png", flat)
}

impl TrayObserver for OverlayWriter {
    fn on_tray(&self, id: &str, tray: &RectifiedTray, analysis: &TrayAnalysis) {
        let path = self.out_dir.join(overlay_file_name(id));
        if let Err(e) = overlay::draw_wells(tray, &analysis.wells).save(&path) {
            tracing::warn!("failed to write overlay {}: {}", path.display(), e);
        }
    }
}

/// RFC 4180 quoting for fields containing separators, quotes or newlines.
fn csv_field(value: &str) -> std::borrow::Cow<'_, str> {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\"")).into()
    } else {
        value.into()
    }
}

/// One row per image. Failed images keep empty counts and carry their
/// failure kind in `status`.
fn results_csv(results: &std::collections::BTreeMap<String, ImageOutcome>) -> String {
    let mut out = String::from("image_name,large_wells,small_wells,mpn_value,status\n");
    for (id, outcome) in results {
        let row = match outcome {
            ImageOutcome::Analyzed(a) => format!(
                "{},{},{},{},ok\n",
                csv_field(id),
                a.tally.large_positive,
                a.tally.small_positive,
                csv_field(&a.mpn.display_value())
            ),
            ImageOutcome::Failed { kind, .. } => format!("{},,,,{}\n", csv_field(id), kind),
        };
        out.push_str(&row);
    }
    out
}

fn run_batch(reference: &ReferenceArgs, args: &BatchArgs) -> CliResult<()> {
    let analyzer = reference.load_analyzer()?;
    let source = DirectorySource::scan(&args.input, args.recursive)?;
    if source.ids.is_empty() {
        tracing::warn!("No images found in {}", args.input.display());
    }
    std::fs::create_dir_all(&args.out_dir)?;

    let mut pool = rayon::ThreadPoolBuilder::new();
    if let Some(n) = args.threads {
        pool = pool.num_threads(n);
    }
    let pool = pool.build()?;

    let writer = OverlayWriter {
        out_dir: args.out_dir.clone(),
    };
    let observer: &dyn TrayObserver = if args.overlays { &writer } else { &() };
    let report = pool.install(|| analyzer.analyze_batch(&source, observer));

    for (id, outcome) in &report.results {
        if let ImageOutcome::Failed { kind, message } = outcome {
            tracing::warn!("{}: {} ({})", id, message, kind);
        }
    }
    tracing::info!(
        "{} images: {} analyzed ({} with MPN), {} failed",
        report.summary.n_images,
        report.summary.n_analyzed,
        report.summary.n_estimated,
        report.summary.n_failed,
    );

    let json_path = args.out_dir.join("results.json");
    std::fs::write(&json_path, serde_json::to_string_pretty(&report)?)?;
    let csv_path = args.out_dir.join("results.csv");
    std::fs::write(&csv_path, results_csv(&report.results))?;
    tracing::info!(
        "Results written to {} and {}",
        json_path.display(),
        csv_path.display()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_extensions_are_case_insensitive() {
        assert!(is_image_file(Path::new("a/tray.JPG")));
        assert!(is_image_file(Path::new("tray.tiff")));
        assert!(!is_image_file(Path::new("notes.txt")));
        assert!(!is_image_file(Path::new("README")));
    }

    #[test]
    fn overlay_names_flatten_subdirectories() {
        assert_eq!(overlay_file_name("tray1.jpg"), "tray1_contours.png");
        assert_eq!(overlay_file_name("day2/tray1.png"), "day2_tray1_contours.png");
    }

    #[test]
    fn csv_records_failures_and_quotes_ids() {
        let mut results = std::collections::BTreeMap::new();
        results.insert(
            "bad.jpg".to_string(),
            ImageOutcome::Failed {
                kind: quantitray::FailureKind::ImageLoad,
                message: "truncated".to_string(),
            },
        );
        results.insert(
            "tray, \"left\".jpg".to_string(),
            ImageOutcome::Failed {
                kind: quantitray::FailureKind::SegmentationFailed,
                message: "tray not found".to_string(),
            },
        );
        let csv = results_csv(&results);
        assert_eq!(
            csv,
            "image_name,large_wells,small_wells,mpn_value,status\n\
             bad.jpg,,,,image_load\n\
             \"tray, \"\"left\"\".jpg\",,,,segmentation_failed\n"
        );
    }

    #[test]
    fn plain_csv_fields_are_untouched() {
        assert_eq!(csv_field("tray1.jpg"), "tray1.jpg");
        assert_eq!(csv_field(">2419.6"), ">2419.6");
        assert_eq!(csv_field("a\nb"), "\"a\nb\"");
    }

    #[test]
    fn directory_scan_respects_recursion() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.png"), b"").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub").join("b.jpg"), b"").unwrap();

        let flat = DirectorySource::scan(dir.path(), false).unwrap();
        assert_eq!(flat.ids, vec!["a.png".to_string()]);

        let deep = DirectorySource::scan(dir.path(), true).unwrap();
        assert_eq!(deep.ids.len(), 2);
        assert!(deep.load("a.png").is_err());
    }
}
