use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueHint};
use clap_complete::{generate, Shell};
use console::style;
use dialoguer::{theme::ColorfulTheme, Confirm, Input, Select};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use vcf_concordance::intersect::{CountingCollector, SnvIntersector};
use vcf_concordance::parsers::BedReader;
use vcf_concordance::{
    compare_files, AppConfig, FileDiscovery, KaryotypeOrder, MatchStrategy, OrderKind,
    ReportFormat, ReportGenerator,
};

/// Per-sample genotype concordance across VCF files
#[derive(Parser, Debug)]
#[command(
    name = "vcf-concordance",
    version,
    about = "Per-sample genotype concordance across multiple VCF files",
    long_about = r#"
Compares the genotype calls of every sample across several position-sorted
VCF files (plain, gzip/bgzip, bzip2 or xz) and reports, per sample and site,
which files agree on the called alleles.
"#
)]
#[command(arg_required_else_help = true)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compare genotypes across VCF files
    Compare(CompareArgs),
    /// Intersect two sorted BED files and print hit/miss counts
    Intersect {
        #[arg(value_hint = ValueHint::FilePath)]
        a: PathBuf,
        #[arg(value_hint = ValueHint::FilePath)]
        b: PathBuf,
    },
    /// Generate shell completions
    Completions { shell: Shell },
}

#[derive(clap::Args, Debug)]
struct CompareArgs {
    /// VCF files or directories (space-separated, supports tab completion)
    #[arg(value_name = "INPUTS", num_args = 0.., value_hint = ValueHint::AnyPath)]
    inputs: Vec<PathBuf>,

    /// Output directory for reports
    #[arg(short, long, value_hint = ValueHint::DirPath)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// Matching strategy
    #[arg(long, value_enum)]
    matcher: Option<MatcherArg>,

    /// Chromosome order the inputs are sorted in
    #[arg(long, value_enum)]
    order: Option<OrderArg>,

    /// Fail when the same sample name appears in more than one input
    #[arg(long)]
    no_duplicate_samples: bool,

    /// Treat homozygous calls as a single allele
    #[arg(long)]
    collapse_duplicates: bool,

    /// Ignore homozygous reference calls
    #[arg(long)]
    skip_reference: bool,

    /// TOML configuration file; flags override its values
    #[arg(long, value_name = "FILE", value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    /// Interactive mode with prompts for all parameters
    #[arg(short, long)]
    interactive: bool,

    /// Recursively search directories
    #[arg(short, long)]
    recursive: bool,

    /// Number of threads (0 = auto)
    #[arg(short, long)]
    threads: Option<usize>,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum OutputFormat {
    Tsv,
    Csv,
    Json,
    All,
}

impl From<OutputFormat> for ReportFormat {
    fn from(format: OutputFormat) -> ReportFormat {
        match format {
            OutputFormat::Tsv => ReportFormat::Tsv,
            OutputFormat::Csv => ReportFormat::Csv,
            OutputFormat::Json => ReportFormat::Json,
            OutputFormat::All => ReportFormat::All,
        }
    }
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum MatcherArg {
    Exact,
    Fuzzy,
}

impl From<MatcherArg> for MatchStrategy {
    fn from(arg: MatcherArg) -> MatchStrategy {
        match arg {
            MatcherArg::Exact => MatchStrategy::Exact,
            MatcherArg::Fuzzy => MatchStrategy::Fuzzy,
        }
    }
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum OrderArg {
    Lexical,
    Karyotype,
    Header,
}

impl From<OrderArg> for OrderKind {
    fn from(arg: OrderArg) -> OrderKind {
        match arg {
            OrderArg::Lexical => OrderKind::Lexical,
            OrderArg::Karyotype => OrderKind::Karyotype,
            OrderArg::Header => OrderKind::Header,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match cli.command {
        Commands::Completions { shell } => {
            generate_completions(shell);
            Ok(())
        }
        Commands::Intersect { a, b } => run_intersect(a, b),
        Commands::Compare(args) => {
            let config = if args.interactive {
                run_interactive_mode()?
            } else {
                config_from_args(&args)?
            };

            init_thread_pool(config.threads)?;
            info!("Using {} threads", rayon::current_num_threads());

            run_compare(config)
        }
    }
}

fn generate_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut io::stdout());
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(format!("vcf_concordance={}", level))
        .with_writer(io::stderr)
        .init();
}

fn init_thread_pool(threads: usize) -> Result<()> {
    let num_threads = if threads == 0 {
        num_cpus::get()
    } else {
        threads
    };

    rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build_global()
        .map_err(|e| anyhow::anyhow!("Failed to initialize thread pool: {}", e))?;

    Ok(())
}

fn config_from_args(args: &CompareArgs) -> Result<AppConfig> {
    let mut config = match &args.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::default(),
    };

    if !args.inputs.is_empty() {
        config.inputs = args.inputs.clone();
    }
    config.recursive |= args.recursive;
    if let Some(output) = &args.output {
        config.output = output.clone();
    }
    if let Some(format) = args.format {
        config.format = format.into();
    }
    if let Some(matcher) = args.matcher {
        config.matcher = matcher.into();
    }
    if let Some(order) = args.order {
        config.order = order.into();
    }
    if args.no_duplicate_samples {
        config.allow_duplicate_samples = false;
    }
    config.engine.collapse_duplicate_alleles |= args.collapse_duplicates;
    config.engine.skip_reference_calls |= args.skip_reference;
    if let Some(threads) = args.threads {
        config.threads = threads;
    }

    Ok(config)
}

fn run_interactive_mode() -> Result<AppConfig> {
    println!(
        "{}",
        style("╔══════════════════════════════════════════════════════════════╗").cyan()
    );
    println!(
        "{}",
        style("║          VCF Genotype Concordance - Interactive Mode         ║")
            .cyan()
            .bold()
    );
    println!(
        "{}",
        style("╚══════════════════════════════════════════════════════════════╝").cyan()
    );
    println!();

    let theme = ColorfulTheme::default();

    let inputs_text: String = Input::with_theme(&theme)
        .with_prompt("VCF files/directories (space-separated)")
        .interact_text()?;
    let inputs: Vec<PathBuf> = inputs_text.split_whitespace().map(PathBuf::from).collect();

    let recursive = Confirm::with_theme(&theme)
        .with_prompt("Enable recursive directory search?")
        .default(false)
        .interact()?;

    let matcher_idx = Select::with_theme(&theme)
        .with_prompt("Select matching strategy")
        .default(0)
        .items(&["Exact allele sets", "Fuzzy (position + reference)"])
        .interact()?;
    let matcher = match matcher_idx {
        1 => MatchStrategy::Fuzzy,
        _ => MatchStrategy::Exact,
    };

    let order_idx = Select::with_theme(&theme)
        .with_prompt("Chromosome order of the inputs")
        .default(0)
        .items(&[
            "Karyotype (1..22, X, Y, MT)",
            "Lexical",
            "Header ##contig order",
        ])
        .interact()?;
    let order = match order_idx {
        1 => OrderKind::Lexical,
        2 => OrderKind::Header,
        _ => OrderKind::Karyotype,
    };

    let format_idx = Select::with_theme(&theme)
        .with_prompt("Select output format")
        .default(0)
        .items(&["TSV", "CSV", "JSON", "All formats"])
        .interact()?;
    let format = match format_idx {
        1 => ReportFormat::Csv,
        2 => ReportFormat::Json,
        3 => ReportFormat::All,
        _ => ReportFormat::Tsv,
    };

    let output: String = Input::with_theme(&theme)
        .with_prompt("Output directory")
        .default("./reports".to_string())
        .interact_text()?;

    let threads: usize = Input::with_theme(&theme)
        .with_prompt("Number of threads (0 = auto-detect)")
        .default(0)
        .interact_text()?;

    let mut config = AppConfig {
        inputs,
        recursive,
        output: PathBuf::from(output),
        format,
        matcher,
        order,
        threads,
        ..AppConfig::default()
    };
    config.engine.skip_reference_calls = Confirm::with_theme(&theme)
        .with_prompt("Ignore homozygous reference calls?")
        .default(false)
        .interact()?;

    Ok(config)
}

fn run_compare(config: AppConfig) -> Result<()> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(120));

    pb.set_message("Discovering VCF files...");
    let discovery = FileDiscovery::new(config.recursive);
    let files = discovery.discover(&config.inputs)?;
    anyhow::ensure!(!files.is_empty(), "No VCF files found in the given inputs");
    info!("Found {} files to compare", files.len());

    pb.set_message(format!("Comparing {} files...", files.len()));
    let results = compare_files(&files, &config, |entries| {
        pb.set_message(format!("Compared {} entries", entries));
    })?;

    pb.set_message("Generating reports...");
    let generator = ReportGenerator::new(&config.output)?;
    let written = generator.generate(&results, config.format)?;
    pb.finish_with_message("Comparison complete!");

    println!();
    ReportGenerator::print_summary(&results, &mut io::stdout())?;
    println!(
        "\n{} {} reports saved to: {}",
        style("✓").green().bold(),
        written.len(),
        style(config.output.display()).cyan()
    );

    Ok(())
}

fn run_intersect(a: PathBuf, b: PathBuf) -> Result<()> {
    let reader_a =
        BedReader::from_path(&a).with_context(|| format!("Failed to open {}", a.display()))?;
    let reader_b =
        BedReader::from_path(&b).with_context(|| format!("Failed to open {}", b.display()))?;

    let mut counts = CountingCollector::default();
    SnvIntersector::new(reader_a, reader_b, Arc::new(KaryotypeOrder)).run(&mut counts)?;

    println!("{}", style("Intersection").bold().cyan());
    println!("  {} {}", style("hits:").green(), counts.hits);
    println!("  {} {}", style("only in A:").yellow(), counts.miss_a);
    println!("  {} {}", style("only in B:").yellow(), counts.miss_b);
    Ok(())
}
