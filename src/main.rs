//! Jack Syntax Analyzer
//!
//! Tokenizes `.jack` sources and runs the recursive-descent compilation
//! engine over them, writing `XxxT.xml` token dumps and `Xxx.xml` parse trees.

mod backend;
mod driver;
mod feedback;
mod frontend;
mod utils;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;

use backend::xml::write_token_dump;
use backend::XmlStyle;
use driver::{BatchConfig, BatchResults};
use feedback::RunReport;
use frontend::lexer::tokenize;

/// Jack Syntax Analyzer
#[derive(Parser, Debug)]
#[command(name = "jack-analyzer")]
#[command(version)]
#[command(about = "Jack syntax analyzer - tokenizer and parse tree emitter")]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Source file (.jack) or directory of source files
    #[arg(value_name = "PATH")]
    input: Option<PathBuf>,

    /// Log progress (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write token and parse tree XML for a file or directory
    Analyze(AnalyzeArgs),
    /// Print the token dump of one source file
    Tokens {
        /// Input source file
        input: PathBuf,
    },
    /// Parse a file or directory without writing anything
    Check {
        /// Input source file or directory
        input: PathBuf,

        /// Worker threads
        #[arg(short, long)]
        jobs: Option<usize>,
    },
    /// Print version information
    Version,
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    /// Input source file or directory
    input: PathBuf,

    /// Directory for the XML outputs (defaults to next to each source)
    #[arg(short, long, value_name = "DIR")]
    out_dir: Option<PathBuf>,

    /// Worker threads
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Skip the XxxT.xml token dumps
    #[arg(long)]
    no_tokens: bool,

    /// Write the raw tag stream instead of the indented tree
    #[arg(long)]
    flat: bool,

    /// Write a JSON run report to this file
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,
}

impl AnalyzeArgs {
    fn for_input(input: PathBuf) -> Self {
        Self {
            input,
            out_dir: None,
            jobs: None,
            no_tokens: false,
            flat: false,
            report: None,
        }
    }

    fn config(&self) -> BatchConfig {
        let defaults = BatchConfig::default();
        BatchConfig {
            jobs: self.jobs.unwrap_or(defaults.jobs),
            out_dir: self.out_dir.clone(),
            emit_tokens: !self.no_tokens,
            style: if self.flat {
                XmlStyle::Flat
            } else {
                XmlStyle::Indented
            },
            write_outputs: true,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            2
        }
    };
    process::exit(code);
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
}

/// Dispatch the command line, returning the process exit code
fn run(cli: Cli) -> anyhow::Result<i32> {
    match cli.command {
        Some(Commands::Analyze(args)) => analyze(&args),
        Some(Commands::Tokens { input }) => print_tokens(&input),
        Some(Commands::Check { input, jobs }) => check(&input, jobs),
        Some(Commands::Version) => {
            println!("jack-analyzer {}", env!("CARGO_PKG_VERSION"));
            println!("Jack Syntax Analyzer");
            println!("License: Apache-2.0");
            Ok(0)
        }
        None => match cli.input {
            Some(input) => analyze(&AnalyzeArgs::for_input(input)),
            None => {
                eprintln!("Error: No input file specified");
                eprintln!("Usage: jack-analyzer <PATH> or jack-analyzer analyze <PATH>");
                Ok(1)
            }
        },
    }
}

/// Analyze every source under `args.input`
fn analyze(args: &AnalyzeArgs) -> anyhow::Result<i32> {
    let files = driver::discover(&args.input)?;
    let config = args.config();

    if let Some(dir) = &config.out_dir {
        fs::create_dir_all(dir)
            .with_context(|| format!("creating output directory {}", dir.display()))?;
    }

    let results = driver::run_batch(&files, &config);
    println!("{}", results.summary());

    if let Some(path) = &args.report {
        let json = RunReport::from_results(&results).to_json()?;
        fs::write(path, json).with_context(|| format!("writing report {}", path.display()))?;
        println!("Report written to {}", path.display());
    }

    Ok(exit_code(&results))
}

fn check(input: &Path, jobs: Option<usize>) -> anyhow::Result<i32> {
    let files = driver::discover(input)?;
    let defaults = BatchConfig::default();
    let config = BatchConfig {
        jobs: jobs.unwrap_or(defaults.jobs),
        write_outputs: false,
        ..defaults
    };

    let results = driver::run_batch(&files, &config);
    if results.failure_count() == 0 {
        println!("✅ No errors found in {} files", results.outcomes.len());
    } else {
        for outcome in results.failures() {
            println!("❌ {}", outcome.path.display());
        }
    }
    Ok(exit_code(&results))
}

/// Print the `<tokens>` dump of one file to stdout
fn print_tokens(input: &Path) -> anyhow::Result<i32> {
    let source = fs::read_to_string(input)
        .with_context(|| format!("reading {}", input.display()))?;

    match tokenize(&source) {
        Ok(tokens) => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            write_token_dump(&tokens, &mut out)?;
            out.flush()?;
            Ok(0)
        }
        Err(e) => {
            eprint!("{}", driver::format_failure(input, &e));
            Ok(1)
        }
    }
}

fn exit_code(results: &BatchResults) -> i32 {
    if results.failure_count() == 0 {
        0
    } else {
        1
    }
}
