use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use htmltopdf_testcases::{fixtures, RunnerConfig, TestcaseRunner};

/// Renders the bundled HTML test cases to PDF and PNG.
///
/// Fonts must be present under `assets/fonts` relative to the crate or provided via the
/// `TESTCASES_FONTS_DIR` environment variable. `OUT_DIRECTORY`, `TESTCASES_DIR` and
/// `TESTCASES_LOG` provide defaults for the flags below.
#[derive(Parser)]
#[command(author, version, about = "Renders HTML test cases and checks them for warnings")]
struct Cli {
    /// Directory receiving the rendered files.
    #[arg(long, global = true)]
    out_dir: Option<PathBuf>,

    /// Directory holding the `<name>.html` fixtures.
    #[arg(long, global = true)]
    fixtures_dir: Option<PathBuf>,

    /// Width of the rendered PNG in pixels.
    #[arg(long, global = true)]
    width: Option<u32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render every default test case.
    #[command(name = "all", aliases = ["run-all", "run_all"])]
    All,

    /// Render the named test cases to `<name>.pdf` and `<name>.png`.
    Run {
        /// Test case names, without the `.html` suffix.
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Render the named test cases in memory and fail on logged warnings.
    Check {
        /// Test case names, without the `.html` suffix.
        #[arg(required = true)]
        names: Vec<String>,

        /// Report warnings without failing.
        #[arg(long)]
        allow_warnings: bool,
    },

    /// List the available test cases.
    List,
}

fn config(cli: &Cli) -> RunnerConfig {
    let mut config = RunnerConfig::from_env();
    if let Some(out_dir) = &cli.out_dir {
        config = config.with_out_dir(out_dir);
    }
    if let Some(fixtures_dir) = &cli.fixtures_dir {
        config = config.with_fixtures_dir(fixtures_dir);
    }
    if let Some(width) = cli.width {
        config = config.with_png_width(width);
    }
    config
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let runner = TestcaseRunner::new(config(&cli));

    match cli.command {
        Commands::All => {
            let outputs = runner.run_all()?;
            println!("Rendered {} test cases", outputs.len());
        }
        Commands::Run { names } => {
            for name in names {
                let output = runner.run_test_case(&name)?;
                println!(
                    "{}: {} ({} pages), {}",
                    output.name,
                    output.pdf.display(),
                    output.pages,
                    output.png.display()
                );
            }
        }
        Commands::Check {
            names,
            allow_warnings,
        } => {
            for name in names {
                if allow_warnings {
                    let warnings = runner.run_test_without_output_and_allow_warnings(&name)?;
                    println!("{}: ok ({} warnings)", name, warnings.len());
                    for warning in warnings {
                        println!("  {}", warning);
                    }
                } else {
                    runner.run_test_without_output(&name)?;
                    println!("{}: ok", name);
                }
            }
        }
        Commands::List => {
            for name in fixtures::available(runner.config().fixtures_dir())? {
                println!("{}", name);
            }
        }
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    if let Err(err) = run(cli) {
        eprintln!("Error: {}", err);
        print_error_sources(err.as_ref());
        std::process::exit(1);
    }
}

fn print_error_sources(mut error: &(dyn Error + 'static)) {
    while let Some(source) = error.source() {
        eprintln!("  caused by: {}", source);
        error = source;
    }
}
