//! emx-shspec CLI
//!
//! Run shell spec files against a shell binary.

use anyhow::{bail, Context};
use clap::builder::NonEmptyStringValueParser;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use emx_shspec::{Dialect, DisplayMode, RunConfig, SuiteRunner, DEFAULT_DIALECT, DEFAULT_SHELL, SHELL_ENV};

#[derive(Parser, Debug)]
#[command(name = "emx-shspec")]
#[command(author = "nzinfo <li.monan@gmail.com>")]
#[command(version)]
#[command(about = "Run shell spec files against a shell binary")]
struct Cli {
    /// Spec files to run
    #[arg(required = true)]
    specs: Vec<PathBuf>,

    /// Only show failing cases
    #[arg(long = "only-failures")]
    only_failures: bool,

    /// Shell binary under test
    #[arg(short, long, env = SHELL_ENV, default_value = DEFAULT_SHELL)]
    shell: PathBuf,

    /// Dialect whose OK/BUG/N-I annotations apply
    #[arg(short, long, default_value = DEFAULT_DIALECT, value_parser = NonEmptyStringValueParser::new())]
    dialect: String,

    /// Per-case timeout in seconds
    #[arg(short, long, default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
    timeout: u64,

    /// Only run cases whose name contains this string
    #[arg(short = 'f', long)]
    filter: Option<String>,

    /// Environment variables to set (KEY=VALUE)
    #[arg(short = 'e', long = "env")]
    env_vars: Vec<String>,

    /// Repository root [default: located from the executable]
    #[arg(long = "repo-root")]
    repo_root: Option<PathBuf>,

    /// Show number of cases without running
    #[arg(long = "count")]
    count: bool,

    /// Verbose output: every case, stdout diffs, debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Returns whether every spec file came out all clear
fn run(cli: Cli) -> anyhow::Result<bool> {
    let env = cli.env_vars.iter().map(|kv| parse_env(kv)).collect::<anyhow::Result<Vec<_>>>()?;

    let mut config = RunConfig {
        shell: cli.shell,
        dialect: Dialect::new(cli.dialect),
        timeout: Duration::from_secs(cli.timeout),
        env,
        filter: cli.filter,
        ..Default::default()
    };
    if let Some(root) = cli.repo_root {
        config.repo_root = root;
    }

    let suite = SuiteRunner::new(config).context("failed to set up runner")?;
    let mode = if cli.only_failures { DisplayMode::OnlyFailures } else { DisplayMode::All };

    let mut all_clear = true;
    for path in &cli.specs {
        let cases = match suite.load(path) {
            Ok(cases) => cases,
            Err(e) => {
                eprintln!("error: {}", e);
                all_clear = false;
                continue;
            }
        };

        if cli.count {
            println!("{}: {} case(s)", path.display(), cases.len());
            continue;
        }

        let report = suite.run_cases(path, &cases);
        for line in report.render(mode, cli.verbose) {
            println!("{}", line);
        }
        all_clear &= report.all_clear();
    }

    Ok(all_clear)
}

fn parse_env(kv: &str) -> anyhow::Result<(String, String)> {
    match kv.split_once('=') {
        Some((k, v)) if !k.is_empty() => Ok((k.to_string(), v.to_string())),
        _ => bail!("invalid environment variable {:?}: expected KEY=VALUE", kv),
    }
}
