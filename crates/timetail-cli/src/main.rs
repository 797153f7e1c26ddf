#![forbid(unsafe_code)]

mod output;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use clap_complete::{Shell, generate};
use std::env;
use std::fs::File;
use std::io::{self, Write};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use timetail_core::clock::SystemClock;
use timetail_core::config::{self, Config};
use timetail_core::registry;
use timetail_core::{ScanOptions, StopPolicy, TailError, scan};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "timetail: print the records of a log written in the last N seconds",
    long_about = "Scan a log file backward from its end and print, oldest first, every \
                  record whose timestamp is newer than now minus the window. Only the tail \
                  of the file that can hold such records is read.",
    after_help = "EXAMPLES:\n    # Last five minutes of an nginx access log\n    timetail -f /var/log/nginx/access.log\n\n    # Last hour of an RFC 3339 stamped log, as JSON\n    timetail -f app.log -t iso8601 -n 3600 --json\n\n    # Read the whole file instead of stopping at the first stale chunk\n    timetail -f access.log --exhaustive"
)]
struct Cli {
    /// Trailing window to keep, in seconds.
    #[arg(short = 'n', long = "window", value_name = "SECS")]
    window: Option<u64>,

    /// Path to the log file.
    #[arg(short = 'f', long, default_value = "access.log")]
    file: PathBuf,

    /// Log format name (see --list-formats).
    #[arg(short = 't', long = "format", value_name = "NAME")]
    format: Option<String>,

    /// Bytes per backward read.
    #[arg(short = 'b', long, value_name = "BYTES")]
    chunk_size: Option<NonZeroUsize>,

    /// Max bytes held for a partial line while no newline is found.
    #[arg(short = 'm', long, value_name = "BYTES")]
    mem_ceiling: Option<usize>,

    /// Read back to the start of the file instead of stopping early.
    #[arg(long)]
    exhaustive: bool,

    /// Emit JSON output instead of raw lines.
    #[arg(long)]
    json: bool,

    /// Print scan statistics to stderr.
    #[arg(long)]
    stats: bool,

    /// Config file (default: $XDG_CONFIG_HOME/timetail/config.toml).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// List registered formats and exit.
    #[arg(long)]
    list_formats: bool,

    /// Generate a shell completion script and exit.
    #[arg(long, value_enum, value_name = "SHELL")]
    completions: Option<Shell>,

    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Window from the flag, falling back to config.
    fn window(&self, config: &Config) -> Duration {
        Duration::from_secs(self.window.unwrap_or(config.scan.window_secs))
    }

    /// Format name from the flag, falling back to config.
    fn format_name<'a>(&'a self, config: &'a Config) -> &'a str {
        self.format.as_deref().unwrap_or(&config.scan.format)
    }

    /// Scan options: explicit flags override the config file.
    fn scan_options(&self, config: &Config) -> ScanOptions {
        let base = config.scan.options();
        ScanOptions {
            chunk_size: self.chunk_size.unwrap_or(base.chunk_size),
            mem_ceiling: self.mem_ceiling.unwrap_or(base.mem_ceiling),
            stop_policy: if self.exhaustive {
                StopPolicy::Exhaustive
            } else {
                base.stop_policy
            },
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("TIMETAIL_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "timetail=debug,timetail_core=debug,warn"
        } else {
            "warn"
        })
    });

    let format = env::var("TIMETAIL_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(io::stderr))
                .init();
        }
    }
}

fn load_config(explicit: Option<&Path>) -> Result<Config, TailError> {
    match explicit.map(Path::to_path_buf).or_else(config::default_config_path) {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            config::load_config(&path)
        }
        None => Ok(Config::default()),
    }
}

/// Attach the stable error code, and print the remediation hint, if any.
fn report(err: TailError) -> anyhow::Error {
    if let Some(hint) = err.hint() {
        eprintln!("hint: {hint}");
    }
    let code = err.code();
    anyhow::Error::new(err).context(format!("{code}: {}", code.message()))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Some(shell) = cli.completions {
        let mut command = Cli::command();
        generate(shell, &mut command, "timetail", &mut io::stdout());
        return Ok(());
    }

    let mode = output::resolve_output_mode(cli.json);
    let config = load_config(cli.config.as_deref()).map_err(report)?;
    let formats = config.build_registry().map_err(report)?;

    if cli.list_formats {
        let stdout = io::stdout();
        return output::write_formats(&mut stdout.lock(), &formats, mode);
    }

    let window = cli.window(&config);
    let table = registry::with_cutoff(formats, window, &SystemClock);
    let name = cli.format_name(&config);
    let spec = match registry::lookup(&table, name) {
        Ok(spec) => spec,
        Err(err) => {
            output::write_formats(&mut io::stderr().lock(), &table, output::OutputMode::Text)?;
            return Err(report(err));
        }
    };

    let options = cli.scan_options(&config);
    info!(
        file = %cli.file.display(),
        format = spec.name(),
        window_secs = window.as_secs(),
        chunk_size = options.chunk_size.get(),
        mem_ceiling = options.mem_ceiling,
        "scanning"
    );

    let outcome = {
        let mut file = File::open(&cli.file)
            .with_context(|| format!("Failed to open {}", cli.file.display()))?;
        scan(&mut file, spec, options).map_err(report)?
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    output::write_outcome(&mut out, spec, &outcome, mode)?;
    out.flush()?;

    if cli.stats {
        output::write_stats(&mut io::stderr().lock(), &outcome.stats)?;
    }

    Ok(())
}
