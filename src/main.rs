use clap::Parser;
use env_logger::{Builder, WriteStyle};
use lcdlink::config::AppConfig;
use lcdlink::models::{ExecDriver, ExecutionPolicy};
use lcdlink::RunOptions;
use log::{error, LevelFilter};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "lcdlink", version, about = "Push host telemetry to a serial text display")]
struct Cli {
    /// YAML configuration file.
    #[arg(long, value_name = "PATH", default_value = "config.yaml")]
    config: PathBuf,

    /// Print one frame to stdout and exit.
    #[arg(long)]
    dry_run: bool,

    /// Send one frame and exit.
    #[arg(long)]
    once: bool,

    /// Do not read requests from the display.
    #[arg(long)]
    no_echo: bool,

    /// Log at info level or above regardless of the configured level.
    #[arg(long, short)]
    verbose: bool,

    /// Run the commands selected on the display.
    #[arg(long)]
    allow_exec: bool,

    /// How selected commands are launched.
    #[arg(long, value_enum, default_value_t = ExecDriver::Shell)]
    exec_driver: ExecDriver,

    /// Synthetic telemetry instead of the host's sensors.
    #[arg(long)]
    mock: bool,
}

impl Cli {
    fn options(&self) -> RunOptions {
        RunOptions {
            dry_run: self.dry_run,
            once: self.once,
            inbound: !self.no_echo,
            mock: self.mock,
            policy: ExecutionPolicy {
                allow_exec: self.allow_exec,
                driver: self.exec_driver,
            },
        }
    }
}

fn log_level(config: &AppConfig, verbose: bool) -> LevelFilter {
    let level = config.get_log_level();
    if verbose && level < LevelFilter::Info {
        LevelFilter::Info
    } else {
        level
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration first (without logging)
    let config = match AppConfig::from_file(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {:#}", e);
            std::process::exit(2);
        }
    };

    // Initialise logger with a configured log level
    Builder::new()
        .filter_level(log_level(&config, cli.verbose))
        .write_style(WriteStyle::Always)
        .format_timestamp_secs()
        .init();

    if let Err(e) = lcdlink::run(config, cli.options()).await {
        error!("Application error: {}", e);
        return Err(e);
    }
    Ok(())
}
