use clap::{Parser, builder::styling};
use csv2snow::{cli, config::DEFAULT_CONFIG_PATH};
use std::io::Write;
use std::process::ExitCode;

// CLI Styling
const STYLES: styling::Styles = styling::Styles::styled()
    .header(styling::AnsiColor::BrightWhite.on_default())
    .usage(styling::AnsiColor::BrightWhite.on_default())
    .literal(styling::AnsiColor::Green.on_default())
    .placeholder(styling::AnsiColor::Cyan.on_default());

/// Run ETL pipeline: CSV to Snowflake
#[derive(Parser)]
#[command(name = "csv2snow", version, styles = STYLES)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,
}

/// `2026-10-16T12:00:00Z` -> `2026-10-16 12:00:00`
fn log_timestamp(rfc3339: &str) -> String {
    rfc3339.trim_end_matches('Z').replacen('T', " ", 1)
}

fn init_logging() {
    let env = env_logger::Env::default().filter_or("LOG_LEVEL", "info");
    env_logger::Builder::from_env(env)
        .format(|buf, record| {
            let timestamp = log_timestamp(&buf.timestamp_seconds().to_string());
            writeln!(buf, "{} [{}] {}", timestamp, record.level(), record.args())
        })
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Credentials and LOG_LEVEL may come from a local .env file
    let dotenv = dotenvy::dotenv();
    init_logging();
    if let Ok(path) = dotenv {
        log::debug!("Sourced environment from {}", path.display());
    }

    match cli::run(&cli.config).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
