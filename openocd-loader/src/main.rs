//! openocd-loader — Main Entry Point

use std::process::ExitCode;

use clap::Parser;
use tracing::{info, error, debug};
use tracing_subscriber::{EnvFilter, fmt};

use openocd_loader::{Args, Config, session};
use openocd_loader::config::normalize_args;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse_from(normalize_args(std::env::args_os()));
    if let Err(e) = init_logging(&args) {
        eprintln!("openocd-loader: *** Error: cannot initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    info!("openocd-loader v{} ({:?} mode)", env!("CARGO_PKG_VERSION"), args.mode);

    let config = Config::from_args(&args);

    match session::run(&config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("openocd-loader: *** Error: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_logging(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(false)
        .with_line_number(false);

    if let Some(log_file) = &args.log_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)?;
        subscriber.with_writer(file).init();
    } else {
        subscriber.with_writer(std::io::stderr).init();
    }

    debug!("Logging initialized with level: {}", args.log_level);
    Ok(())
}
