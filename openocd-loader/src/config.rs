//! Configuration for the openocd-loader helper

use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;
use clap::{Parser, ValueEnum};

use crate::error::{LoaderError, Result};
use crate::openocd_client::{DEFAULT_RPC_HOST, DEFAULT_RPC_PORT};
use crate::platform::{Platform, ServerLauncher};

/// OpenOCD configuration file name inside the platform directory
pub const OPENOCD_CFG_FILENAME: &str = "openocd.cfg";

/// Default firmware entry symbol
pub const DEFAULT_START_SYMBOL: &str = "_start";

/// What a single invocation does
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Halt the target, load the firmware image and resume at its entry point
    #[default]
    Load,
    /// Start the OpenOCD server in the background and exit
    Server,
    /// Ask a running OpenOCD server to shut down and exit
    Shutdown,
}

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "openocd-loader")]
#[command(about = "Load and start firmware on a target through OpenOCD")]
#[command(version)]
pub struct Args {
    /// Mode: server, shutdown or load (default). "-server" and "-shutdown" are accepted too.
    #[arg(value_enum, default_value_t = Mode::Load)]
    pub mode: Mode,

    /// Base working directory
    #[arg(long, env = "SWEETADA_PATH")]
    pub sweetada_path: PathBuf,

    /// Shared helper utilities directory
    #[arg(long, env = "LIBUTILS_DIRECTORY")]
    pub libutils_directory: PathBuf,

    /// OpenOCD install prefix (the server is <prefix>/bin/openocd)
    #[arg(long, env = "OPENOCD_PREFIX")]
    pub openocd_prefix: PathBuf,

    /// Platform directory, relative to the base directory
    #[arg(long, env = "PLATFORM_DIRECTORY")]
    pub platform_directory: PathBuf,

    /// ELF inspection tool executable
    #[arg(long, env = "ELFTOOL")]
    pub elftool: PathBuf,

    /// Firmware image, relative to the base directory
    #[arg(long, env = "KERNEL_OUTFILE")]
    pub kernel_outfile: PathBuf,

    /// OpenOCD TCL RPC host
    #[arg(long, default_value = DEFAULT_RPC_HOST)]
    pub rpc_host: String,

    /// OpenOCD TCL RPC port
    #[arg(long, default_value_t = DEFAULT_RPC_PORT)]
    pub rpc_port: u16,

    /// Entry symbol the target is resumed at
    #[arg(long, default_value = DEFAULT_START_SYMBOL)]
    pub start_symbol: String,

    /// Give up waiting for an RPC response after this many seconds (waits forever by default)
    #[arg(long)]
    pub rpc_timeout_secs: Option<u64>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Log file path (defaults to stderr)
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

/// Rewrite legacy single-dash mode words ("-server", "-shutdown") in the
/// first positional slot to the bare form clap expects.
pub fn normalize_args<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut args: Vec<OsString> = args.into_iter().map(Into::into).collect();
    if let Some(first) = args.get_mut(1) {
        let bare = match first.to_str() {
            Some("-server") => Some("server"),
            Some("-shutdown") => Some("shutdown"),
            _ => None,
        };
        if let Some(bare) = bare {
            *first = OsString::from(bare);
        }
    }
    args
}

/// Runtime configuration derived from CLI args and environment
#[derive(Debug, Clone)]
pub struct Config {
    pub mode: Mode,
    pub sweetada_path: PathBuf,
    pub libutils_directory: PathBuf,
    pub openocd_prefix: PathBuf,
    /// `<base>/<platform dir>/openocd.cfg`
    pub openocd_cfg_file: PathBuf,
    pub elftool: PathBuf,
    /// `<base>/<kernel outfile>`
    pub kernel_outfile: PathBuf,
    pub rpc_host: String,
    pub rpc_port: u16,
    pub start_symbol: String,
    pub rpc_timeout: Option<Duration>,
}

impl Config {
    pub fn from_args(args: &Args) -> Self {
        Self {
            mode: args.mode,
            sweetada_path: args.sweetada_path.clone(),
            libutils_directory: args.libutils_directory.clone(),
            openocd_prefix: args.openocd_prefix.clone(),
            openocd_cfg_file: args
                .sweetada_path
                .join(&args.platform_directory)
                .join(OPENOCD_CFG_FILENAME),
            elftool: args.elftool.clone(),
            kernel_outfile: args.sweetada_path.join(&args.kernel_outfile),
            rpc_host: args.rpc_host.clone(),
            rpc_port: args.rpc_port,
            start_symbol: args.start_symbol.clone(),
            rpc_timeout: args.rpc_timeout_secs.map(Duration::from_secs),
        }
    }

    /// Locate the OpenOCD executable for `platform` under the install prefix
    pub fn find_openocd(&self, platform: Platform) -> Result<PathBuf> {
        let path = platform.openocd_executable(&self.openocd_prefix);
        if path.exists() {
            return Ok(path);
        }
        Err(LoaderError::Configuration(format!(
            "OpenOCD executable {} not found under OPENOCD_PREFIX {}",
            platform.executable_name(),
            self.openocd_prefix.display()
        )))
    }
}
