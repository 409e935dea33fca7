//! Session driver: server launch, server shutdown, and the halt/load/resume sequence

use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{Config, Mode};
use crate::error::Result;
use crate::openocd_client::OpenocdClient;
use crate::platform::{Platform, ServerLauncher};
use crate::symbols::resolve_symbol;

/// Wait between `halt` and `load_image`. OpenOCD acknowledges `halt` before
/// the core has stopped.
pub const HALT_SETTLE_DELAY: Duration = Duration::from_millis(1000);

/// Clear the Thumb bit (bit 0) of an entry address
pub fn mask_entry_address(address: u32) -> u32 {
    address & 0xFFFF_FFFE
}

/// Progress of a load session. Only moves forward; any failure ends in `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connected,
    SymbolResolved,
    Halted,
    Loaded,
    Resumed,
    Disconnected,
    Failed,
}

/// Run whatever `config.mode` asks for.
pub async fn run(config: &Config) -> Result<()> {
    match config.mode {
        Mode::Server => start_server(config, std::env::consts::FAMILY),
        Mode::Shutdown => shutdown_server(config).await,
        Mode::Load => LoadSession::new(config).run().await.map(|_| ()),
    }
}

/// Launch OpenOCD detached for the host `family` and return without any RPC.
pub fn start_server(config: &Config, family: &str) -> Result<()> {
    let platform = Platform::from_family(family)?;
    let executable = config.find_openocd(platform)?;

    info!("Starting OpenOCD server ({})", platform);
    debug!("Helper utilities: {}", config.libutils_directory.display());

    platform.launch(&executable, &config.openocd_cfg_file)?;
    Ok(())
}

/// Send `shutdown` to a running server. Its reply is not awaited.
pub async fn shutdown_server(config: &Config) -> Result<()> {
    let mut client = OpenocdClient::connect(&config.rpc_host, config.rpc_port).await?;

    info!("Requesting OpenOCD shutdown");
    client.send("shutdown").await?;
    client.disconnect().await?;
    Ok(())
}

/// One halt/load/resume pass over a single RPC connection
pub struct LoadSession<'a> {
    config: &'a Config,
    state: SessionState,
}

impl<'a> LoadSession<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self {
            config,
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Drive the full sequence and return the address the target was resumed at.
    pub async fn run(&mut self) -> Result<u32> {
        let result = self.drive().await;
        if let Err(e) = &result {
            warn!("Load session failed in state {:?}: {}", self.state, e);
            self.state = SessionState::Failed;
        }
        result
    }

    async fn drive(&mut self) -> Result<u32> {
        let config = self.config;

        let mut client = OpenocdClient::connect(&config.rpc_host, config.rpc_port)
            .await?
            .with_read_timeout(config.rpc_timeout);
        self.state = SessionState::Connected;

        let raw = resolve_symbol(&config.elftool, &config.kernel_outfile, &config.start_symbol).await?;
        let start_address = mask_entry_address(raw);
        self.state = SessionState::SymbolResolved;

        info!("{} = 0x{:08X}, resuming at 0x{:08X}", config.start_symbol, raw, start_address);
        println!("START ADDRESS = 0x{:X}", start_address);

        echo(&mut client, "halt").await?;
        self.state = SessionState::Halted;

        tokio::time::sleep(HALT_SETTLE_DELAY).await;

        echo(&mut client, &format!("load_image {}", config.kernel_outfile.display())).await?;
        self.state = SessionState::Loaded;

        echo(&mut client, &format!("resume 0x{:X}", start_address)).await?;
        self.state = SessionState::Resumed;

        client.disconnect().await?;
        self.state = SessionState::Disconnected;

        Ok(start_address)
    }
}

/// Issue `command` and discard its echo response
async fn echo(client: &mut OpenocdClient, command: &str) -> Result<()> {
    info!("> {}", command);
    let response = client.command(command).await?;
    if !response.trim().is_empty() {
        debug!("< {}", response.trim());
    }
    Ok(())
}
