//! Host platform classes and the detached OpenOCD server launch for each

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::info;

/// Something that can start the OpenOCD server in the background.
pub trait ServerLauncher {
    /// Name of the server executable under `<prefix>/bin`
    fn executable_name(&self) -> &'static str;

    /// Build the launcher command for `executable -f cfg_file`
    fn launch_command(&self, executable: &Path, cfg_file: &Path) -> Command;

    /// Start the server detached. The child is neither awaited nor supervised.
    fn launch(&self, executable: &Path, cfg_file: &Path) -> Result<(), LaunchError> {
        let mut cmd = self.launch_command(executable, cfg_file);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        info!("Launching OpenOCD: {} -f {}", executable.display(), cfg_file.display());

        let child = cmd.spawn().map_err(|e| {
            LaunchError::SpawnFailed(format!("{:?}: {}", cmd.as_std().get_program(), e))
        })?;

        if let Some(pid) = child.id() {
            info!("OpenOCD launcher started (pid {})", pid);
        }
        Ok(())
    }
}

/// Recognized host platform classes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// Server started hidden through `cmd.exe /C START`
    Windows,
    /// Server started in a new xterm window
    Unix,
}

impl Platform {
    /// Map a target family name ("windows", "unix") to a platform class.
    pub fn from_family(family: &str) -> Result<Self, LaunchError> {
        match family {
            "windows" => Ok(Platform::Windows),
            "unix" => Ok(Platform::Unix),
            other => Err(LaunchError::UnsupportedPlatform(other.to_string())),
        }
    }

    /// `<prefix>/bin/<executable>` for this platform
    pub fn openocd_executable(&self, prefix: &Path) -> PathBuf {
        prefix.join("bin").join(self.executable_name())
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Windows => write!(f, "windows"),
            Platform::Unix => write!(f, "unix"),
        }
    }
}

impl ServerLauncher for Platform {
    fn executable_name(&self) -> &'static str {
        match self {
            Platform::Windows => "openocd.exe",
            Platform::Unix => "openocd",
        }
    }

    fn launch_command(&self, executable: &Path, cfg_file: &Path) -> Command {
        match self {
            Platform::Windows => {
                let mut cmd = Command::new("cmd.exe");
                // empty window title, so a quoted executable path is not taken as one
                cmd.arg("/C").arg("START").arg("")
                    .arg(executable)
                    .arg("-f").arg(cfg_file);
                cmd
            }
            Platform::Unix => {
                let mut cmd = Command::new("xterm");
                cmd.arg("-hold").arg("-e")
                    .arg(executable)
                    .arg("-f").arg(cfg_file);
                cmd
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("platform not recognized: {0}")]
    UnsupportedPlatform(String),

    #[error("Failed to start OpenOCD launcher {0}")]
    SpawnFailed(String),
}
