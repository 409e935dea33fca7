//! Entry symbol lookup through the external ELF tool
//!
//! Runs `<elftool> -c findsymbol=<name> <image>` and parses the hexadecimal
//! address it prints. The address is returned as-is; any target-specific
//! adjustment is left to the caller.

use std::path::Path;
use tokio::process::Command;
use tracing::{debug, info};

/// Resolve `symbol` in `image` using the ELF tool at `tool`.
pub async fn resolve_symbol(tool: &Path, image: &Path, symbol: &str) -> Result<u32, SymbolError> {
    info!("Resolving symbol {} in {}", symbol, image.display());

    let output = Command::new(tool)
        .arg("-c")
        .arg(format!("findsymbol={}", symbol))
        .arg(image)
        .output()
        .await
        .map_err(|e| SymbolError::SpawnFailed(format!("{}: {}", tool.display(), e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(SymbolError::ToolFailed {
            code: output.status.code().unwrap_or(-1),
            stderr: stderr.trim().to_string(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    debug!("ELF tool output: {}", stdout.trim());

    parse_symbol_address(&stdout)
}

/// Parse the ELF tool's output as a 32-bit hex number ("0x08000131" or "8000131").
pub fn parse_symbol_address(s: &str) -> Result<u32, SymbolError> {
    let s = s.trim();
    let hex = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);

    // from_str_radix would take a leading sign
    if hex.is_empty() || hex.starts_with(['+', '-']) {
        return Err(SymbolError::InvalidOutput(format!("'{}' is not a hex address", s)));
    }

    u32::from_str_radix(hex, 16)
        .map_err(|e| SymbolError::InvalidOutput(format!("'{}' is not a hex address: {}", s, e)))
}

#[derive(Debug, thiserror::Error)]
pub enum SymbolError {
    #[error("Failed to run ELF tool {0}")]
    SpawnFailed(String),

    #[error("ELF tool exited with status {code}: {stderr}")]
    ToolFailed { code: i32, stderr: String },

    #[error("Unexpected ELF tool output: {0}")]
    InvalidOutput(String),
}
