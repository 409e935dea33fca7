//! OpenOCD firmware loader
//!
//! Drives a local OpenOCD server over its TCL RPC port (default 6666) to halt
//! the target, load a firmware image and resume it at the image's entry point.
//! Can also start the server in the background or shut it down.

pub mod config;
pub mod error;
pub mod openocd_client;
pub mod platform;
pub mod session;
pub mod symbols;

pub use config::{Args, Config, Mode};
pub use error::{LoaderError, Result};
pub use openocd_client::OpenocdClient;
pub use session::LoadSession;
