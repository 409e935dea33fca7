//! Integration tests for openocd-loader against a fake OpenOCD TCL server

use std::path::{Path, PathBuf};

use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use openocd_loader::config::{normalize_args, Args, Config, Mode};
use openocd_loader::session::{self, LoadSession, SessionState};
use openocd_loader::LoaderError;

/// How the fake server answers each command frame
#[derive(Clone, Copy)]
enum Reply {
    /// Bare sentinel, like OpenOCD's echo for most commands
    Echo,
    /// Nothing at all
    Silent,
    /// Half a response, then close the socket
    Truncate,
}

/// Accept one connection and collect every null-terminated command frame.
async fn fake_openocd(reply: Reply) -> (u16, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = tokio::spawn(async move {
        let (sock, _) = listener.accept().await.unwrap();
        let mut reader = BufReader::new(sock);
        let mut commands = Vec::new();

        loop {
            let mut frame = Vec::new();
            let n = reader.read_until(0, &mut frame).await.unwrap_or(0);
            if n == 0 {
                break;
            }
            let complete = frame.last() == Some(&0);
            if complete {
                frame.pop();
            }
            commands.push(String::from_utf8(frame).unwrap());
            if !complete {
                break;
            }

            match reply {
                Reply::Echo => {
                    let _ = reader.get_mut().write_all(b"\x1a").await;
                }
                Reply::Silent => {}
                Reply::Truncate => {
                    let _ = reader.get_mut().write_all(b"target state: ha").await;
                    break;
                }
            }
        }
        commands
    });

    (port, handle)
}

fn config(mode: Mode, port: u16, elftool: &Path) -> Config {
    Config {
        mode,
        sweetada_path: PathBuf::from("/work/sweetada"),
        libutils_directory: PathBuf::from("libutils"),
        openocd_prefix: PathBuf::from("/nonexistent/openocd_prefix_12345"),
        openocd_cfg_file: PathBuf::from("/work/sweetada/platforms/FRDM-KL46Z/openocd.cfg"),
        elftool: elftool.to_path_buf(),
        kernel_outfile: PathBuf::from("/work/sweetada/kernel.o"),
        rpc_host: "127.0.0.1".to_string(),
        rpc_port: port,
        start_symbol: "_start".to_string(),
        rpc_timeout: None,
    }
}

#[cfg(unix)]
fn fake_elftool(dir: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("elftool");
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

// --- Config ---

#[test]
fn test_config_from_legacy_cli() {
    let args = Args::parse_from(normalize_args([
        "openocd-loader", "-server",
        "--sweetada-path", "/work/sweetada",
        "--libutils-directory", "libutils",
        "--openocd-prefix", "/opt/openocd",
        "--platform-directory", "platforms/FRDM-KL46Z",
        "--elftool", "/usr/local/bin/elftool",
        "--kernel-outfile", "kernel.o",
    ]));
    let config = Config::from_args(&args);
    assert_eq!(config.mode, Mode::Server);
    assert_eq!(config.rpc_port, 6666);
    assert_eq!(
        config.openocd_cfg_file,
        PathBuf::from("/work/sweetada/platforms/FRDM-KL46Z/openocd.cfg")
    );
}

// --- Server mode ---

#[tokio::test]
async fn test_server_mode_unrecognized_platform_does_no_rpc() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let config = config(Mode::Server, port, Path::new("elftool"));
    let err = session::start_server(&config, "plan9").unwrap_err();
    assert!(matches!(err, LoaderError::Configuration(_)));
    assert!(err.to_string().contains("platform not recognized"));
    assert_eq!(err.exit_code(), 1);

    // nobody knocked on the RPC port
    let accepted = tokio::time::timeout(
        std::time::Duration::from_millis(100),
        listener.accept(),
    )
    .await;
    assert!(accepted.is_err());
}

// --- Shutdown mode ---

#[tokio::test]
async fn test_shutdown_sends_single_command() {
    let (port, server) = fake_openocd(Reply::Silent).await;

    let config = config(Mode::Shutdown, port, Path::new("/nonexistent/elftool_12345"));
    session::run(&config).await.unwrap();

    assert_eq!(server.await.unwrap(), vec!["shutdown".to_string()]);
}

// --- Load mode ---

#[cfg(unix)]
#[tokio::test]
async fn test_load_sequence_with_odd_entry() {
    let dir = tempfile::tempdir().unwrap();
    let tool = fake_elftool(dir.path(), "echo 0x1001");
    let (port, server) = fake_openocd(Reply::Echo).await;

    let config = config(Mode::Load, port, &tool);
    let mut load = LoadSession::new(&config);
    let address = load.run().await.unwrap();

    assert_eq!(address, 0x1000);
    assert_eq!(load.state(), SessionState::Disconnected);
    assert_eq!(
        server.await.unwrap(),
        vec![
            "halt".to_string(),
            "load_image /work/sweetada/kernel.o".to_string(),
            "resume 0x1000".to_string(),
        ]
    );
}

#[cfg(unix)]
#[tokio::test]
async fn test_load_sequence_with_even_entry() {
    let dir = tempfile::tempdir().unwrap();
    let tool = fake_elftool(dir.path(), "echo '  0x00002000  '");
    let (port, server) = fake_openocd(Reply::Echo).await;

    let config = config(Mode::Load, port, &tool);
    let address = LoadSession::new(&config).run().await.unwrap();

    assert_eq!(address, 0x2000);
    let commands = server.await.unwrap();
    assert_eq!(commands.last().unwrap(), "resume 0x2000");
}

#[cfg(unix)]
#[tokio::test]
async fn test_load_stops_when_elftool_fails() {
    let dir = tempfile::tempdir().unwrap();
    let tool = fake_elftool(dir.path(), "echo 'symbol _start not found' >&2\nexit 1");
    let (port, server) = fake_openocd(Reply::Echo).await;

    let config = config(Mode::Load, port, &tool);
    let mut load = LoadSession::new(&config);
    let err = load.run().await.unwrap_err();

    assert!(matches!(err, LoaderError::ToolInvocation(_)));
    assert_eq!(load.state(), SessionState::Failed);
    drop(load);
    // connection dropped before any command went out
    assert!(server.await.unwrap().is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn test_load_fails_on_truncated_response() {
    let dir = tempfile::tempdir().unwrap();
    let tool = fake_elftool(dir.path(), "echo 0x08000131");
    let (port, server) = fake_openocd(Reply::Truncate).await;

    let config = config(Mode::Load, port, &tool);
    let mut load = LoadSession::new(&config);
    let err = load.run().await.unwrap_err();

    assert!(matches!(err, LoaderError::Protocol(_)));
    assert_eq!(load.state(), SessionState::Failed);
    assert_eq!(server.await.unwrap(), vec!["halt".to_string()]);
}
