//! Mock generator node.
//!
//! Implements the external generator executable's contract without
//! generating anything real: it parses the standard node flags, connects
//! back to the driver's data channel, reports progress over HTTP, and
//! streams a deterministic record sequence. The integration tests install
//! it as `bin/<name>-node` inside a throwaway install tree; it also works as
//! a smoke tool for checking an install layout end to end.
//!
//! Behavior is configured through `mock.*` keys in the install's
//! `config/<name>-node.properties` file:
//!
//! - `mock.line-count`     records to stream per partition (default 1000)
//! - `mock.progress`       comma-separated progress reports (default `0.5,1.0`)
//! - `mock.skip-connect`   exit immediately without connecting when `true`
//! - `mock.binary-noise`   emit a non-UTF-8 stdout line before streaming when `true`

use std::collections::HashMap;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::net::{Shutdown, TcpStream};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;

use dgen_driver::params::properties::load_properties;

/// Mock data generator node (stands in for a real `<name>-node` executable)
#[derive(Debug, Parser)]
#[command(name = "dgen-mock-node")]
struct Args {
    /// Scaling factor
    #[arg(short = 's')]
    scaling_factor: f64,

    /// Partition index of this node
    #[arg(short = 'i')]
    partition_index: u16,

    /// Total partition count
    #[arg(short = 'N')]
    partition_count: u16,

    /// Dataset ID
    #[arg(short = 'm')]
    dataset_id: String,

    /// Stage to generate
    #[arg(short = 'x')]
    stage: String,

    /// Output base path (unused when streaming to a socket)
    #[arg(short = 'o')]
    output_base: PathBuf,

    /// Output target, e.g. `socket[4242]`
    #[arg(short = 't')]
    target: String,

    /// Progress report host
    #[arg(short = 'H')]
    progress_host: Option<String>,

    /// Progress report port
    #[arg(short = 'P')]
    progress_port: Option<u16>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = mock_config()?;

    if config
        .get("mock.skip-connect")
        .is_some_and(|v| v == "true")
    {
        println!("mock node: skip-connect set, exiting without connecting");
        return Ok(());
    }

    let data_port = parse_socket_target(&args.target)?;
    let line_count: u64 = config
        .get("mock.line-count")
        .map(|v| v.parse().context("bad mock.line-count"))
        .transpose()?
        .unwrap_or(1000);
    let progress_reports: Vec<String> = config
        .get("mock.progress")
        .map(String::as_str)
        .unwrap_or("0.5,1.0")
        .split(',')
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect();

    println!(
        "mock node starting: stage {} partition {}/{} -> {} (output base {})",
        args.stage,
        args.partition_index,
        args.partition_count,
        args.target,
        args.output_base.display()
    );

    if config.get("mock.binary-noise").is_some_and(|v| v == "true") {
        // Raw bytes a real native generator may dump on stdout. The pause
        // gives the driver's drain side time to see them before any records
        // flow.
        let mut stdout = std::io::stdout();
        stdout.write_all(&[0xff, 0xfe, b'\n'])?;
        stdout.flush()?;
        std::thread::sleep(std::time::Duration::from_millis(200));
    }

    let stream = TcpStream::connect(("127.0.0.1", data_port))
        .with_context(|| format!("connecting to data channel on port {data_port}"))?;
    let mut writer = BufWriter::new(stream.try_clone()?);

    if let Some(first) = progress_reports.first() {
        report_progress(&args, first);
    }

    for record in 0..line_count {
        writeln!(
            writer,
            "{}|{}|{}",
            args.stage, args.partition_index, record
        )?;
        if record % 256 == 0 {
            // Stdout noise the driver is expected to drain.
            println!(
                "mock node {}/{}: generated {record} records",
                args.partition_index, args.partition_count
            );
        }
    }
    writer.flush()?;

    for value in progress_reports.iter().skip(1) {
        report_progress(&args, value);
    }

    drop(writer);
    stream.shutdown(Shutdown::Both)?;
    println!(
        "mock node {}/{}: done, {line_count} records for stage {} of {} (sf {})",
        args.partition_index,
        args.partition_count,
        args.stage,
        args.dataset_id,
        args.scaling_factor
    );
    Ok(())
}

/// Load `mock.*` settings from the install tree this binary lives in.
///
/// The executable sits at `<install>/bin/<name>-node`, so the properties
/// file is at `<install>/config/<name>-node.properties`.
fn mock_config() -> Result<HashMap<String, String>> {
    let exe = std::env::current_exe().context("locating own executable")?;
    let Some(bin_dir) = exe.parent() else {
        return Ok(HashMap::new());
    };
    let Some(install_dir) = bin_dir.parent() else {
        return Ok(HashMap::new());
    };
    let Some(name) = exe.file_name().and_then(|n| n.to_str()) else {
        return Ok(HashMap::new());
    };
    let properties = install_dir
        .join("config")
        .join(format!("{name}.properties"));
    if !properties.is_file() {
        return Ok(HashMap::new());
    }
    load_properties(&properties).context("reading mock properties")
}

/// Parse a `socket[<port>]` output target.
fn parse_socket_target(target: &str) -> Result<u16> {
    let port = target
        .strip_prefix("socket[")
        .and_then(|rest| rest.strip_suffix(']'))
        .and_then(|port| port.parse().ok());
    match port {
        Some(port) => Ok(port),
        None => bail!("unsupported output target `{target}`, expected socket[<port>]"),
    }
}

/// Fire one progress report at the driver's progress channel.
///
/// Failures are ignored: progress is advisory and a real generator keeps
/// producing data even when its reports go unanswered.
fn report_progress(args: &Args, value: &str) {
    let (Some(host), Some(port)) = (args.progress_host.as_deref(), args.progress_port) else {
        return;
    };
    let Ok(mut stream) = TcpStream::connect((host, port)) else {
        return;
    };
    let request =
        format!("HEAD /?progress={value} HTTP/1.1\r\nHost: {host}\r\nConnection: close\r\n\r\n");
    if stream.write_all(request.as_bytes()).is_err() {
        return;
    }
    // Wait for the acknowledgment so the report is ordered before whatever
    // this node does next.
    let mut reader = BufReader::new(stream);
    let mut status_line = String::new();
    let _ = reader.read_line(&mut status_line);
}
