//! Node-local bridge to one generator subprocess.
//!
//! A [`GeneratorBridge`] owns every OS resource involved in running one
//! (stage, partition) generation task: the subprocess handle, the listening
//! socket for the data channel, the accepted peer socket with its buffered
//! line reader, the stdout drain thread, and the progress channel. Its
//! lifecycle is `uninitialized -> starting -> streaming -> closed`, with a
//! single transition path; a bridge that fails while starting runs the same
//! teardown as a normal close and surfaces a typed error, so no exit path
//! leaks a partially opened resource.
//!
//! Bridges are self-contained: concurrent bridges on one host share no state
//! and cannot collide on ports, because both channels bind port 0 and pass
//! the OS-assigned ports to the subprocess on its command line.

use std::io::{self, BufRead, BufReader};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::BridgeError;
use crate::params::TaskParameters;
use crate::progress::ProgressChannel;

/// Generator throughput is high; small reads would add syscall overhead.
const READ_BUFFER_BYTES: usize = 4 * 1024 * 1024;

/// Bounded grace applied to the shutdown waits in `close()`.
const CLOSE_GRACE: Duration = Duration::from_secs(3);

/// Poll interval for the accept loop and the shutdown waits.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Handle to a running generator subprocess streaming records back over TCP.
#[derive(Debug)]
pub struct GeneratorBridge {
    partition: u16,
    stage: String,
    child: Option<Child>,
    listener: Option<TcpListener>,
    /// Clone of the accepted peer socket, kept so `close()` can shut the
    /// connection down and unblock a pending read.
    peer: Option<TcpStream>,
    reader: Option<BufReader<TcpStream>>,
    progress: Option<ProgressChannel>,
    drain: Option<JoinHandle<()>>,
    closed: bool,
}

impl GeneratorBridge {
    /// Launch the generator described by `params` and connect its channels.
    ///
    /// Steps, in order: bind the data listener, start the progress channel,
    /// spawn the subprocess, accept its connection back, wrap the stream in
    /// a buffered line reader, start the stdout drain thread. A failure at
    /// any step tears down everything opened so far and returns the error
    /// for that step; nothing is retried here — retry policy belongs to the
    /// job layer, which can simply call `open` again.
    pub fn open(params: &TaskParameters) -> Result<Self, BridgeError> {
        let mut bridge = Self {
            partition: params.partition_index(),
            stage: params.stage().to_string(),
            child: None,
            listener: None,
            peer: None,
            reader: None,
            progress: None,
            drain: None,
            closed: false,
        };
        match bridge.start(params) {
            Ok(()) => Ok(bridge),
            Err(e) => {
                bridge.close();
                Err(e)
            }
        }
    }

    fn start(&mut self, params: &TaskParameters) -> Result<(), BridgeError> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).map_err(BridgeError::Bind)?;
        let data_port = listener.local_addr().map_err(BridgeError::Bind)?.port();
        self.listener = Some(listener);

        let progress = ProgressChannel::start().map_err(BridgeError::Progress)?;
        let progress_host = progress.host();
        let progress_port = progress.port();
        self.progress = Some(progress);

        let mut command = generator_command(params, data_port, progress_host, progress_port);
        debug!(
            partition = self.partition,
            stage = %self.stage,
            command = %render_command(&command),
            "launching generator"
        );
        let child = command.spawn().map_err(|source| BridgeError::Launch {
            command: render_command(&command),
            source,
        })?;
        self.child = Some(child);

        let listener = self.listener.as_ref().ok_or_else(missing_resource)?;
        let child = self.child.as_mut().ok_or_else(missing_resource)?;
        let stream = accept_data_connection(listener, child)?;
        let peer = stream.try_clone().map_err(BridgeError::StreamOpen)?;
        self.peer = Some(peer);
        self.reader = Some(BufReader::with_capacity(READ_BUFFER_BYTES, stream));

        let stdout = self
            .child
            .as_mut()
            .and_then(|child| child.stdout.take())
            .ok_or_else(|| {
                BridgeError::StreamOpen(io::Error::new(
                    io::ErrorKind::Other,
                    "generator stdout was not captured",
                ))
            })?;
        let drain = thread::Builder::new()
            .name(format!("dgen-drain-{}", self.partition))
            .spawn(move || drain_stdout(stdout))
            .map_err(BridgeError::StreamOpen)?;
        self.drain = Some(drain);

        debug!(partition = self.partition, stage = %self.stage, "generator bridge streaming");
        Ok(())
    }

    /// Pull the next record line from the data channel.
    ///
    /// Blocks until a line is available. Returns `Ok(None)` when the
    /// generator closes the connection (end of stream) and on an already
    /// closed bridge; read failures propagate to the caller, and the bridge
    /// makes no attempt to resume or reconnect. There is deliberately no
    /// timeout here: a stalled generator stalls its consumer, and bounded
    /// waits are confined to `close()`.
    pub fn next_line(&mut self) -> io::Result<Option<String>> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(None);
        };
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }
        Ok(Some(line))
    }

    /// Latest progress fraction the generator reported, or `None` if no
    /// report has arrived yet. Never blocks.
    pub fn progress(&self) -> Option<f64> {
        self.progress.as_ref().and_then(ProgressChannel::latest)
    }

    /// Tear down every resource the bridge owns, in acquisition-reverse
    /// order where it matters for unblocking reads.
    ///
    /// Idempotent: later calls return immediately. Individual step failures
    /// are logged and never abort the remaining steps, so `close()` always
    /// completes and never reports an error to its caller.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        debug!(partition = self.partition, stage = %self.stage, "closing generator bridge");

        // Give the generator a chance to exit cleanly: wait for the drain
        // thread (it finishes when the child closes its stdout) up to the
        // grace bound, then keep the handle for the final join below.
        if let Some(drain) = self.drain.as_ref() {
            let deadline = Instant::now() + CLOSE_GRACE;
            while !drain.is_finished() && Instant::now() < deadline {
                thread::sleep(POLL_INTERVAL);
            }
        }

        // Reap the child cooperatively; kill only once the grace expires.
        if let Some(mut child) = self.child.take() {
            self.reap(&mut child);
        }

        // Close the line reader, then shut the peer socket down; the
        // shutdown unblocks any read still pending on another thread.
        drop(self.reader.take());
        if let Some(peer) = self.peer.take() {
            if let Err(e) = peer.shutdown(Shutdown::Both) {
                debug!(partition = self.partition, "peer socket shutdown: {e}");
            }
        }

        if let Some(mut progress) = self.progress.take() {
            progress.stop();
        }

        drop(self.listener.take());

        // The drain thread must be fully terminated before close returns.
        if let Some(drain) = self.drain.take() {
            if drain.join().is_err() {
                warn!(partition = self.partition, "stdout drain thread panicked");
            }
        }
    }

    fn reap(&self, child: &mut Child) {
        let deadline = Instant::now() + CLOSE_GRACE;
        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    debug!(partition = self.partition, %status, "generator exited");
                    return;
                }
                Ok(None) if Instant::now() < deadline => thread::sleep(POLL_INTERVAL),
                Ok(None) => break,
                Err(e) => {
                    warn!(partition = self.partition, "failed to poll generator exit: {e}");
                    return;
                }
            }
        }
        warn!(
            partition = self.partition,
            stage = %self.stage,
            "generator still running after close grace period, killing it"
        );
        if let Err(e) = child.kill() {
            warn!(partition = self.partition, "failed to kill generator: {e}");
        }
        match child.wait() {
            Ok(status) => debug!(partition = self.partition, %status, "generator reaped"),
            Err(e) => warn!(partition = self.partition, "failed to reap generator: {e}"),
        }
    }
}

impl Drop for GeneratorBridge {
    fn drop(&mut self) {
        self.close();
    }
}

/// Build the generator invocation for one (stage, partition) task.
///
/// The `-t socket[<port>]` token directs the generator to stream records to
/// the bridge's data channel instead of writing files; `-H`/`-P` tell it
/// where to send progress reports.
fn generator_command(
    params: &TaskParameters,
    data_port: u16,
    progress_host: &str,
    progress_port: u16,
) -> Command {
    let mut command = Command::new(params.executable());
    command
        .arg("-s")
        .arg(params.scaling_factor().to_string())
        .arg("-i")
        .arg(params.partition_index().to_string())
        .arg("-N")
        .arg(params.partition_count().to_string())
        .arg("-m")
        .arg(params.dataset_id())
        .arg("-x")
        .arg(params.stage())
        .arg("-o")
        .arg(params.output_base())
        .arg("-t")
        .arg(format!("socket[{data_port}]"))
        .arg("-H")
        .arg(progress_host)
        .arg("-P")
        .arg(progress_port.to_string())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit());
    command
}

fn render_command(command: &Command) -> String {
    std::iter::once(command.get_program())
        .chain(command.get_args())
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

fn missing_resource() -> BridgeError {
    BridgeError::StreamOpen(io::Error::new(
        io::ErrorKind::Other,
        "bridge resource went missing during startup",
    ))
}

/// Wait for the generator to connect back to the data channel.
///
/// The accept is polled rather than blocking so a generator that dies
/// before connecting turns into an `Accept` error instead of hanging the
/// caller forever. A live generator that is merely slow keeps the loop
/// waiting; steady-state has no timeouts.
fn accept_data_connection(
    listener: &TcpListener,
    child: &mut Child,
) -> Result<TcpStream, BridgeError> {
    listener.set_nonblocking(true).map_err(BridgeError::Accept)?;
    let stream = loop {
        match listener.accept() {
            Ok((stream, addr)) => {
                debug!(%addr, "generator connected to data channel");
                break stream;
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                if let Ok(Some(status)) = child.try_wait() {
                    // A fast generator can connect, write and exit between
                    // the accept poll and the exit check, leaving its valid
                    // connection in the listen backlog.
                    match listener.accept() {
                        Ok((stream, addr)) => {
                            debug!(%addr, "generator connected to data channel");
                            break stream;
                        }
                        Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                            return Err(BridgeError::Accept(io::Error::new(
                                io::ErrorKind::ConnectionAborted,
                                format!("generator exited with {status} before connecting"),
                            )));
                        }
                        Err(e) => return Err(BridgeError::Accept(e)),
                    }
                }
                thread::sleep(POLL_INTERVAL);
            }
            Err(e) => return Err(BridgeError::Accept(e)),
        }
    };
    let _ = listener.set_nonblocking(false);
    stream.set_nonblocking(false).map_err(BridgeError::Accept)?;
    Ok(stream)
}

/// Continuously discard the generator's stdout so it can never block on a
/// full pipe. Stdout carries arbitrary native-process noise, not
/// necessarily UTF-8, so it is drained as raw bytes. Runs until the child
/// closes its end.
fn drain_stdout(mut stdout: ChildStdout) {
    let _ = io::copy(&mut stdout, &mut io::sink());
}
