//! Infrastructure implementation of the `RemoteConnector` and `RemoteShell`
//! ports over libssh2.
//!
//! libssh2 is blocking, so every call runs on `tokio::task::spawn_blocking`
//! against a session shared behind a mutex. Rendered command lines may carry
//! credentials and are never logged; only the program name is.
//!
//! A caller deadline set through `RemoteShell::set_deadline` becomes the
//! libssh2 timeout of each command, so a stuck remote fails with
//! `LIBSSH2_ERROR_TIMEOUT` instead of pinning a blocking thread.

use std::io::Read;
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use ssh2::{ErrorCode, Session};

use crate::application::ports::{RemoteConnector, RemoteShell, SshTarget};
use crate::domain::{RemoteCommand, TransportError};

/// `LIBSSH2_ERROR_TIMEOUT`.
const LIBSSH2_ERROR_TIMEOUT: i32 = -9;

/// Opens libssh2 sessions authenticated with a private key file.
#[derive(Debug, Default, Clone, Copy)]
pub struct Ssh2Connector;

/// One authenticated libssh2 session.
#[derive(Clone)]
pub struct Ssh2Session {
    inner: Arc<Mutex<Session>>,
    target: String,
    deadline: Arc<Mutex<Option<Instant>>>,
}

impl RemoteConnector for Ssh2Connector {
    type Session = Ssh2Session;

    async fn open(&self, target: &SshTarget) -> Result<Ssh2Session> {
        let target = target.clone();
        tokio::task::spawn_blocking(move || connect_sync(&target))
            .await
            .context("ssh connect task panicked")?
    }
}

fn connect_sync(target: &SshTarget) -> Result<Ssh2Session> {
    let label = format!("{}:{}", target.host, target.port);
    let addr = (target.host.as_str(), target.port)
        .to_socket_addrs()
        .with_context(|| format!("resolving {label}"))?
        .next()
        .ok_or_else(|| TransportError::Connect {
            target: label.clone(),
            reason: "no address resolved".to_string(),
        })?;

    let tcp = TcpStream::connect_timeout(&addr, target.connect_timeout)
        .map_err(|err| io_error(&label, "connecting", &err))?;

    let mut session = Session::new().context("initializing ssh session")?;
    session.set_tcp_stream(tcp);
    session.set_timeout(millis(target.connect_timeout));
    session
        .handshake()
        .map_err(|err| ssh_error(&label, "handshake", err))?;

    // Fresh VMs have unknown host keys; the key is not checked.
    session
        .userauth_pubkey_file(
            &target.user,
            None,
            &target.private_key,
            target.passphrase.as_deref(),
        )
        .map_err(|err| {
            if is_libssh2_timeout(&err) {
                timed_out(&label, "authenticating")
            } else {
                TransportError::Authentication {
                    target: label.clone(),
                    reason: err.message().to_string(),
                }
            }
        })?;
    if !session.authenticated() {
        return Err(TransportError::Authentication {
            target: label,
            reason: "server rejected the key".to_string(),
        }
        .into());
    }

    // Each command sets its own timeout from the session deadline.
    session.set_timeout(0);
    tracing::debug!(host = %label, user = %target.user, "ssh session established");
    Ok(Ssh2Session {
        inner: Arc::new(Mutex::new(session)),
        target: label,
        deadline: Arc::new(Mutex::new(None)),
    })
}

/// Exit status and stderr of one remote command.
struct Exit {
    status: i32,
    stderr: String,
}

impl Ssh2Session {
    async fn run(&self, command: &RemoteCommand) -> Result<Exit> {
        let deadline = *self
            .deadline
            .lock()
            .map_err(|_| anyhow::anyhow!("ssh deadline lock poisoned"))?;
        let timeout = command_timeout(deadline, Instant::now())
            .ok_or_else(|| timed_out(&self.target, "running command"))?;
        let inner = Arc::clone(&self.inner);
        let target = self.target.clone();
        let line = command.render();
        tracing::debug!(host = %self.target, program = command.program(), timeout_ms = timeout, "running remote command");
        tokio::task::spawn_blocking(move || run_sync(&inner, &target, &line, timeout))
            .await
            .context("ssh command task panicked")?
    }
}

/// libssh2 timeout in milliseconds for a command started at `now`, where 0
/// means unbounded. `None` once the deadline has passed.
fn command_timeout(deadline: Option<Instant>, now: Instant) -> Option<u32> {
    let Some(deadline) = deadline else {
        return Some(0);
    };
    let remaining = deadline.saturating_duration_since(now);
    if remaining.is_zero() {
        return None;
    }
    Some(millis(remaining).max(1))
}

fn run_sync(inner: &Mutex<Session>, target: &str, line: &str, timeout_ms: u32) -> Result<Exit> {
    let session = inner
        .lock()
        .map_err(|_| anyhow::anyhow!("ssh session lock poisoned"))?;
    session.set_timeout(timeout_ms);
    let mut channel = session
        .channel_session()
        .map_err(|err| ssh_error(target, "opening channel", err))?;
    channel
        .exec(line)
        .map_err(|err| ssh_error(target, "executing command", err))?;

    let mut stdout = String::new();
    channel
        .read_to_string(&mut stdout)
        .map_err(|err| io_error(target, "reading output", &err))?;
    let mut stderr = String::new();
    channel
        .stderr()
        .read_to_string(&mut stderr)
        .map_err(|err| io_error(target, "reading output", &err))?;
    channel
        .wait_close()
        .map_err(|err| ssh_error(target, "closing channel", err))?;
    let status = channel
        .exit_status()
        .map_err(|err| ssh_error(target, "reading exit status", err))?;
    Ok(Exit { status, stderr })
}

impl RemoteShell for Ssh2Session {
    async fn execute(&self, command: &RemoteCommand) -> Result<()> {
        let exit = self.run(command).await?;
        if exit.status == 0 {
            return Ok(());
        }
        Err(TransportError::CommandFailed {
            command: command.program().to_string(),
            status: exit.status,
            stderr: exit.stderr.trim().to_string(),
        }
        .into())
    }

    async fn test(&self, command: &RemoteCommand) -> Result<bool> {
        Ok(self.run(command).await?.status == 0)
    }

    fn set_deadline(&self, deadline: Option<Instant>) {
        if let Ok(mut slot) = self.deadline.lock() {
            *slot = deadline;
        }
    }
}

// ── Error mapping ─────────────────────────────────────────────────────────────

fn timed_out(target: &str, operation: &str) -> TransportError {
    TransportError::Timeout {
        operation: format!("{operation} ({target})"),
    }
}

fn is_libssh2_timeout(err: &ssh2::Error) -> bool {
    matches!(err.code(), ErrorCode::Session(LIBSSH2_ERROR_TIMEOUT))
}

fn ssh_error(target: &str, operation: &str, err: ssh2::Error) -> TransportError {
    if is_libssh2_timeout(&err) {
        return timed_out(target, operation);
    }
    let io: std::io::Error = err.into();
    io_error(target, operation, &io)
}

fn io_error(target: &str, operation: &str, err: &std::io::Error) -> TransportError {
    match err.kind() {
        std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => {
            timed_out(target, operation)
        }
        _ => TransportError::Connect {
            target: target.to_string(),
            reason: format!("{operation}: {err}"),
        },
    }
}

fn millis(duration: Duration) -> u32 {
    u32::try_from(duration.as_millis()).unwrap_or(u32::MAX)
}
