//! Cancellation aware handle to a running compiler process.

use std::ffi::OsString;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

/// How a compiler process finished.
#[derive(Debug)]
pub(crate) enum Outcome {
    /// The process exited on its own.
    Exited(ExitStatus),
    /// The [`CancellationToken`] fired and the process was terminated.
    Cancelled,
    /// The process ran longer than its timeout and was terminated.
    TimedOut(Duration),
}

/// A spawned compiler whose standard streams are inherited from our process.
#[derive(Debug)]
pub(crate) struct CompilerProcess {
    child: Child,
    /// Time to wait after a graceful termination request before killing the process.
    kill_grace: Duration,
}

impl CompilerProcess {
    /// Launch `args[0]` with the remaining arguments.
    pub(crate) fn spawn(args: &[OsString], kill_grace: Duration) -> std::io::Result<Self> {
        let (program, rest) = args.split_first().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command line")
        })?;

        let child = Command::new(program)
            .args(rest)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;
        tracing::debug!(pid = child.id(), "launched thrift compiler");

        Ok(CompilerProcess { child, kill_grace })
    }

    /// Wait for the process to exit, terminating it if `cancel` fires or `timeout` elapses.
    ///
    /// When this returns the process has always been reaped.
    pub(crate) async fn wait(
        mut self,
        cancel: &CancellationToken,
        timeout: Option<Duration>,
    ) -> std::io::Result<Outcome> {
        let deadline = async {
            match timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending().await,
            }
        };

        let outcome = tokio::select! {
            status = self.child.wait() => Outcome::Exited(status?),
            () = cancel.cancelled() => Outcome::Cancelled,
            () = deadline => Outcome::TimedOut(timeout.unwrap_or_default()),
        };

        if !matches!(outcome, Outcome::Exited(_)) {
            // The outcome stands even if the compiler could not be stopped.
            if let Err(err) = self.terminate().await {
                tracing::warn!(%err, "failed to terminate thrift compiler");
            }
        }
        Ok(outcome)
    }

    /// Ask the process to exit, escalating to a kill after the grace period.
    async fn terminate(&mut self) -> std::io::Result<()> {
        if self.request_exit() {
            match tokio::time::timeout(self.kill_grace, self.child.wait()).await {
                Ok(status) => {
                    tracing::debug!(?status, "thrift compiler exited after termination request");
                    return Ok(());
                }
                Err(_elapsed) => {
                    tracing::warn!(
                        grace = ?self.kill_grace,
                        "thrift compiler ignored termination request, killing"
                    );
                }
            }
        }

        // `kill` also reaps the process.
        self.child.kill().await
    }

    /// Sends SIGTERM, returns false if there is no process to signal.
    #[cfg(unix)]
    fn request_exit(&self) -> bool {
        let Some(pid) = self.child.id() else {
            return false;
        };
        let Ok(pid) = libc::pid_t::try_from(pid) else {
            return false;
        };

        // SAFETY: `pid` belongs to a child we spawned and have not reaped yet, so it cannot
        // have been recycled for an unrelated process.
        let result = unsafe { libc::kill(pid, libc::SIGTERM) };
        if result != 0 {
            let err = std::io::Error::last_os_error();
            tracing::warn!(pid, %err, "failed to send SIGTERM to thrift compiler");
            return false;
        }
        true
    }

    /// No graceful termination outside of unix, go straight to killing.
    #[cfg(not(unix))]
    fn request_exit(&self) -> bool {
        false
    }
}
