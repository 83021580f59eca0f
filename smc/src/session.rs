/*!
Controller session lifecycle.

A [`Session`] owns one connection handle for its whole life. The handle is
moved onto a dedicated worker thread; the session hands it one request at a
time over a channel and waits for the reply, optionally bounded by a
timeout. Exclusive `&mut self` access means one call is in flight at most.
Sharing a session between threads needs a `Mutex<Session>` around it.

A call that exceeds its timeout poisons the session: the worker is detached
(it releases the handle once the stuck call returns) and every later call
fails with [`SmcError::SessionClosed`].
*/

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::fmt;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, trace, warn};

use crate::error::{Result, SmcError};
use crate::frame::KeyDataFrame;
use crate::protocol::{DEFAULT_CALL_TIMEOUT, SERVICE_NAME};
use crate::transport::SmcTransport;

/// How to locate the controller and how long a call may take
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOptions {
    /// Service class to discover
    pub service_name: String,

    /// Bound on each call; `None` blocks indefinitely
    pub call_timeout: Option<Duration>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            service_name: SERVICE_NAME.to_string(),
            call_timeout: Some(DEFAULT_CALL_TIMEOUT),
        }
    }
}

enum Command {
    Call { selector: u32, input: KeyDataFrame },
    Close,
}

enum Reply {
    Frame(Result<KeyDataFrame>),
    Closed(Result<()>),
}

struct Worker {
    commands: Sender<Command>,
    replies: Receiver<Reply>,
    handle: JoinHandle<()>,
}

/// An open connection to the controller
pub struct Session {
    worker: Option<Worker>,
    call_timeout: Option<Duration>,
    calls: u64,
}

impl Session {
    /// Discover the controller service and connect with default options
    pub fn open() -> Result<Self> {
        Self::open_with(&SessionOptions::default())
    }

    /// Discover `options.service_name` and connect to its first instance
    #[cfg(target_os = "macos")]
    pub fn open_with(options: &SessionOptions) -> Result<Self> {
        let transport = crate::iokit::IoKitTransport::connect(&options.service_name)?;
        Self::with_transport(transport, options.call_timeout)
    }

    /// Discover `options.service_name` and connect to its first instance
    ///
    /// Only macOS exposes the controller; elsewhere discovery finds nothing.
    #[cfg(not(target_os = "macos"))]
    pub fn open_with(options: &SessionOptions) -> Result<Self> {
        debug!("No IOKit service registry on this platform");
        Err(SmcError::service_not_found(&options.service_name))
    }

    /// Wrap an already-connected transport in a session
    pub fn with_transport<T: SmcTransport>(
        transport: T,
        call_timeout: Option<Duration>,
    ) -> Result<Self> {
        let (command_tx, command_rx) = bounded(1);
        let (reply_tx, reply_rx) = bounded(1);

        let handle = thread::Builder::new()
            .name("smc-session".to_string())
            .spawn(move || run_worker(transport, command_rx, reply_tx))
            .map_err(|e| SmcError::worker(format!("failed to spawn session worker: {}", e)))?;

        debug!(?call_timeout, "SMC session opened");

        Ok(Self {
            worker: Some(Worker {
                commands: command_tx,
                replies: reply_rx,
                handle,
            }),
            call_timeout,
            calls: 0,
        })
    }

    /// True until the session is closed or poisoned
    pub fn is_open(&self) -> bool {
        self.worker.is_some()
    }

    /// Number of calls completed on this session
    pub fn call_count(&self) -> u64 {
        self.calls
    }

    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout
    }

    /// Exchange one request frame for one response frame
    pub fn call(&mut self, selector: u32, input: &KeyDataFrame) -> Result<KeyDataFrame> {
        self.send(Command::Call {
            selector,
            input: *input,
        })?;

        match self.wait_reply()? {
            Reply::Frame(result) => {
                self.calls += 1;
                result
            }
            Reply::Closed(_) => Err(SmcError::worker("unexpected close reply")),
        }
    }

    /// Release the connection handle
    ///
    /// Only the first close reaches the transport; later closes return `Ok`.
    pub fn close(&mut self) -> Result<()> {
        if self.worker.is_none() {
            return Ok(());
        }

        self.send(Command::Close)?;
        let reply = self.wait_reply();

        if let Some(worker) = self.worker.take() {
            worker
                .handle
                .join()
                .map_err(|_| SmcError::worker("session worker panicked"))?;
        }

        match reply? {
            Reply::Closed(result) => {
                debug!(calls = self.calls, "SMC session closed");
                result
            }
            Reply::Frame(_) => Err(SmcError::worker("unexpected call reply")),
        }
    }

    fn send(&mut self, command: Command) -> Result<()> {
        let worker = self.worker.as_ref().ok_or(SmcError::SessionClosed)?;
        if worker.commands.send(command).is_err() {
            let err = SmcError::worker("session worker exited");
            self.abandon(&err);
            return Err(err);
        }
        Ok(())
    }

    fn wait_reply(&mut self) -> Result<Reply> {
        let worker = self.worker.as_ref().ok_or(SmcError::SessionClosed)?;

        let received = match self.call_timeout {
            Some(limit) => worker.replies.recv_timeout(limit).map_err(|e| match e {
                RecvTimeoutError::Timeout => SmcError::Timeout(limit),
                RecvTimeoutError::Disconnected => SmcError::worker("session worker exited"),
            }),
            None => worker
                .replies
                .recv()
                .map_err(|_| SmcError::worker("session worker exited")),
        };

        if let Err(err) = &received {
            self.abandon(err);
        }
        received
    }

    /// Detach the worker; it closes the transport once its current call ends
    fn abandon(&mut self, reason: &SmcError) {
        if self.worker.take().is_some() {
            warn!("Abandoning SMC session: {}", reason);
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Failed to close SMC session: {}", e);
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("open", &self.is_open())
            .field("call_timeout", &self.call_timeout)
            .field("calls", &self.calls)
            .finish()
    }
}

/// Worker loop: owns the transport and serves one command at a time
fn run_worker<T: SmcTransport>(
    mut transport: T,
    commands: Receiver<Command>,
    replies: Sender<Reply>,
) {
    for command in commands.iter() {
        match command {
            Command::Call { selector, input } => {
                trace!(selector, key = %input.sensor_key(), data8 = input.data8, "SMC call");
                let result = transport.call(selector, &input);
                if replies.send(Reply::Frame(result)).is_err() {
                    break;
                }
            }
            Command::Close => {
                let result = transport.close();
                // Nobody is waiting if the close itself timed out
                if let Err(unsent) = replies.send(Reply::Closed(result)) {
                    if let Reply::Closed(Err(e)) = unsent.into_inner() {
                        warn!("Failed to release SMC handle after close timed out: {}", e);
                    }
                }
                return;
            }
        }
    }

    // The session went away without closing; release the handle here.
    if let Err(e) = transport.close() {
        warn!("Failed to release detached SMC handle: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::TypeTag;
    use crate::protocol::KERNEL_INDEX_SMC;
    use crate::transport::ScriptedTransport;

    fn assert_send<T: Send>() {}

    #[test]
    fn test_session_is_send() {
        assert_send::<Session>();
    }

    #[test]
    fn test_call_forwards_frames() {
        let transport = ScriptedTransport::reading(TypeTag::SP78, &[0x2D, 0x00]);
        let log = transport.log();
        let mut session = Session::with_transport(transport, None).unwrap();

        let request = KeyDataFrame::default();
        let reply = session.call(KERNEL_INDEX_SMC, &request).unwrap();
        assert_eq!(reply.key_info.data_size, 2);
        assert_eq!(session.call_count(), 1);
        assert_eq!(log.calls()[0].selector, KERNEL_INDEX_SMC);
    }

    #[test]
    fn test_close_is_idempotent() {
        let transport = ScriptedTransport::new(Vec::new());
        let log = transport.log();
        let mut session = Session::with_transport(transport, None).unwrap();

        session.close().unwrap();
        session.close().unwrap();
        assert!(!session.is_open());
        drop(session);
        assert_eq!(log.close_count(), 1);
    }

    #[test]
    fn test_drop_closes_handle() {
        let transport = ScriptedTransport::new(Vec::new());
        let log = transport.log();
        let session = Session::with_transport(transport, None).unwrap();
        drop(session);
        assert_eq!(log.close_count(), 1);
    }

    #[test]
    fn test_call_after_close_fails() {
        let transport = ScriptedTransport::reading(TypeTag::SP78, &[0x19, 0x00]);
        let log = transport.log();
        let mut session = Session::with_transport(transport, None).unwrap();
        session.close().unwrap();

        let err = session
            .call(KERNEL_INDEX_SMC, &KeyDataFrame::default())
            .unwrap_err();
        assert_eq!(err, SmcError::SessionClosed);
        assert_eq!(log.call_count(), 0);
    }

    #[test]
    fn test_timeout_poisons_session() {
        let transport = ScriptedTransport::reading(TypeTag::SP78, &[0x19, 0x00])
            .with_delay(Duration::from_millis(300));
        let log = transport.log();
        let limit = Duration::from_millis(20);
        let mut session = Session::with_transport(transport, Some(limit)).unwrap();

        let err = session
            .call(KERNEL_INDEX_SMC, &KeyDataFrame::default())
            .unwrap_err();
        assert_eq!(err, SmcError::Timeout(limit));
        assert!(!session.is_open());

        let err = session
            .call(KERNEL_INDEX_SMC, &KeyDataFrame::default())
            .unwrap_err();
        assert_eq!(err, SmcError::SessionClosed);
        assert!(session.close().is_ok());

        // The detached worker releases the handle once the slow call returns
        thread::sleep(Duration::from_millis(800));
        assert_eq!(log.close_count(), 1);
        assert_eq!(log.call_count(), 1);
    }

    #[test]
    fn test_slow_close_still_releases_handle() {
        let transport = ScriptedTransport::new(Vec::new())
            .with_close(Duration::from_millis(200), Err(SmcError::CallFailed(-3)));
        let log = transport.log();
        let limit = Duration::from_millis(20);
        let mut session = Session::with_transport(transport, Some(limit)).unwrap();

        assert_eq!(session.close(), Err(SmcError::Timeout(limit)));
        assert!(!session.is_open());
        assert!(session.close().is_ok());

        thread::sleep(Duration::from_millis(600));
        assert_eq!(log.close_count(), 1);
    }

    #[test]
    fn test_close_failure_is_returned() {
        let transport = ScriptedTransport::new(Vec::new())
            .with_close(Duration::ZERO, Err(SmcError::CallFailed(-3)));
        let log = transport.log();
        let mut session = Session::with_transport(transport, None).unwrap();

        assert_eq!(session.close(), Err(SmcError::CallFailed(-3)));
        assert!(!session.is_open());
        assert_eq!(log.close_count(), 1);
    }
}
