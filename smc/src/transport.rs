/*!
The single wire primitive and its implementations.

Everything the protocol does is a sequence of [`SmcTransport::call`]s. The
IOKit binding lives in [`crate::iokit`]; [`ScriptedTransport`] replays a
canned reply sequence so sessions can be driven without hardware.
*/

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use crate::error::{Result, SmcError};
use crate::frame::KeyDataFrame;
use crate::key::TypeTag;

/// `kIOReturnNotReady`, returned once a script has no replies left
pub const IO_RETURN_NOT_READY: i32 = 0xe000_02d8_u32 as i32;

/// A connection handle able to exchange one frame pair at a time
///
/// Implementations are moved onto the session's worker thread, hence the
/// `Send + 'static` bound.
pub trait SmcTransport: Send + 'static {
    /// Send `input` to the driver method `selector` and return its response
    fn call(&mut self, selector: u32, input: &KeyDataFrame) -> Result<KeyDataFrame>;

    /// Release the connection handle
    fn close(&mut self) -> Result<()>;
}

/// One call observed by a [`ScriptedTransport`]
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub selector: u32,
    pub request: KeyDataFrame,
}

#[derive(Debug, Default)]
struct LogState {
    calls: Vec<RecordedCall>,
    closes: usize,
}

/// Shared record of calls and closes, readable after the transport has
/// moved into a session
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    inner: Arc<Mutex<LogState>>,
}

impl CallLog {
    fn state(&self) -> MutexGuard<'_, LogState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// All recorded calls in issue order
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state().calls.len()
    }

    /// The `data8` sub-command of each recorded request, in issue order
    pub fn commands(&self) -> Vec<u8> {
        self.state().calls.iter().map(|c| c.request.data8).collect()
    }

    /// How many times the transport was closed
    pub fn close_count(&self) -> usize {
        self.state().closes
    }
}

/// Transport that replays scripted replies in order
pub struct ScriptedTransport {
    replies: VecDeque<Result<KeyDataFrame>>,
    log: CallLog,
    delay: Option<Duration>,
    close_delay: Option<Duration>,
    close_result: Result<()>,
}

impl ScriptedTransport {
    /// Create a transport answering calls with `replies`, in order
    pub fn new<I>(replies: I) -> Self
    where
        I: IntoIterator<Item = Result<KeyDataFrame>>,
    {
        Self {
            replies: replies.into_iter().collect(),
            log: CallLog::default(),
            delay: None,
            close_delay: None,
            close_result: Ok(()),
        }
    }

    /// Script one successful two-phase read of a `data_type` value
    pub fn reading(data_type: TypeTag, payload: &[u8]) -> Self {
        let size = payload.len() as u32;
        Self::new([
            Ok(KeyDataFrame::key_info_reply(size, data_type)),
            Ok(KeyDataFrame::bytes_reply(payload)),
        ])
    }

    /// Sleep for `delay` before answering each call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Sleep for `delay` and then answer each close with `result`
    pub fn with_close(mut self, delay: Duration, result: Result<()>) -> Self {
        self.close_delay = Some(delay);
        self.close_result = result;
        self
    }

    /// Append more replies to the script
    pub fn then<I>(mut self, replies: I) -> Self
    where
        I: IntoIterator<Item = Result<KeyDataFrame>>,
    {
        self.replies.extend(replies);
        self
    }

    /// Handle to the call log, valid after the transport is moved away
    pub fn log(&self) -> CallLog {
        self.log.clone()
    }
}

impl SmcTransport for ScriptedTransport {
    fn call(&mut self, selector: u32, input: &KeyDataFrame) -> Result<KeyDataFrame> {
        self.log.state().calls.push(RecordedCall {
            selector,
            request: *input,
        });

        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }

        self.replies
            .pop_front()
            .unwrap_or(Err(SmcError::CallFailed(IO_RETURN_NOT_READY)))
    }

    fn close(&mut self) -> Result<()> {
        if let Some(delay) = self.close_delay {
            thread::sleep(delay);
        }

        self.log.state().closes += 1;
        self.close_result.clone()
    }
}
