//! Completion bridge: turns "the script called back" into a blocking wait.
//!
//! Every reply from the runtime thread travels over a tokio [`oneshot`]
//! channel. The sending half is consumed by delivery, so a value is delivered
//! at most once, and dropping it undelivered closes the channel. [`wait`]
//! blocks the calling thread until a value arrives, the channel closes, or the
//! caller's [`CancelToken`] fires.

use std::fmt;
use std::time::{Duration, Instant};

use tokio::sync::oneshot::{self, error::TryRecvError};
use tokio_util::sync::CancellationToken;

use crate::Error;

/// Why a cancel token fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// `cancel()` was called
    Cancelled,
    /// The token's deadline passed
    DeadlineExceeded,
}

impl From<CancelReason> for Error {
    fn from(reason: CancelReason) -> Self {
        match reason {
            CancelReason::Cancelled => Error::Cancelled,
            CancelReason::DeadlineExceeded => Error::DeadlineExceeded,
        }
    }
}

/// Cooperative cancellation signal with an optional deadline.
///
/// Clones share state: cancelling one clone cancels them all.
///
/// ```
/// use std::time::Duration;
/// use vegavm::CancelToken;
///
/// let token = CancelToken::with_timeout(Duration::from_secs(30));
/// assert!(!token.is_cancelled());
/// token.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Clone, Default)]
pub struct CancelToken {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl CancelToken {
    /// A token that only fires when `cancel()` is called.
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that fires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: Instant::now().checked_add(timeout),
        }
    }

    /// A token that fires at `deadline`.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: Some(deadline),
        }
    }

    /// Wrap an existing token, e.g. one shared with other tokio tasks.
    pub fn from_token(token: CancellationToken, deadline: Option<Instant>) -> Self {
        Self { token, deadline }
    }

    /// Fire the token and wake every wait currently blocked on it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.reason().is_some()
    }

    /// Why the token fired, or `None` while it is still live.
    pub fn reason(&self) -> Option<CancelReason> {
        if self.token.is_cancelled() {
            return Some(CancelReason::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(CancelReason::DeadlineExceeded),
            _ => None,
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Resolves once the token fires, with the reason it fired.
    pub async fn fired(&self) -> CancelReason {
        match self.deadline {
            Some(deadline) => tokio::select! {
                _ = self.token.cancelled() => CancelReason::Cancelled,
                _ = tokio::time::sleep_until(deadline.into()) => CancelReason::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                CancelReason::Cancelled
            }
        }
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("deadline", &self.deadline)
            .field("reason", &self.reason())
            .finish()
    }
}

/// Outcome of waiting on a reply that did not produce a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitError {
    /// The cancel token fired first
    Cancelled(CancelReason),
    /// The sender was dropped without delivering
    Closed,
}

/// Block until `rx` yields a value, its sender is dropped, or `cancel` fires.
///
/// A value that is already available wins over a token that has also fired.
/// Must not be called from inside an async task; use it from plain threads or
/// `spawn_blocking`.
pub fn wait<T>(mut rx: oneshot::Receiver<T>, cancel: &CancelToken) -> std::result::Result<T, WaitError> {
    match rx.try_recv() {
        Ok(value) => return Ok(value),
        Err(TryRecvError::Closed) => return Err(WaitError::Closed),
        Err(TryRecvError::Empty) => {}
    }
    if let Some(reason) = cancel.reason() {
        return Err(WaitError::Cancelled(reason));
    }

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_time().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            log::error!("failed to build wait runtime: {}", e);
            return Err(WaitError::Closed);
        }
    };
    runtime.block_on(async {
        tokio::select! {
            biased;
            received = &mut rx => received.map_err(|_| WaitError::Closed),
            reason = cancel.fired() => Err(WaitError::Cancelled(reason)),
        }
    })
}

/// A value handed to `success` / `failure` by the script, reduced to what the bridge needs.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// `undefined` or `null`
    Absent,
    /// A string value
    Text(String),
    /// Anything else; carries the value's type name
    Other(&'static str),
}

/// What the script reported for one render: success text, or a failure reason.
pub type Outcome = std::result::Result<String, String>;

/// Script-facing half of the completion bridge.
pub struct CompletionSender {
    inner: oneshot::Sender<Outcome>,
}

/// Caller-facing half of the completion bridge.
pub struct Completion {
    inner: oneshot::Receiver<Outcome>,
}

/// Create the completion bridge for one render call.
pub fn completion() -> (CompletionSender, Completion) {
    let (tx, rx) = oneshot::channel();
    (CompletionSender { inner: tx }, Completion { inner: rx })
}

impl CompletionSender {
    /// Deliver the script's success value.
    pub fn succeed(self, payload: Payload) {
        let outcome = match payload {
            Payload::Absent => Ok(String::new()),
            Payload::Text(text) => Ok(text),
            Payload::Other(kind) => Err(format!("invalid response type {kind}")),
        };
        self.deliver(outcome);
    }

    /// Deliver the script's failure value.
    pub fn fail(self, payload: Payload) {
        let outcome = match payload {
            Payload::Absent => Err("Failure message is nil".to_string()),
            Payload::Text(text) => Err(text),
            Payload::Other(kind) => Err(format!("invalid response type {kind}")),
        };
        self.deliver(outcome);
    }

    fn deliver(self, outcome: Outcome) {
        if self.inner.send(outcome).is_err() {
            log::debug!("render result arrived after the caller stopped waiting");
        }
    }
}

impl Completion {
    /// Wait for the script to call back.
    pub fn wait(self, cancel: &CancelToken) -> std::result::Result<Outcome, WaitError> {
        wait(self.inner, cancel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn delivers_value_sent_before_wait() {
        let (tx, rx) = oneshot::channel::<u32>();
        tx.send(7).unwrap();
        assert_eq!(wait(rx, &CancelToken::new()), Ok(7));
    }

    #[test]
    fn delivers_value_sent_from_another_thread() {
        let (tx, rx) = oneshot::channel::<String>();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            tx.send("done".to_string()).unwrap();
        });
        assert_eq!(
            wait(rx, &CancelToken::with_timeout(Duration::from_secs(5))).as_deref(),
            Ok("done")
        );
        handle.join().unwrap();
    }

    #[test]
    fn dropped_sender_closes_channel() {
        let (tx, rx) = oneshot::channel::<u32>();
        drop(tx);
        assert_eq!(wait(rx, &CancelToken::new()), Err(WaitError::Closed));
    }

    #[test]
    fn expired_deadline_cancels_without_consuming_late_delivery() {
        let (tx, rx) = oneshot::channel::<u32>();
        let token = CancelToken::with_timeout(Duration::ZERO);
        assert_eq!(wait(rx, &token), Err(WaitError::Cancelled(CancelReason::DeadlineExceeded)));
        // receiver is gone; a late send is simply refused
        assert!(tx.send(1).is_err());
    }

    #[test]
    fn deadline_fires_while_blocked() {
        let (_tx, rx) = oneshot::channel::<u32>();
        let started = Instant::now();
        let token = CancelToken::with_timeout(Duration::from_millis(30));
        assert_eq!(wait(rx, &token), Err(WaitError::Cancelled(CancelReason::DeadlineExceeded)));
        assert!(started.elapsed() >= Duration::from_millis(30));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn cancel_wakes_blocked_waiter() {
        let (_tx, rx) = oneshot::channel::<u32>();
        let token = CancelToken::new();
        let trigger = token.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            trigger.cancel();
        });
        let started = Instant::now();
        assert_eq!(wait(rx, &token), Err(WaitError::Cancelled(CancelReason::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(5));
        handle.join().unwrap();
    }

    #[test]
    fn ready_value_wins_over_fired_token() {
        let (tx, rx) = oneshot::channel::<u32>();
        tx.send(3).unwrap();
        let token = CancelToken::new();
        token.cancel();
        assert_eq!(wait(rx, &token), Ok(3));
    }

    #[test]
    fn shared_cancellation_token_cancels_wrapper() {
        let shared = CancellationToken::new();
        let token = CancelToken::from_token(shared.clone(), None);
        assert!(!token.is_cancelled());
        shared.cancel();
        assert_eq!(token.reason(), Some(CancelReason::Cancelled));
    }

    #[test]
    fn success_payload_rules() {
        let (tx, rx) = completion();
        tx.succeed(Payload::Absent);
        assert_eq!(rx.wait(&CancelToken::new()), Ok(Ok(String::new())));

        let (tx, rx) = completion();
        tx.succeed(Payload::Text("<svg></svg>".into()));
        assert_eq!(rx.wait(&CancelToken::new()), Ok(Ok("<svg></svg>".into())));

        let (tx, rx) = completion();
        tx.succeed(Payload::Other("object"));
        assert_eq!(rx.wait(&CancelToken::new()), Ok(Err("invalid response type object".into())));
    }

    #[test]
    fn failure_payload_rules() {
        let (tx, rx) = completion();
        tx.fail(Payload::Absent);
        assert_eq!(rx.wait(&CancelToken::new()), Ok(Err("Failure message is nil".into())));

        let (tx, rx) = completion();
        tx.fail(Payload::Text("Error: bad".into()));
        assert_eq!(rx.wait(&CancelToken::new()), Ok(Err("Error: bad".into())));

        let (tx, rx) = completion();
        tx.fail(Payload::Other("number"));
        assert_eq!(rx.wait(&CancelToken::new()), Ok(Err("invalid response type number".into())));
    }

    #[test]
    fn token_reason_reports_deadline() {
        let token = CancelToken::with_deadline(Instant::now() - Duration::from_millis(1));
        assert_eq!(token.reason(), Some(CancelReason::DeadlineExceeded));
        assert!(matches!(Error::from(CancelReason::DeadlineExceeded), Error::DeadlineExceeded));
    }
}
