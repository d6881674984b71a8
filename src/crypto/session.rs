//! Session key management with auto-lock timeout.
//!
//! This module holds the live encryption key in memory, clears it after a period
//! of inactivity, and invokes a caller-supplied callback when that happens.
//!
//! Every scheduled expiry carries a generation number. The timer task only
//! clears the key if, under the session mutex, its generation is still the
//! active one; `extend()` and `close()` bump or clear it under the same mutex, so
//! a racing timer and close can never both win.

use crate::crypto::kdf::EncryptionKey;
use crate::errors::SessionError;
use crate::events::{publish, EventSender, LifecycleEvent};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Callback invoked once when a session times out.
pub type ExpiryCallback = Box<dyn FnOnce() + Send + 'static>;

/// Observable state of a [`SecureSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No key is held.
    Empty,
    /// A key is held and an expiry timer is pending.
    Active,
}

/// Handle to one scheduled expiry.
///
/// Returned by [`SecureSession::open`] and [`SecureSession::extend`]. It is
/// cancelled as soon as the schedule is superseded by `extend()`, `close()` or a
/// new `open()`.
#[derive(Debug, Clone)]
pub struct SessionTimer {
    generation: u64,
    token: CancellationToken,
}

impl SessionTimer {
    /// Monotonic schedule number within the owning session.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether this schedule has been superseded or closed.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

struct ActiveSession {
    key: EncryptionKey,
    expires_at: Instant,
    on_expire: Option<ExpiryCallback>,
    generation: u64,
    token: CancellationToken,
    runtime: Handle,
}

#[derive(Default)]
struct SessionInner {
    active: Option<ActiveSession>,
    generation: u64,
}

/// Holds at most one live encryption key and clears it after inactivity.
///
/// # Example
///
/// ```no_run
/// use notecrypt::crypto::{KeyDerivation, SecureSession};
/// use secrecy::SecretString;
/// use std::time::Duration;
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let session = SecureSession::new(Duration::from_secs(30 * 60));
/// let key = KeyDerivation::default().derive(&SecretString::new("pw".into()), "user-1")?;
///
/// session.open(key, || println!("session expired"))?;
/// assert!(session.is_active());
///
/// // Push the deadline forward on user activity
/// session.extend();
///
/// // Explicit lock clears the key without invoking the callback
/// session.close();
/// assert!(!session.is_active());
/// # Ok(())
/// # }
/// ```
pub struct SecureSession {
    inner: Arc<Mutex<SessionInner>>,
    timeout: Duration,
    warning_threshold: Duration,
    events: Option<EventSender>,
}

impl SecureSession {
    /// Creates an empty session that expires after `timeout` of inactivity.
    pub fn new(timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SessionInner::default())),
            timeout,
            warning_threshold: Duration::ZERO,
            events: None,
        }
    }

    /// Emits `SessionExpiring` this long before the deadline.
    ///
    /// Ignored when zero or not shorter than the timeout.
    pub fn with_warning(mut self, threshold: Duration) -> Self {
        self.warning_threshold = threshold;
        self
    }

    /// Publishes expiry warnings and expirations on `events`.
    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    /// The configured inactivity timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn lock_inner(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores `key` and schedules expiry `timeout` from now.
    ///
    /// An already active session is closed first (its callback is discarded), so
    /// two keys are never held at once.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NoRuntime` when called outside a Tokio runtime; the
    /// session is left untouched in that case.
    pub fn open<F>(&self, key: EncryptionKey, on_expire: F) -> Result<SessionTimer, SessionError>
    where
        F: FnOnce() + Send + 'static,
    {
        let runtime = Handle::try_current().map_err(|_| SessionError::NoRuntime)?;

        let mut inner = self.lock_inner();
        if let Some(previous) = inner.active.take() {
            previous.token.cancel();
            debug!(
                generation = previous.generation,
                "Replacing active session key"
            );
        }

        inner.generation += 1;
        let generation = inner.generation;
        let token = CancellationToken::new();
        let expires_at = Instant::now() + self.timeout;
        self.spawn_timer(&runtime, generation, token.clone(), expires_at);

        inner.active = Some(ActiveSession {
            key,
            expires_at,
            on_expire: Some(Box::new(on_expire)),
            generation,
            token: token.clone(),
            runtime,
        });

        info!(
            timeout_secs = self.timeout.as_secs(),
            "Session unlocked"
        );
        Ok(SessionTimer { generation, token })
    }

    /// Returns the live key.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotActive` if the session is empty.
    pub fn key(&self) -> Result<EncryptionKey, SessionError> {
        self.lock_inner()
            .active
            .as_ref()
            .map(|active| active.key.clone())
            .ok_or(SessionError::NotActive)
    }

    /// Reschedules expiry for the full timeout from now.
    ///
    /// The previous schedule is cancelled before the new one is armed. Returns
    /// `None` (and does nothing) when the session is empty.
    pub fn extend(&self) -> Option<SessionTimer> {
        let mut guard = self.lock_inner();
        let SessionInner { active, generation } = &mut *guard;
        let active = active.as_mut()?;

        active.token.cancel();
        *generation += 1;
        let token = CancellationToken::new();
        let expires_at = Instant::now() + self.timeout;
        self.spawn_timer(&active.runtime, *generation, token.clone(), expires_at);

        active.generation = *generation;
        active.token = token.clone();
        active.expires_at = expires_at;

        debug!(generation = *generation, "Session extended");
        Some(SessionTimer {
            generation: *generation,
            token,
        })
    }

    /// Clears the key immediately, cancels the timer and discards the callback.
    pub fn close(&self) {
        let previous = self.lock_inner().active.take();
        if let Some(previous) = previous {
            previous.token.cancel();
            info!("Session locked");
        }
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        if self.lock_inner().active.is_some() {
            SessionState::Active
        } else {
            SessionState::Empty
        }
    }

    /// Whether a key is held.
    pub fn is_active(&self) -> bool {
        self.state() == SessionState::Active
    }

    /// Time left before expiry, or `None` when empty.
    pub fn remaining(&self) -> Option<Duration> {
        self.lock_inner()
            .active
            .as_ref()
            .map(|active| active.expires_at.saturating_duration_since(Instant::now()))
    }

    fn spawn_timer(
        &self,
        runtime: &Handle,
        generation: u64,
        token: CancellationToken,
        deadline: Instant,
    ) {
        let warning = (!self.warning_threshold.is_zero() && self.warning_threshold < self.timeout)
            .then_some(self.warning_threshold);

        runtime.spawn(run_expiry_timer(
            Arc::downgrade(&self.inner),
            generation,
            token,
            deadline,
            warning,
            self.events.clone(),
        ));
    }
}

impl Drop for SecureSession {
    fn drop(&mut self) {
        self.close();
    }
}

fn is_current(inner: &Mutex<SessionInner>, generation: u64) -> bool {
    inner
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .active
        .as_ref()
        .is_some_and(|active| active.generation == generation)
}

async fn run_expiry_timer(
    inner: Weak<Mutex<SessionInner>>,
    generation: u64,
    token: CancellationToken,
    deadline: Instant,
    warning: Option<Duration>,
    events: Option<EventSender>,
) {
    if let Some(remaining) = warning {
        tokio::select! {
            _ = token.cancelled() => return,
            _ = sleep_until(deadline - remaining) => {}
        }
        match inner.upgrade() {
            Some(inner) if is_current(&inner, generation) => {
                debug!(remaining_secs = remaining.as_secs(), "Session expiring soon");
                publish(
                    events.as_ref(),
                    LifecycleEvent::SessionExpiring { remaining },
                );
            }
            _ => return,
        }
    }

    tokio::select! {
        _ = token.cancelled() => return,
        _ = sleep_until(deadline) => {}
    }

    let Some(inner) = inner.upgrade() else {
        return;
    };

    // Decide under the lock; run the callback outside it.
    let expired = {
        let mut guard = inner.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.active.as_ref() {
            Some(active) if active.generation == generation => guard.active.take(),
            _ => None,
        }
    };

    let Some(mut expired) = expired else {
        debug!(generation, "Expiry timer superseded");
        return;
    };
    let callback = expired.on_expire.take();
    drop(expired);

    info!("Session expired after inactivity; encryption key cleared");
    publish(events.as_ref(), LifecycleEvent::SessionExpired);
    if let Some(callback) = callback {
        callback();
    }
}
