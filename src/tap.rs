//! Signal Tap - best-effort analysis attachment to the live session.
//!
//! Attaches a frequency analyser to whatever resource the engine currently
//! owns, re-attaching on every track change, without ever breaking the
//! audible output path. All failure modes degrade to "no binding": the
//! visualization falls back to synthetic rendering and the attach is retried
//! on the next play-state transition.

use tracing::{debug, warn};

use crate::engine::SessionId;
use crate::resource::{AnalysisSource, AttachFailure, TapPoint};
use crate::FREQ_BINS;

/// Factory for the shared analysis context, invoked at most once per tap
/// lifetime (lazy creation on first attach).
pub type AnalysisFactory = Box<dyn Fn() -> Box<dyn AnalysisSource>>;

/// Relates the shared analysis context to one playback session.
///
/// Weak with respect to the session: validity requires the bound id to match
/// the engine's current session. Any mismatch reads as "no binding".
struct AnalysisBinding {
    session: SessionId,
}

/// Attachment state machine for the analysis graph.
pub struct SignalTap {
    factory: AnalysisFactory,
    /// Shared context, created once and reused across sessions.
    context: Option<Box<dyn AnalysisSource>>,
    binding: Option<AnalysisBinding>,
    closed: bool,
}

impl SignalTap {
    /// Create a tap that will build its analysis context lazily.
    pub fn new(factory: AnalysisFactory) -> Self {
        Self {
            factory,
            context: None,
            binding: None,
            closed: false,
        }
    }

    /// Whether a binding for `session` is currently live.
    pub fn is_attached(&self, session: SessionId) -> bool {
        self.binding
            .as_ref()
            .map(|b| b.session == session)
            .unwrap_or(false)
    }

    /// Attempt to bind the analyser to `session`'s tap point.
    ///
    /// Idempotent per session: a repeat call for the already-bound session
    /// short-circuits without touching the graph. A bind for a different
    /// session disconnects the stale routing first. `NotReady` failures
    /// leave no binding and are safely retryable.
    pub fn attach(
        &mut self,
        session: SessionId,
        point: &TapPoint,
    ) -> std::result::Result<(), AttachFailure> {
        if self.closed {
            return Err(AttachFailure::Unsupported);
        }
        if self.is_attached(session) {
            return Ok(());
        }

        // Stale routing from a previous session must go before any rebind.
        if self.binding.take().is_some() {
            if let Some(context) = self.context.as_mut() {
                context.disconnect();
            }
        }

        let context = self.context.get_or_insert_with(|| (self.factory)());
        match context.try_attach(point) {
            Ok(()) => {
                debug!(?session, "analysis graph attached");
                self.binding = Some(AnalysisBinding { session });
                Ok(())
            }
            Err(failure) => {
                warn!(?session, ?failure, "analysis attach failed, will retry");
                Err(failure)
            }
        }
    }

    /// Read the current frequency-bin magnitudes for `current` session.
    ///
    /// Returns false (unavailable) when unattached or when the binding is
    /// stale - a session mismatch is data absence, never an error.
    pub fn read_frame(&mut self, current: SessionId, out: &mut [u8; FREQ_BINS]) -> bool {
        if !self.is_attached(current) {
            return false;
        }
        match self.context.as_mut() {
            Some(context) => context.read_magnitudes(out),
            None => false,
        }
    }

    /// Disconnect the tap routing and drop the binding, keeping the shared
    /// context alive for the next session. Idempotent.
    pub fn release(&mut self) {
        if self.binding.take().is_some() {
            if let Some(context) = self.context.as_mut() {
                context.disconnect();
            }
        }
    }

    /// Release and close the shared context. Idempotent; used on engine
    /// teardown only.
    pub fn teardown(&mut self) {
        self.release();
        if let Some(mut context) = self.context.take() {
            context.close();
        }
        self.closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Counts graph operations so idempotence is observable.
    #[derive(Default)]
    struct Counters {
        created: usize,
        attaches: usize,
        disconnects: usize,
        closes: usize,
    }

    struct CountingSource {
        counters: Arc<Mutex<Counters>>,
        ready: Arc<Mutex<bool>>,
        attached: bool,
    }

    impl AnalysisSource for CountingSource {
        fn try_attach(&mut self, _point: &TapPoint) -> Result<(), AttachFailure> {
            if !*self.ready.lock() {
                return Err(AttachFailure::NotReady);
            }
            self.counters.lock().attaches += 1;
            self.attached = true;
            Ok(())
        }

        fn read_magnitudes(&mut self, out: &mut [u8]) -> bool {
            if !self.attached {
                return false;
            }
            out.fill(42);
            true
        }

        fn disconnect(&mut self) {
            if self.attached {
                self.attached = false;
                self.counters.lock().disconnects += 1;
            }
        }

        fn close(&mut self) {
            self.counters.lock().closes += 1;
        }
    }

    fn counting_tap(ready: bool) -> (SignalTap, Arc<Mutex<Counters>>, Arc<Mutex<bool>>) {
        let counters = Arc::new(Mutex::new(Counters::default()));
        let ready = Arc::new(Mutex::new(ready));
        let c = Arc::clone(&counters);
        let r = Arc::clone(&ready);
        let tap = SignalTap::new(Box::new(move || {
            c.lock().created += 1;
            Box::new(CountingSource {
                counters: Arc::clone(&c),
                ready: Arc::clone(&r),
                attached: false,
            })
        }));
        (tap, counters, ready)
    }

    fn session(id: u64) -> SessionId {
        SessionId::for_tests(id)
    }

    #[test]
    fn repeat_attach_to_same_session_creates_no_second_node() {
        let (mut tap, counters, _) = counting_tap(true);
        let point = TapPoint::new(16, 44_100);
        let sid = session(0);

        assert!(tap.attach(sid, &point).is_ok());
        assert!(tap.attach(sid, &point).is_ok());
        assert!(tap.attach(sid, &point).is_ok());

        let c = counters.lock();
        assert_eq!(c.created, 1);
        assert_eq!(c.attaches, 1);
    }

    #[test]
    fn attaching_different_session_clears_previous_routing_first() {
        let (mut tap, counters, _) = counting_tap(true);
        let point = TapPoint::new(16, 44_100);
        let first = session(0);
        let second = session(1);

        assert!(tap.attach(first, &point).is_ok());
        assert!(tap.attach(second, &point).is_ok());

        let c = counters.lock();
        assert_eq!(c.created, 1, "context is shared across sessions");
        assert_eq!(c.disconnects, 1);
        assert_eq!(c.attaches, 2);
        drop(c);
        assert!(!tap.is_attached(first));
        assert!(tap.is_attached(second));
    }

    #[test]
    fn not_ready_failure_is_retryable() {
        let (mut tap, counters, ready) = counting_tap(false);
        let point = TapPoint::new(16, 44_100);
        let sid = session(0);

        assert_eq!(tap.attach(sid, &point), Err(AttachFailure::NotReady));
        assert!(!tap.is_attached(sid));

        *ready.lock() = true;
        assert!(tap.attach(sid, &point).is_ok());
        assert_eq!(counters.lock().attaches, 1);
    }

    #[test]
    fn stale_binding_reads_as_unavailable() {
        let (mut tap, _, _) = counting_tap(true);
        let point = TapPoint::new(16, 44_100);
        let bound = session(0);
        let other = session(1);

        assert!(tap.attach(bound, &point).is_ok());

        let mut out = [0u8; FREQ_BINS];
        assert!(tap.read_frame(bound, &mut out));
        assert_eq!(out[0], 42);

        out.fill(0);
        assert!(!tap.read_frame(other, &mut out));
        assert_eq!(out[0], 0);
    }

    #[test]
    fn release_and_teardown_are_idempotent() {
        let (mut tap, counters, _) = counting_tap(true);
        let point = TapPoint::new(16, 44_100);
        let sid = session(0);

        assert!(tap.attach(sid, &point).is_ok());
        tap.release();
        tap.release();
        assert_eq!(counters.lock().disconnects, 1);

        tap.teardown();
        tap.teardown();
        let c = counters.lock();
        assert_eq!(c.closes, 1);
        drop(c);

        // Closed taps refuse further binds.
        assert_eq!(tap.attach(sid, &point), Err(AttachFailure::Unsupported));
    }

    #[test]
    fn release_before_any_attach_is_a_noop() {
        let (mut tap, counters, _) = counting_tap(true);
        tap.release();
        assert_eq!(counters.lock().created, 0);
    }
}
