//! Bounded-deadline scheduler.
//!
//! A single owning `Watchdog<C>` handle replaces the reference
//! implementation's process-global pending list and signal handler (§9,
//! "Global scheduler state"): the handle drives one [`Clock`] (a monotonic
//! timer plus a deferred-call mechanism, §6 "Environment"), keeps its
//! pending events in non-decreasing deadline order, and hands out
//! [`EventHandle`]s that let a client cancel an event before it fires.
//!
//! The abandon channel (§4.8, §9 "Abandon mechanism") is represented by
//! [`AbandonToken`], a cancellation token a handler writes and the
//! conversion engine reads; only the monotonic transition "unset → set" is
//! ever meaningful, so a relaxed atomic is sufficient.

#![forbid(unsafe_code)]

use std::cmp::Ordering;
use std::ops::{Add, Sub};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{trace, warn};

/// Errors raised by watchdog operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum WatchdogError {
    /// `schedule` was called with a non-positive number of time units.
    #[error("watchdog scheduling requires a positive number of time units, got {0}")]
    NonPositiveUnits(i64),
}

/// A positive time interval, measured in hundredths of a second (matching
/// the reference implementation's `Time(unsigned long hundredths_of_a_second)`
/// constructor), carried internally as whole seconds plus microseconds.
#[derive(Copy, Clone, Debug, Default)]
pub struct Time {
    secs: u64,
    micros: u64,
}

impl Time {
    /// The zero interval.
    pub fn zero() -> Self {
        Time { secs: 0, micros: 0 }
    }

    /// Constructs from whole seconds and microseconds, normalizing carry.
    pub fn new(secs: u64, micros: u64) -> Self {
        let extra = micros / 1_000_000;
        Time {
            secs: secs + extra,
            micros: micros % 1_000_000,
        }
    }

    /// Constructs from a count of scheduler "units" (hundredths of a
    /// second), the same granularity `schedule`'s `units` argument uses.
    pub fn from_units(units: u64) -> Self {
        Time::new(units / 100, (units % 100) * 10_000)
    }

    /// Whole seconds.
    pub fn seconds(&self) -> u64 {
        self.secs
    }

    /// Microseconds beyond `seconds()`.
    pub fn microseconds(&self) -> u64 {
        self.micros
    }

    fn to_duration(self) -> Duration {
        Duration::new(self.secs, (self.micros * 1_000) as u32)
    }

    fn from_duration(d: Duration) -> Self {
        Time::new(d.as_secs(), u64::from(d.subsec_micros()))
    }
}

// The Open Question in the design notes: the reference implementation's
// equality check reads `y.microseconds() == y.microseconds()`, which is
// always true and almost certainly a copy-paste bug. This compares both
// operands, as intended.
impl PartialEq for Time {
    fn eq(&self, other: &Self) -> bool {
        self.seconds() == other.seconds() && self.microseconds() == other.microseconds()
    }
}
impl Eq for Time {}

impl PartialOrd for Time {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Time {
    fn cmp(&self, other: &Self) -> Ordering {
        self.secs
            .cmp(&other.secs)
            .then(self.micros.cmp(&other.micros))
    }
}

impl Add for Time {
    type Output = Time;
    fn add(self, rhs: Time) -> Time {
        Time::new(self.secs + rhs.secs, self.micros + rhs.micros)
    }
}

impl Sub for Time {
    type Output = Time;
    /// Saturates to zero rather than going negative, matching the reference
    /// implementation's `operator-=`.
    fn sub(self, rhs: Time) -> Time {
        let lhs_micros = (self.secs as i128) * 1_000_000 + self.micros as i128;
        let rhs_micros = (rhs.secs as i128) * 1_000_000 + rhs.micros as i128;
        let diff = lhs_micros - rhs_micros;
        if diff <= 0 {
            Time::zero()
        } else {
            Time::new((diff / 1_000_000) as u64, (diff % 1_000_000) as u64)
        }
    }
}

/// A cancellation token: a handler writes a reason of type `E`, a long-
/// running computation polls it and unwinds when set. Only the
/// unset-to-set transition is meaningful; the library never clears it, the
/// client must.
#[derive(Clone)]
pub struct AbandonToken<E> {
    inner: Arc<Mutex<Option<E>>>,
}

impl<E: Clone> AbandonToken<E> {
    /// A fresh, unset token.
    pub fn new() -> Self {
        AbandonToken {
            inner: Arc::new(Mutex::new(None)),
        }
    }

    /// Sets the abandon reason.
    pub fn set(&self, reason: E) {
        *self.inner.lock().expect("abandon token mutex poisoned") = Some(reason);
    }

    /// Returns the abandon reason, if set.
    pub fn check(&self) -> Option<E> {
        self.inner.lock().expect("abandon token mutex poisoned").clone()
    }

    /// Clears the abandon reason. The client's responsibility before reuse.
    pub fn clear(&self) {
        *self.inner.lock().expect("abandon token mutex poisoned") = None;
    }
}

impl<E: Clone> Default for AbandonToken<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// A client-supplied watchdog action.
#[derive(Clone)]
pub enum Handler {
    /// Sets a boolean flag the client owns.
    SetFlag(Arc<std::sync::atomic::AtomicBool>),
    /// Invokes a client-provided nullary action.
    Invoke(Arc<dyn Fn() + Send + Sync>),
}

impl Handler {
    fn act(&self) {
        match self {
            Handler::SetFlag(flag) => flag.store(true, AtomicOrdering::Relaxed),
            Handler::Invoke(f) => f(),
        }
    }
}

/// An opaque handle to a scheduled, not-yet-fired event, used for
/// cancellation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct EventHandle(u64);

struct PendingEvent {
    id: u64,
    deadline: Time,
    handler: Handler,
    expired: Arc<std::sync::atomic::AtomicBool>,
}

/// The monotonic clock and single interval timer the scheduler drives.
pub trait Clock: Send {
    /// Arms the timer to fire (asynchronously notify) after `delay`.
    fn arm(&mut self, delay: Time);
    /// Disarms the timer.
    fn disarm(&mut self);
    /// Time remaining before the currently armed timer fires (zero if not
    /// armed or already due).
    fn remaining(&self) -> Time;
}

/// A [`Clock`] backed by a background thread and `std::time::Instant`.
///
/// Each `arm` spawns a sleeping thread tagged with a generation counter;
/// `disarm`/re-`arm` bump the counter so a stale sleep's notification is
/// silently dropped instead of firing late.
pub struct SystemClock {
    notify_tx: mpsc::Sender<()>,
    armed_at: Option<(Instant, Duration)>,
    generation: Arc<AtomicU64>,
}

impl SystemClock {
    /// Builds a clock and the receiver its notifications arrive on.
    pub fn new() -> (Self, mpsc::Receiver<()>) {
        let (tx, rx) = mpsc::channel();
        (
            SystemClock {
                notify_tx: tx,
                armed_at: None,
                generation: Arc::new(AtomicU64::new(0)),
            },
            rx,
        )
    }
}

impl Clock for SystemClock {
    fn arm(&mut self, delay: Time) {
        let gen = self.generation.fetch_add(1, AtomicOrdering::SeqCst) + 1;
        let gen_counter = self.generation.clone();
        let tx = self.notify_tx.clone();
        let dur = delay.to_duration();
        self.armed_at = Some((Instant::now(), dur));
        thread::spawn(move || {
            thread::sleep(dur);
            if gen_counter.load(AtomicOrdering::SeqCst) == gen {
                let _ = tx.send(());
            }
        });
    }

    fn disarm(&mut self) {
        self.generation.fetch_add(1, AtomicOrdering::SeqCst);
        self.armed_at = None;
    }

    fn remaining(&self) -> Time {
        match self.armed_at {
            Some((start, dur)) => {
                let elapsed = start.elapsed();
                if elapsed >= dur {
                    Time::zero()
                } else {
                    Time::from_duration(dur - elapsed)
                }
            }
            None => Time::zero(),
        }
    }
}

/// A manually-advanced [`Clock`] for deterministic tests (§1d): no real
/// time elapses, a test calls [`FakeClock::advance`] and then
/// [`Watchdog::fire_due`] to simulate the interval timer's notification.
#[derive(Default)]
pub struct FakeClock {
    now: Time,
    armed_deadline: Option<Time>,
}

impl FakeClock {
    /// A fresh clock at time zero, disarmed.
    pub fn new() -> Self {
        FakeClock::default()
    }

    /// Advances the fake clock by `by`.
    pub fn advance(&mut self, by: Time) {
        self.now = self.now + by;
    }

    /// Whether the armed deadline has been reached.
    pub fn is_due(&self) -> bool {
        self.armed_deadline.is_some_and(|d| d <= self.now)
    }
}

impl Clock for FakeClock {
    fn arm(&mut self, delay: Time) {
        self.armed_deadline = Some(self.now + delay);
    }

    fn disarm(&mut self) {
        self.armed_deadline = None;
    }

    fn remaining(&self) -> Time {
        match self.armed_deadline {
            Some(d) if d > self.now => d - self.now,
            _ => Time::zero(),
        }
    }
}

/// An owning handle to the bounded-deadline scheduler (§4.8).
pub struct Watchdog<C: Clock> {
    clock: C,
    pending: Vec<PendingEvent>,
    running: bool,
    time_so_far: Time,
    last_requested: Time,
    in_critical_section: bool,
    next_id: u64,
}

impl<C: Clock> Watchdog<C> {
    /// An idle watchdog driving `clock`.
    pub fn new(clock: C) -> Self {
        Watchdog {
            clock,
            pending: Vec::new(),
            running: false,
            time_so_far: Time::zero(),
            last_requested: Time::zero(),
            in_critical_section: false,
            next_id: 0,
        }
    }

    /// Schedules `handler` to run `units` time-units from now.
    pub fn schedule(&mut self, units: i64, handler: Handler) -> Result<EventHandle, WatchdogError> {
        if units <= 0 {
            return Err(WatchdogError::NonPositiveUnits(units));
        }
        self.in_critical_section = true;
        let id = self.next_id;
        self.next_id += 1;
        let relative = Time::from_units(units as u64);

        let deadline = if !self.running {
            self.time_so_far = Time::zero();
            self.clock.arm(relative);
            self.last_requested = relative;
            self.running = true;
            relative
        } else {
            let t_r = self.clock.remaining();
            let elapsed = self.last_requested - t_r;
            let current = self.time_so_far + elapsed;
            let real_deadline = current + relative;
            if relative < t_r {
                self.time_so_far = current;
                self.clock.arm(relative);
                self.last_requested = relative;
            }
            real_deadline
        };

        let expired = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let pos = self.pending.partition_point(|e| e.deadline <= deadline);
        self.pending.insert(
            pos,
            PendingEvent {
                id,
                deadline,
                handler,
                expired: expired.clone(),
            },
        );
        trace!(id, ?deadline, "watchdog: scheduled event");
        self.in_critical_section = false;
        Ok(EventHandle(id))
    }

    /// Cancels `handle` if it has not yet fired. Returns whether an active
    /// event was removed (a fired event makes this a no-op, per §5).
    pub fn cancel(&mut self, handle: EventHandle) -> bool {
        self.in_critical_section = true;
        let result = match self.pending.iter().position(|e| e.id == handle.0) {
            Some(idx) => {
                if idx == 0 {
                    if self.pending.len() > 1 {
                        let head_deadline = self.pending[0].deadline;
                        let next_deadline = self.pending[1].deadline;
                        if next_deadline != head_deadline {
                            let t_r = self.clock.remaining();
                            let elapsed = self.last_requested - t_r;
                            self.time_so_far = self.time_so_far + elapsed;
                            let delta = next_deadline - head_deadline;
                            let new_remaining = t_r + delta;
                            self.clock.arm(new_remaining);
                            self.last_requested = new_remaining;
                        }
                    } else {
                        self.clock.disarm();
                        self.running = false;
                    }
                }
                self.pending.remove(idx);
                trace!(id = handle.0, "watchdog: cancelled event");
                true
            }
            None => false,
        };
        self.in_critical_section = false;
        result
    }

    /// Drains and runs every event the clock reports as now due.
    ///
    /// Defers to a tiny reschedule if called while `in_critical_section` is
    /// set (§4.8, "on timer expiry"); in this owning-handle design that can
    /// only happen if a client calls `fire_due` re-entrantly from inside a
    /// handler, which handlers must not do.
    pub fn fire_due(&mut self) {
        if self.in_critical_section {
            warn!("watchdog: timer fired during critical section, deferring");
            self.clock.arm(Time::from_units(1));
            self.last_requested = Time::from_units(1);
            return;
        }
        self.time_so_far = self.time_so_far + self.last_requested;
        while let Some(head) = self.pending.first() {
            if head.deadline <= self.time_so_far {
                let event = self.pending.remove(0);
                event.handler.act();
                event.expired.store(true, AtomicOrdering::Relaxed);
                trace!(id = event.id, "watchdog: fired event");
            } else {
                break;
            }
        }
        if self.pending.is_empty() {
            self.running = false;
            self.clock.disarm();
        } else {
            let next = self.pending[0].deadline - self.time_so_far;
            self.clock.arm(next);
            self.last_requested = next;
        }
    }

    /// Whether any event is currently pending.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Number of pending (unfired, uncancelled) events.
    pub fn len(&self) -> usize {
        self.pending.len()
    }
}

impl Watchdog<FakeClock> {
    /// Test helper: advances the fake clock by `by` and, if the timer is now
    /// due, fires it.
    pub fn advance_and_fire(&mut self, by: Time) {
        self.clock.advance(by);
        if self.clock.is_due() {
            self.fire_due();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn time_equality_compares_both_operands() {
        // Regression test for the design-notes Open Question: a naive port
        // of the reference's buggy `y.microseconds() == y.microseconds()`
        // would make this spuriously true.
        let a = Time::new(1, 500);
        let b = Time::new(1, 600);
        assert_ne!(a, b);
        assert_eq!(Time::new(2, 10), Time::new(2, 10));
    }

    #[test]
    fn time_subtraction_saturates_at_zero() {
        let a = Time::new(1, 0);
        let b = Time::new(2, 0);
        assert_eq!(a - b, Time::zero());
    }

    #[test]
    fn time_from_units_matches_hundredths_of_a_second() {
        assert_eq!(Time::from_units(150), Time::new(1, 500_000));
    }

    #[test]
    fn watchdog_fires_in_deadline_order_scenario_f() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let (clock, _rx) = (FakeClock::new(), ());
        let mut wd = Watchdog::new(clock);

        let make_handler = |order: Arc<Mutex<Vec<u64>>>, tag: u64| {
            Handler::Invoke(Arc::new(move || order.lock().unwrap().push(tag)))
        };

        wd.schedule(10000, make_handler(order.clone(), 100)).unwrap();
        wd.schedule(5000, make_handler(order.clone(), 50)).unwrap();
        wd.schedule(20000, make_handler(order.clone(), 200)).unwrap();

        wd.advance_and_fire(Time::from_units(6000));
        assert_eq!(*order.lock().unwrap(), vec![50]);

        wd.advance_and_fire(Time::from_units(6000));
        assert_eq!(*order.lock().unwrap(), vec![50, 100]);

        wd.advance_and_fire(Time::from_units(13000));
        assert_eq!(*order.lock().unwrap(), vec![50, 100, 200]);
    }

    #[test]
    fn cancel_before_fire_suppresses_handler() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut wd = Watchdog::new(FakeClock::new());
        let f = fired.clone();
        let handle = wd
            .schedule(1000, Handler::Invoke(Arc::new(move || {
                f.fetch_add(1, AtomicOrdering::Relaxed);
            })))
            .unwrap();
        assert!(wd.cancel(handle));
        wd.advance_and_fire(Time::from_units(2000));
        assert_eq!(fired.load(AtomicOrdering::Relaxed), 0);
    }

    #[test]
    fn cancel_of_already_fired_event_is_noop() {
        let mut wd = Watchdog::new(FakeClock::new());
        let handle = wd.schedule(100, Handler::Invoke(Arc::new(|| {}))).unwrap();
        wd.advance_and_fire(Time::from_units(200));
        assert!(!wd.cancel(handle));
    }

    #[test]
    fn abandon_token_monotonic_transition() {
        let token: AbandonToken<&'static str> = AbandonToken::new();
        assert!(token.check().is_none());
        token.set("deadline exceeded");
        assert_eq!(token.check(), Some("deadline exceeded"));
        token.clear();
        assert!(token.check().is_none());
    }
}
