//! Collector timeout guard
//!
//! Bounds each `Collector::finalize` call. The strategy depends on what the
//! platform can do:
//!
//! - **Preemptive** (unix): a `SIGALRM` handler is installed and an
//!   `ITIMER_REAL` interval timer armed for the budget. The kernel raises the
//!   expiry asynchronously; blocking system calls return `EINTR` and the
//!   collector sees the flag on its next [`Deadline::check`]. Rust code cannot
//!   be unwound from inside a signal handler, so the handler only sets a flag.
//!   The timer is always disarmed and the previous handler restored when the
//!   guard drops, whatever the outcome. A timer the host process had armed is
//!   re-armed with the time it had left.
//! - **Cooperative**: the deadline is measured against the clock. An overrun
//!   is detected, never interrupted.
//!
//! Either way an overrun turns the call into [`CollectorError::Timeout`] and
//! its result is discarded. Forcible interruption needs out-of-process
//! isolation, which is not provided here.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::config::{TimeoutConfig, TimeoutMode};
use crate::error::CollectorError;

/// Budget handed to a running `finalize`
#[derive(Debug)]
pub struct Deadline {
    started: Instant,
    budget: Option<Duration>,
    fired: Option<&'static AtomicBool>,
}

impl Deadline {
    pub fn new(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget: Some(budget),
            fired: None,
        }
    }

    /// A deadline that never expires
    pub fn unbounded() -> Self {
        Self {
            started: Instant::now(),
            budget: None,
            fired: None,
        }
    }

    fn with_flag(budget: Duration, fired: &'static AtomicBool) -> Self {
        Self {
            started: Instant::now(),
            budget: Some(budget),
            fired: Some(fired),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.budget.map(|b| b.saturating_sub(self.elapsed()))
    }

    pub fn expired(&self) -> bool {
        if self.fired.is_some_and(|f| f.load(Ordering::SeqCst)) {
            return true;
        }
        self.budget.is_some_and(|b| self.elapsed() > b)
    }

    /// `Err(Timeout)` once the budget is spent
    pub fn check(&self) -> Result<(), CollectorError> {
        if self.expired() {
            return Err(self.timeout_error());
        }
        Ok(())
    }

    fn timeout_error(&self) -> CollectorError {
        CollectorError::Timeout {
            budget: self.budget.unwrap_or_default(),
            elapsed: self.elapsed(),
        }
    }
}

/// Applies the configured timeout strategy around one call
#[derive(Debug, Clone)]
pub struct TimeoutGuard {
    mode: TimeoutMode,
    budget: Duration,
}

impl TimeoutGuard {
    /// Resolve the requested mode against platform capabilities
    pub fn new(config: &TimeoutConfig) -> Self {
        let mode = match config.mode {
            TimeoutMode::Preemptive if !preemptive_supported() => {
                tracing::warn!(
                    "Preemptive timeouts are not available on this platform; \
                     falling back to cooperative deadline checks"
                );
                TimeoutMode::Cooperative
            }
            mode => mode,
        };
        Self {
            mode,
            budget: config.budget(),
        }
    }

    /// Effective mode after capability resolution
    pub fn mode(&self) -> TimeoutMode {
        self.mode
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Run `f` under the guard
    pub fn run<T, F>(&self, name: &str, f: F) -> Result<T, CollectorError>
    where
        F: FnOnce(&Deadline) -> Result<T, CollectorError>,
    {
        match self.mode {
            TimeoutMode::Off => f(&Deadline::unbounded()),
            TimeoutMode::Cooperative => self.run_cooperative(name, f),
            TimeoutMode::Preemptive => self.run_preemptive(name, f),
        }
    }

    fn run_cooperative<T, F>(&self, name: &str, f: F) -> Result<T, CollectorError>
    where
        F: FnOnce(&Deadline) -> Result<T, CollectorError>,
    {
        let deadline = Deadline::new(self.budget);
        let result = f(&deadline);
        settle(name, &deadline, result)
    }

    #[cfg(unix)]
    fn run_preemptive<T, F>(&self, name: &str, f: F) -> Result<T, CollectorError>
    where
        F: FnOnce(&Deadline) -> Result<T, CollectorError>,
    {
        let Some(timer) = alarm::AlarmTimer::arm(self.budget) else {
            tracing::debug!(collector = name, "Interval timer busy; using cooperative deadline");
            return self.run_cooperative(name, f);
        };
        let deadline = Deadline::with_flag(self.budget, timer.flag());
        let result = f(&deadline);
        drop(timer);
        settle(name, &deadline, result)
    }

    #[cfg(not(unix))]
    fn run_preemptive<T, F>(&self, name: &str, f: F) -> Result<T, CollectorError>
    where
        F: FnOnce(&Deadline) -> Result<T, CollectorError>,
    {
        self.run_cooperative(name, f)
    }
}

/// Discard any result produced after the budget ran out
fn settle<T>(
    name: &str,
    deadline: &Deadline,
    result: Result<T, CollectorError>,
) -> Result<T, CollectorError> {
    match result {
        Err(err) => Err(err),
        Ok(_) if deadline.expired() => {
            let err = deadline.timeout_error();
            tracing::warn!(collector = name, error = %err, "Collector finalize overran its budget");
            Err(err)
        }
        ok => ok,
    }
}

/// Whether this build can arm a kernel interval timer
pub fn preemptive_supported() -> bool {
    cfg!(unix)
}

#[cfg(unix)]
mod alarm {
    //! Process-wide `SIGALRM` interval timer. Only one guard can hold it at a
    //! time; others fall back to cooperative deadlines.

    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::{Duration, Instant};

    static FIRED: AtomicBool = AtomicBool::new(false);
    static SLOT: AtomicBool = AtomicBool::new(false);

    extern "C" fn on_alarm(_signal: libc::c_int) {
        FIRED.store(true, Ordering::SeqCst);
    }

    fn timeval(duration: Duration) -> libc::timeval {
        libc::timeval {
            tv_sec: duration.as_secs() as libc::time_t,
            tv_usec: duration.subsec_micros() as libc::suseconds_t,
        }
    }

    fn duration(tv: &libc::timeval) -> Duration {
        let secs = Duration::from_secs(tv.tv_sec.max(0) as u64);
        secs + Duration::from_micros(tv.tv_usec.max(0) as u64)
    }

    /// Arm `ITIMER_REAL`, returning whatever timer it replaced
    fn set_timer(value: Duration, interval: Duration) -> Option<libc::itimerval> {
        let timer = libc::itimerval {
            it_interval: timeval(interval),
            it_value: timeval(value),
        };
        let mut replaced: libc::itimerval = unsafe { std::mem::zeroed() };
        let rc = unsafe { libc::setitimer(libc::ITIMER_REAL, &timer, &mut replaced) };
        (rc == 0).then_some(replaced)
    }

    /// A timer the host process had armed before the guard took the slot
    struct HostTimer {
        remaining: Duration,
        interval: Duration,
        saved_at: Instant,
    }

    impl HostTimer {
        fn from_replaced(replaced: &libc::itimerval) -> Option<Self> {
            let remaining = duration(&replaced.it_value);
            (!remaining.is_zero()).then(|| Self {
                remaining,
                interval: duration(&replaced.it_interval),
                saved_at: Instant::now(),
            })
        }

        /// Re-arm with the time left; an expiry missed meanwhile fires at once
        fn restore(&self) {
            let left = self
                .remaining
                .saturating_sub(self.saved_at.elapsed())
                .max(Duration::from_micros(1));
            set_timer(left, self.interval);
        }
    }

    pub(super) struct AlarmTimer {
        previous: libc::sigaction,
        host: Option<HostTimer>,
    }

    impl AlarmTimer {
        pub(super) fn arm(budget: Duration) -> Option<Self> {
            if SLOT
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return None;
            }
            Self::arm_in_slot(budget)
        }

        /// Caller holds `SLOT`; it is released again on failure or drop
        fn arm_in_slot(budget: Duration) -> Option<Self> {
            FIRED.store(false, Ordering::SeqCst);

            // A zero it_value disarms the timer instead of firing it.
            let budget = budget.max(Duration::from_micros(1));

            unsafe {
                let mut action: libc::sigaction = std::mem::zeroed();
                action.sa_sigaction = on_alarm as extern "C" fn(libc::c_int) as libc::sighandler_t;
                libc::sigemptyset(&mut action.sa_mask);
                action.sa_flags = 0;

                let mut previous: libc::sigaction = std::mem::zeroed();
                if libc::sigaction(libc::SIGALRM, &action, &mut previous) != 0 {
                    SLOT.store(false, Ordering::Release);
                    return None;
                }

                let Some(replaced) = set_timer(budget, Duration::ZERO) else {
                    libc::sigaction(libc::SIGALRM, &previous, std::ptr::null_mut());
                    SLOT.store(false, Ordering::Release);
                    return None;
                };

                Some(Self {
                    previous,
                    host: HostTimer::from_replaced(&replaced),
                })
            }
        }

        pub(super) fn flag(&self) -> &'static AtomicBool {
            &FIRED
        }
    }

    impl Drop for AlarmTimer {
        fn drop(&mut self) {
            set_timer(Duration::ZERO, Duration::ZERO);

            // A signal raised just before disarming may still be pending;
            // let our handler take it before the previous one is restored.
            unsafe {
                let mut pending: libc::sigset_t = std::mem::zeroed();
                for _ in 0..1_000 {
                    libc::sigemptyset(&mut pending);
                    if libc::sigpending(&mut pending) != 0
                        || libc::sigismember(&pending, libc::SIGALRM) != 1
                    {
                        break;
                    }
                    std::thread::yield_now();
                }
                libc::sigaction(libc::SIGALRM, &self.previous, std::ptr::null_mut());
            }

            if let Some(host) = &self.host {
                host.restore();
            }

            SLOT.store(false, Ordering::Release);
        }
    }

}
