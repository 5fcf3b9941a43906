//! Cancellation sources for the main loop (§5): a process-wide signal-handled
//! quit flag and a wall-clock timeout. Grounded verbatim on the teacher
//! crate's `src/terminators.rs`, adapted from the optimization `Status` enum
//! to the engine's own [`TerminationReason`].
//!
//! Neither terminator interrupts a simplex step in progress; both are
//! polled once per main-loop iteration boundary by
//! [`crate::engine::EngineDriver`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Why the main loop should stop before reaching SAT/UNSAT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    Timeout,
    Interrupted,
}

pub trait Terminator {
    fn initialize(&mut self) {}

    /// Polled once per main-loop iteration. Returns `Some` the first time
    /// termination is warranted.
    fn check(&mut self) -> Option<TerminationReason>;
}

/// Responds to Ctrl-C (SIGINT) or a programmatic interrupt.
///
/// # Note
/// Installs a global signal handler and can only be constructed once per
/// process; constructing a second instance panics (via `ctrlc`'s own
/// double-registration error).
pub struct InterruptTerminator {
    interrupted: Arc<AtomicBool>,
}

impl InterruptTerminator {
    pub fn new() -> Self {
        let interrupted = Arc::new(AtomicBool::new(false));
        ctrlc::set_handler({
            let interrupted = interrupted.clone();
            move || {
                interrupted.store(true, Ordering::SeqCst);
            }
        })
        .expect("Error setting Ctrl-C handler");
        Self { interrupted }
    }

    /// Requests termination programmatically, without an actual signal.
    pub fn interrupt(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
    }

    /// An [`Arc`] clone of the interrupt flag, for handing to callers that
    /// want to request a quit from another thread without depending on this
    /// struct.
    pub fn flag(&self) -> Arc<AtomicBool> {
        self.interrupted.clone()
    }
}

impl Default for InterruptTerminator {
    fn default() -> Self {
        Self::new()
    }
}

impl Terminator for InterruptTerminator {
    fn check(&mut self) -> Option<TerminationReason> {
        if self.interrupted.load(Ordering::SeqCst) {
            Some(TerminationReason::Interrupted)
        } else {
            None
        }
    }
}

/// Terminates after `max_time_secs` seconds have elapsed since
/// `initialize()`. A limit of `0` means unbounded (§8 boundary behavior).
pub struct TimeOutTerminator {
    max_time_secs: u64,
    start_time: std::time::Instant,
}

impl TimeOutTerminator {
    pub fn new(max_time_secs: u64) -> Self {
        Self {
            max_time_secs,
            start_time: std::time::Instant::now(),
        }
    }
}

impl Terminator for TimeOutTerminator {
    fn initialize(&mut self) {
        self.start_time = std::time::Instant::now();
    }

    fn check(&mut self) -> Option<TerminationReason> {
        if self.max_time_secs == 0 {
            return None;
        }
        if self.start_time.elapsed().as_secs() >= self.max_time_secs {
            Some(TerminationReason::Timeout)
        } else {
            None
        }
    }
}

/// Combines multiple terminators, triggering if any of them do.
pub struct MultipleTerminators {
    terminators: Vec<Box<dyn Terminator>>,
}

impl MultipleTerminators {
    pub fn new(terminators: Vec<Box<dyn Terminator>>) -> Self {
        Self { terminators }
    }
}

impl Terminator for MultipleTerminators {
    fn initialize(&mut self) {
        for terminator in &mut self.terminators {
            terminator.initialize();
        }
    }

    fn check(&mut self) -> Option<TerminationReason> {
        for terminator in &mut self.terminators {
            if let Some(reason) = terminator.check() {
                return Some(reason);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    mod platform {
        pub fn send_sigint() {
            use nix::sys::signal::{self, Signal};
            use nix::unistd::Pid;

            let pid = std::process::id() as i32;
            signal::kill(Pid::from_raw(pid), Signal::SIGINT).expect("Failed to send SIGINT");
        }
    }

    #[test]
    fn timeout_of_zero_is_unbounded() {
        let mut t = TimeOutTerminator::new(0);
        t.initialize();
        std::thread::sleep(std::time::Duration::from_millis(10));
        assert_eq!(t.check(), None);
    }

    #[test]
    fn timeout_fires_after_elapsed() {
        let mut t = TimeOutTerminator::new(1);
        t.initialize();
        assert_eq!(t.check(), None);
        std::thread::sleep(std::time::Duration::from_millis(1100));
        assert_eq!(t.check(), Some(TerminationReason::Timeout));
    }

    #[test]
    fn interrupt_can_be_requested_programmatically() {
        // Avoid installing a real ctrlc handler in the test process; drive
        // the flag directly the way `interrupt()` would.
        let flag = Arc::new(AtomicBool::new(false));
        let mut t = InterruptTerminator { interrupted: flag.clone() };
        assert_eq!(t.check(), None);
        flag.store(true, Ordering::SeqCst);
        assert_eq!(t.check(), Some(TerminationReason::Interrupted));
    }

    #[test]
    #[cfg(unix)]
    #[ignore = "sends a real SIGINT to the test process"]
    fn interrupt_terminator_catches_sigint() {
        let mut terminator = InterruptTerminator::new();
        std::thread::spawn(|| {
            std::thread::sleep(std::time::Duration::from_millis(200));
            platform::send_sigint();
        });

        loop {
            if let Some(reason) = terminator.check() {
                assert_eq!(reason, TerminationReason::Interrupted);
                break;
            }
        }
    }
}
