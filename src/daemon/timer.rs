//! Focus timer state machine.
//!
//! This module provides the core timer functionality:
//! - Idle → Running → Idle transitions behind a single lock
//! - A scheduled expiry task per running interval, cancelled on Stop
//! - Event firing for logging and external integrations
//!
//! Both the client-initiated Stop and the expiry task go through
//! [`TimerState::finish`], so exactly one of them wins a race.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, TimeDelta};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::types::TimerConfig;

// ============================================================================
// TimerEvent
// ============================================================================

/// Timer events for logging and external integrations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerEvent {
    /// A focus interval started
    Started {
        /// Wall-clock end of the interval
        deadline: DateTime<Local>,
    },
    /// A running interval was stopped by a client
    Stopped {
        /// Time that was left on the clock
        remaining: Duration,
    },
    /// A running interval reached its deadline
    Expired,
}

// ============================================================================
// TimerError
// ============================================================================

/// Domain errors raised by the timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TimerError {
    /// Start was called while an interval is in flight.
    #[error("tomato is still running (finishes at {})", .deadline.format("%H:%M"))]
    AlreadyRunning {
        /// Deadline of the interval that is already running
        deadline: DateTime<Local>,
    },
}

// ============================================================================
// TimerState
// ============================================================================

/// Why a running interval is being finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FinishReason {
    Requested,
    Expired,
}

/// A countdown in flight.
#[derive(Debug)]
struct RunningTimer {
    /// Monotonic deadline used for arithmetic
    deadline: Instant,
    /// Wall-clock deadline reported to clients
    wall_deadline: DateTime<Local>,
    /// Identifies this run to its expiry task
    generation: u64,
    /// Cancellation handle for the expiry task
    expiry: JoinHandle<()>,
}

impl RunningTimer {
    fn remaining_at(&self, now: Instant) -> Duration {
        self.deadline.saturating_duration_since(now)
    }
}

/// State guarded by the timer lock.
///
/// `running` is `Some` exactly while a countdown is in flight, which keeps the
/// deadline and the cancellation handle from ever disagreeing with it.
#[derive(Debug)]
struct TimerState {
    running: Option<RunningTimer>,
    next_generation: u64,
    events: mpsc::UnboundedSender<TimerEvent>,
}

impl TimerState {
    fn emit(&self, event: TimerEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!("timer event dropped, no receiver");
        }
    }

    /// Running → Idle transition shared by Stop and the expiry task.
    ///
    /// Returns the time that was left, or `None` if nothing was running.
    fn finish(&mut self, now: Instant, reason: FinishReason) -> Option<Duration> {
        let running = self.running.take()?;
        let remaining = running.remaining_at(now);

        match reason {
            FinishReason::Requested => {
                // No-op if the task already completed.
                running.expiry.abort();
                self.emit(TimerEvent::Stopped { remaining });
            }
            FinishReason::Expired => self.emit(TimerEvent::Expired),
        }

        Some(remaining)
    }
}

// ============================================================================
// FocusTimer
// ============================================================================

/// Single countdown timer shared between the IPC handler and its expiry task.
#[derive(Debug)]
pub struct FocusTimer {
    state: Arc<Mutex<TimerState>>,
    config: TimerConfig,
}

impl FocusTimer {
    /// Creates an idle timer with the given configuration and event channel.
    ///
    /// The configuration is expected to pass [`TimerConfig::validate`].
    pub fn new(config: TimerConfig, event_tx: mpsc::UnboundedSender<TimerEvent>) -> Self {
        Self {
            state: Arc::new(Mutex::new(TimerState {
                running: None,
                next_generation: 0,
                events: event_tx,
            })),
            config,
        }
    }

    /// Returns the configured focus duration.
    pub fn focus_duration(&self) -> Duration {
        self.config.focus_duration
    }

    /// Starts a new focus interval and returns its wall-clock deadline.
    ///
    /// Must be called from within a tokio runtime, since it spawns the expiry task.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::AlreadyRunning`] with the existing deadline if an
    /// interval is already in flight. Nothing new is scheduled in that case.
    pub async fn start(&self) -> Result<DateTime<Local>, TimerError> {
        let mut state = self.state.lock().await;

        if let Some(running) = &state.running {
            return Err(TimerError::AlreadyRunning {
                deadline: running.wall_deadline,
            });
        }

        let focus = self.config.focus_duration;
        let deadline = Instant::now() + focus;
        let wall_deadline = wall_clock_after(focus);

        let generation = state.next_generation;
        state.next_generation += 1;

        let expiry = tokio::spawn(expire_at(Arc::clone(&self.state), deadline, generation));

        state.running = Some(RunningTimer {
            deadline,
            wall_deadline,
            generation,
            expiry,
        });
        state.emit(TimerEvent::Started {
            deadline: wall_deadline,
        });

        tracing::info!(
            deadline = %wall_deadline.format("%H:%M:%S"),
            "focus interval started"
        );

        Ok(wall_deadline)
    }

    /// Stops the running interval and returns the time that was left.
    ///
    /// Returns zero without side effects when idle.
    pub async fn stop(&self) -> Duration {
        let mut state = self.state.lock().await;

        match state.finish(Instant::now(), FinishReason::Requested) {
            Some(remaining) => {
                tracing::info!(remaining_secs = remaining.as_secs(), "focus interval stopped");
                remaining
            }
            None => Duration::ZERO,
        }
    }

    /// Returns the time left on the clock, or zero when idle.
    pub async fn remaining(&self) -> Duration {
        let state = self.state.lock().await;

        state
            .running
            .as_ref()
            .map_or(Duration::ZERO, |running| running.remaining_at(Instant::now()))
    }

    /// Returns true while an interval is in flight.
    pub async fn is_running(&self) -> bool {
        self.state.lock().await.running.is_some()
    }

    /// Returns the wall-clock deadline of the running interval.
    pub async fn deadline(&self) -> Option<DateTime<Local>> {
        self.state
            .lock()
            .await
            .running
            .as_ref()
            .map(|running| running.wall_deadline)
    }
}

impl Drop for FocusTimer {
    fn drop(&mut self) {
        // The expiry task holds its own reference to the state.
        if let Ok(mut state) = self.state.try_lock() {
            if let Some(running) = state.running.take() {
                running.expiry.abort();
            }
        }
    }
}

/// Expiry task body: sleeps until the deadline, then finishes its own run.
async fn expire_at(state: Arc<Mutex<TimerState>>, deadline: Instant, generation: u64) {
    tokio::time::sleep_until(deadline).await;

    let mut state = state.lock().await;

    let current = state.running.as_ref().map(|running| running.generation);
    if current != Some(generation) {
        tracing::debug!(generation, "stale expiry ignored");
        return;
    }

    state.finish(Instant::now(), FinishReason::Expired);
    tracing::info!("focus interval finished");
}

/// Local wall-clock time `duration` from now.
fn wall_clock_after(duration: Duration) -> DateTime<Local> {
    let now = Local::now();
    TimeDelta::from_std(duration)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(now)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::sync::mpsc::error::TryRecvError;

    const FOCUS: Duration = Duration::from_secs(25 * 60);

    fn create_timer() -> (FocusTimer, mpsc::UnboundedReceiver<TimerEvent>) {
        create_timer_with(FOCUS)
    }

    fn create_timer_with(focus: Duration) -> (FocusTimer, mpsc::UnboundedReceiver<TimerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (FocusTimer::new(TimerConfig::new(focus), tx), rx)
    }

    /// Lets spawned tasks run without advancing the paused clock.
    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    // ------------------------------------------------------------------------
    // State Transition Tests
    // ------------------------------------------------------------------------

    mod transition_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_new_timer_is_idle() {
            let (timer, _rx) = create_timer();

            assert!(!timer.is_running().await);
            assert_eq!(timer.remaining().await, Duration::ZERO);
            assert_eq!(timer.deadline().await, None);
            assert_eq!(timer.focus_duration(), FOCUS);
        }

        #[tokio::test(start_paused = true)]
        async fn test_start() {
            let (timer, mut rx) = create_timer();

            let before = Local::now();
            let deadline = timer.start().await.unwrap();

            assert!(timer.is_running().await);
            assert_eq!(timer.remaining().await, FOCUS);
            assert_eq!(timer.deadline().await, Some(deadline));
            assert!(deadline >= before + TimeDelta::minutes(25));

            assert_eq!(rx.try_recv().unwrap(), TimerEvent::Started { deadline });
        }

        #[tokio::test(start_paused = true)]
        async fn test_start_already_running() {
            let (timer, _rx) = create_timer();

            let deadline = timer.start().await.unwrap();
            tokio::time::advance(Duration::from_secs(30)).await;
            let result = timer.start().await;

            assert_eq!(result, Err(TimerError::AlreadyRunning { deadline }));
            assert!(result
                .unwrap_err()
                .to_string()
                .contains("still running"));
            // The first interval keeps counting down.
            assert_eq!(timer.remaining().await, FOCUS - Duration::from_secs(30));
        }

        #[tokio::test(start_paused = true)]
        async fn test_stop_returns_remaining() {
            let (timer, mut rx) = create_timer();

            timer.start().await.unwrap();
            let _ = rx.try_recv(); // consume Started

            tokio::time::advance(Duration::from_secs(60)).await;
            let remaining = timer.stop().await;

            assert_eq!(remaining, Duration::from_secs(24 * 60));
            assert!(!timer.is_running().await);
            assert_eq!(timer.remaining().await, Duration::ZERO);
            assert_eq!(timer.deadline().await, None);
            assert_eq!(rx.try_recv().unwrap(), TimerEvent::Stopped { remaining });
        }

        #[tokio::test(start_paused = true)]
        async fn test_stop_idle_is_noop() {
            let (timer, mut rx) = create_timer();

            for _ in 0..3 {
                assert_eq!(timer.stop().await, Duration::ZERO);
            }

            assert!(!timer.is_running().await);
            assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
        }

        #[tokio::test(start_paused = true)]
        async fn test_stop_twice_after_start() {
            let (timer, _rx) = create_timer();

            timer.start().await.unwrap();
            tokio::time::advance(Duration::from_secs(60)).await;

            assert_eq!(timer.stop().await, Duration::from_secs(24 * 60));
            assert_eq!(timer.remaining().await, Duration::ZERO);
            assert_eq!(timer.stop().await, Duration::ZERO);
        }

        #[tokio::test(start_paused = true)]
        async fn test_restart_uses_full_duration() {
            let (timer, _rx) = create_timer();

            timer.start().await.unwrap();
            tokio::time::advance(Duration::from_secs(600)).await;
            timer.stop().await;

            timer.start().await.unwrap();
            assert_eq!(timer.remaining().await, FOCUS);
        }

        #[tokio::test(start_paused = true)]
        async fn test_remaining_decreases() {
            let (timer, _rx) = create_timer();

            timer.start().await.unwrap();
            let first = timer.remaining().await;
            tokio::time::advance(Duration::from_secs(5)).await;
            let second = timer.remaining().await;

            assert!(second < first);
            assert_eq!(first - second, Duration::from_secs(5));
        }
    }

    // ------------------------------------------------------------------------
    // Expiry Tests
    // ------------------------------------------------------------------------

    mod expiry_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_auto_expiry() {
            let (timer, mut rx) = create_timer();

            timer.start().await.unwrap();
            let _ = rx.try_recv(); // consume Started

            // The paused clock auto-advances to the deadline while we wait.
            let event = rx.recv().await.unwrap();

            assert_eq!(event, TimerEvent::Expired);
            assert!(!timer.is_running().await);
            assert_eq!(timer.remaining().await, Duration::ZERO);
            assert_eq!(timer.stop().await, Duration::ZERO);
        }

        #[tokio::test(start_paused = true)]
        async fn test_stop_cancels_expiry() {
            let (timer, mut rx) = create_timer();

            timer.start().await.unwrap();
            timer.stop().await;
            let _ = rx.try_recv(); // Started
            let _ = rx.try_recv(); // Stopped

            tokio::time::advance(FOCUS * 2).await;
            settle().await;

            assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
            assert!(!timer.is_running().await);
        }

        #[tokio::test(start_paused = true)]
        async fn test_rejected_start_does_not_schedule_second_expiry() {
            let (timer, mut rx) = create_timer();

            timer.start().await.unwrap();
            assert!(timer.start().await.is_err());
            let _ = rx.try_recv(); // Started

            assert_eq!(rx.recv().await.unwrap(), TimerEvent::Expired);

            tokio::time::advance(FOCUS * 2).await;
            settle().await;

            assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
        }

        #[tokio::test(start_paused = true)]
        async fn test_old_expiry_does_not_stop_new_interval() {
            let (timer, mut rx) = create_timer();

            timer.start().await.unwrap();
            tokio::time::advance(Duration::from_secs(60)).await;
            timer.stop().await;
            timer.start().await.unwrap();

            // Past the first deadline, short of the second.
            tokio::time::advance(FOCUS - Duration::from_secs(30)).await;
            settle().await;

            assert!(timer.is_running().await);
            let events: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
            assert!(!events.contains(&TimerEvent::Expired));
        }

        #[tokio::test(start_paused = true)]
        async fn test_drop_aborts_pending_expiry() {
            let (timer, mut rx) = create_timer();

            timer.start().await.unwrap();
            let _ = rx.try_recv(); // Started
            drop(timer);

            tokio::time::advance(FOCUS * 2).await;
            settle().await;

            assert!(rx.try_recv().is_err());
        }

        #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
        async fn test_stop_racing_expiry_has_one_winner() {
            for attempt in 0..40u64 {
                let (timer, mut rx) = create_timer_with(Duration::from_millis(20));
                let timer = Arc::new(timer);

                timer.start().await.unwrap();

                // Land the stop on either side of the deadline.
                let delay = Duration::from_millis(17 + attempt % 6);
                let stopper = {
                    let timer = Arc::clone(&timer);
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        timer.stop().await
                    })
                };

                let remaining = stopper.await.unwrap();
                tokio::time::sleep(Duration::from_millis(30)).await;

                assert!(remaining <= Duration::from_millis(20));
                assert!(!timer.is_running().await);

                let events: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
                let terminal = events
                    .iter()
                    .filter(|event| !matches!(event, TimerEvent::Started { .. }))
                    .count();
                assert_eq!(terminal, 1, "attempt {}: {:?}", attempt, events);
            }
        }
    }

    // ------------------------------------------------------------------------
    // TimerEvent Tests
    // ------------------------------------------------------------------------

    mod timer_event_tests {
        use super::*;

        #[test]
        fn test_event_debug() {
            assert_eq!(format!("{:?}", TimerEvent::Expired), "Expired");
        }

        #[test]
        fn test_wall_clock_after() {
            let before = Local::now();
            let later = wall_clock_after(Duration::from_secs(60));
            assert!(later >= before + TimeDelta::seconds(60));
            assert!(later <= Local::now() + TimeDelta::seconds(60));
        }
    }
}
