//! The promotion countdown.
//!
//! [`Countdown`] is the state machine: `running → done`, the transition
//! happening on the first tick at which the promotion end has been
//! reached.  That transition publishes [`COUNTDOWN_DONE`] on the bus,
//! exactly once per instance, so that the purchase affordances can be
//! disabled by whoever cares without the countdown knowing about them.
//!
//! [`CountdownDriver`] runs the ticks on the ambient executor and stops
//! by itself once the countdown is done.
use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use any_spawner::Executor;
use serde::{Deserialize, Serialize};

use crate::{
    bus::{EventBus, COUNTDOWN_DONE},
    error::Result,
    time::{sleep, Clock},
};

/// Time left until the end of the promotion.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountdownState {
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
    pub done: bool,
}

impl CountdownState {
    /// The state at `now_ms` of a promotion ending at `end_at_ms`.
    pub fn at(end_at_ms: u64, now_ms: u64) -> Self {
        let remaining = end_at_ms.saturating_sub(now_ms);
        let total = remaining / 1000;
        Self {
            hours: total / 3600,
            minutes: (total % 3600) / 60,
            seconds: total % 60,
            done: remaining == 0,
        }
    }

    pub fn total_seconds(&self) -> u64 {
        self.hours * 3600 + self.minutes * 60 + self.seconds
    }
}

impl fmt::Display for CountdownState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hours, self.minutes, self.seconds)
    }
}

/// What a single [`Countdown::tick`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tick {
    Running(CountdownState),
    /// This tick completed the countdown.
    Finished(CountdownState),
    /// The countdown had already finished; nothing was done.
    Stopped(CountdownState),
}

#[derive(Clone, Debug)]
pub struct Countdown {
    end_at: u64,
    state: CountdownState,
    bus: EventBus,
}

impl Countdown {
    pub fn new(end_at_ms: u64, now_ms: u64, bus: EventBus) -> Self {
        Self {
            end_at: end_at_ms,
            state: Self::running_state(end_at_ms, now_ms),
            bus,
        }
    }

    // done only ever flips in `tick`, which is what announces it
    fn running_state(end_at_ms: u64, now_ms: u64) -> CountdownState {
        CountdownState {
            done: false,
            ..CountdownState::at(end_at_ms, now_ms)
        }
    }

    pub fn end_at(&self) -> u64 {
        self.end_at
    }

    pub fn state(&self) -> CountdownState {
        self.state
    }

    pub fn is_done(&self) -> bool {
        self.state.done
    }

    /// Recompute the state at `now_ms`.
    ///
    /// On the tick that completes the countdown [`COUNTDOWN_DONE`] is
    /// published; a subscriber failure is returned, but the countdown is
    /// done regardless and will not publish again.
    pub fn tick(&mut self, now_ms: u64) -> Result<Tick> {
        if self.state.done {
            return Ok(Tick::Stopped(self.state));
        }
        self.state = CountdownState::at(self.end_at, now_ms);
        if !self.state.done {
            return Ok(Tick::Running(self.state));
        }
        leptos::logging::log!("countdown: promotion ended");
        self.bus.publish(&COUNTDOWN_DONE, &())?;
        Ok(Tick::Finished(self.state))
    }

    /// Start over, running towards a new end.
    pub fn restart(&mut self, end_at_ms: u64, now_ms: u64) {
        self.end_at = end_at_ms;
        self.state = Self::running_state(end_at_ms, now_ms);
    }
}

/// Runs a [`Countdown`] on a fixed interval.
pub struct CountdownDriver;

/// Returned by [`CountdownDriver::spawn`].
#[derive(Clone, Debug)]
pub struct CountdownHandle {
    running: Arc<AtomicBool>,
}

impl CountdownHandle {
    /// Stop ticking; the task ends at its next wake up.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl CountdownDriver {
    /// Tick `countdown` now and then every `interval`, reporting each
    /// state to `on_tick`, until it is done or the handle is stopped.
    pub fn spawn<C, F>(
        mut countdown: Countdown,
        clock: C,
        interval: Duration,
        on_tick: F,
    ) -> CountdownHandle
    where
        C: Clock,
        F: Fn(CountdownState) + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let task = {
            let running = running.clone();
            async move {
                while running.load(Ordering::SeqCst) {
                    let finished = match countdown.tick(clock.now_ms()) {
                        Ok(Tick::Running(state)) => {
                            on_tick(state);
                            false
                        }
                        Ok(Tick::Finished(state)) => {
                            on_tick(state);
                            true
                        }
                        Ok(Tick::Stopped(_)) => true,
                        Err(error) => {
                            leptos::logging::error!("countdown: {error}");
                            on_tick(countdown.state());
                            true
                        }
                    };
                    if finished {
                        break;
                    }
                    sleep(interval).await;
                }
                running.store(false, Ordering::SeqCst);
            }
        };
        Executor::spawn(task);
        CountdownHandle { running }
    }
}
