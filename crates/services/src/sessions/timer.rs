use std::time::Duration;

use study_core::model::{SessionDuration, TimerPhase, TimerState};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::view::TimerView;

const TICK_PERIOD: Duration = Duration::from_secs(1);

/// One elapsed second, stamped with the arming it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerTick {
    epoch: u64,
}

/// Receiving end of the tick channel, handed to the owner of the timer.
#[derive(Debug)]
pub struct TickReceiver {
    inner: mpsc::UnboundedReceiver<TimerTick>,
}

impl TickReceiver {
    /// Waits for the next tick. `None` once the timer is gone.
    pub async fn recv(&mut self) -> Option<TimerTick> {
        self.inner.recv().await
    }

    /// A tick that is already queued, if any.
    pub fn try_recv(&mut self) -> Option<TimerTick> {
        self.inner.try_recv().ok()
    }
}

/// Session countdown driven by a cancellable once-per-second task.
///
/// Ticks are delivered through the channel so the owner applies them with
/// [`CountdownTimer::handle_tick`]. Ticks from an earlier arming are ignored.
#[derive(Debug)]
pub struct CountdownTimer {
    state: TimerState,
    epoch: u64,
    sender: mpsc::UnboundedSender<TimerTick>,
    task: Option<JoinHandle<()>>,
}

impl CountdownTimer {
    #[must_use]
    pub fn new() -> (Self, TickReceiver) {
        let (sender, inner) = mpsc::unbounded_channel();
        let timer = Self {
            state: TimerState::default(),
            epoch: 0,
            sender,
            task: None,
        };
        (timer, TickReceiver { inner })
    }

    /// Reset to the full length of `duration` and start counting down.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self, duration: SessionDuration) {
        self.cancel();
        self.state = TimerState::started(duration);

        let epoch = self.epoch;
        let sender = self.sender.clone();
        self.task = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);
            interval.set_missed_tick_behavior(MissedTickBehavior::Burst);
            loop {
                interval.tick().await;
                if sender.send(TimerTick { epoch }).is_err() {
                    break;
                }
            }
        }));
        tracing::debug!(total_seconds = self.state.total_seconds, epoch, "timer armed");
    }

    /// Apply a tick. Returns whether it changed the countdown.
    pub fn handle_tick(&mut self, tick: TimerTick) -> bool {
        if tick.epoch != self.epoch || !self.state.is_running() {
            return false;
        }
        self.state.tick();
        if self.state.phase == TimerPhase::Expired {
            tracing::debug!(epoch = self.epoch, "timer expired");
            self.cancel();
        }
        true
    }

    /// Stop counting, keeping the remaining time. An expired timer stays expired.
    pub fn pause(&mut self) {
        self.cancel();
        self.state.pause();
    }

    /// Stop and zero the countdown.
    pub fn reset(&mut self) {
        self.cancel();
        self.state = TimerState::default();
    }

    fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            self.epoch = self.epoch.wrapping_add(1);
        }
    }

    #[must_use]
    pub fn state(&self) -> TimerState {
        self.state
    }

    #[must_use]
    pub fn view(&self) -> TimerView {
        TimerView::from_state(&self.state)
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.task.is_some()
    }
}

impl Drop for CountdownTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn drive(timer: &mut CountdownTimer, ticks: &mut TickReceiver, count: u32) {
        for _ in 0..count {
            let tick = ticks.recv().await.unwrap();
            assert!(timer.handle_tick(tick));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn ten_minute_countdown() {
        let (mut timer, mut ticks) = CountdownTimer::new();
        timer.start(SessionDuration::Ten);
        assert_eq!(timer.state().remaining_seconds, 600);

        drive(&mut timer, &mut ticks, 540).await;
        let view = timer.view();
        assert_eq!(view.remaining_seconds, 60);
        assert!(view.last_minute_warning);
        assert_eq!(view.clock_label(), "1:00");

        drive(&mut timer, &mut ticks, 60).await;
        assert_eq!(timer.state().remaining_seconds, 0);
        assert_eq!(timer.state().phase, TimerPhase::Expired);
        assert!(!timer.is_armed());

        let late = TimerTick { epoch: timer.epoch };
        assert!(!timer.handle_tick(late));
        assert_eq!(timer.state().remaining_seconds, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn first_tick_arrives_after_one_second() {
        let (mut timer, mut ticks) = CountdownTimer::new();
        let started = Instant::now();
        timer.start(SessionDuration::Five);
        let tick = ticks.recv().await.unwrap();
        let elapsed = started.elapsed();
        assert!(elapsed >= TICK_PERIOD && elapsed < TICK_PERIOD * 2);
        assert!(timer.handle_tick(tick));
        assert_eq!(timer.state().remaining_seconds, 299);
    }

    #[tokio::test(start_paused = true)]
    async fn queued_tick_is_ignored_after_pause() {
        let (mut timer, mut ticks) = CountdownTimer::new();
        timer.start(SessionDuration::Five);
        tokio::time::sleep(Duration::from_millis(1_500)).await;

        timer.pause();
        let queued = ticks.try_recv().expect("tick sent before pause");
        assert!(!timer.handle_tick(queued));
        assert_eq!(timer.state().remaining_seconds, 300);
        assert_eq!(timer.state().phase, TimerPhase::Stopped);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(ticks.try_recv().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_is_idempotent() {
        let (mut timer, _ticks) = CountdownTimer::new();
        timer.start(SessionDuration::Five);
        timer.pause();
        let epoch = timer.epoch;
        timer.pause();
        timer.reset();
        assert_eq!(timer.epoch, epoch);
        assert_eq!(timer.state(), TimerState::default());
    }

    #[tokio::test(start_paused = true)]
    async fn restart_ignores_ticks_of_previous_arming() {
        let (mut timer, mut ticks) = CountdownTimer::new();
        timer.start(SessionDuration::Five);
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        timer.start(SessionDuration::Fifteen);

        let stale = ticks.try_recv().unwrap();
        assert!(!timer.handle_tick(stale));
        drive(&mut timer, &mut ticks, 1).await;
        assert_eq!(timer.state().remaining_seconds, 899);
    }

    #[tokio::test(start_paused = true)]
    async fn drop_stops_the_task() {
        let (mut timer, mut ticks) = CountdownTimer::new();
        timer.start(SessionDuration::Five);
        drop(timer);
        assert!(ticks.recv().await.is_none());
    }
}
