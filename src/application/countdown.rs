use crate::application::cycle_store::CycleStore;
use crate::domain::models::Cycle;
use crate::infrastructure::cycles_state_repository::CyclesStateRepository;
use crate::infrastructure::error::InfraError;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::MissedTickBehavior;

pub fn elapsed_seconds(started_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - started_at).num_seconds().max(0)
}

pub fn remaining_seconds(planned_minutes: u32, elapsed_seconds: i64) -> i64 {
    (i64::from(planned_minutes) * 60 - elapsed_seconds).max(0)
}

pub fn format_remaining(seconds: i64) -> String {
    let seconds = seconds.max(0);
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Running {
        elapsed_seconds: i64,
        remaining_seconds: i64,
    },
    Finished(Cycle),
    /// The tracked cycle is no longer running; nothing was changed.
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountdownEnd {
    Finished(Cycle),
    Interrupted(Option<Cycle>),
    Stopped,
}

/// Follows one cycle from creation until it stops running.
#[derive(Debug, Clone)]
pub struct Countdown {
    cycle_id: String,
    done: bool,
}

impl Countdown {
    pub fn start(cycle: &Cycle) -> Self {
        Self {
            cycle_id: cycle.id.clone(),
            done: cycle.is_terminal(),
        }
    }

    /// Follows `cycle_id` without looking it up; the first tick settles whether it runs.
    pub fn follow(cycle_id: impl Into<String>) -> Self {
        Self {
            cycle_id: cycle_id.into(),
            done: false,
        }
    }

    pub fn for_active<R: CyclesStateRepository>(store: &CycleStore<R>) -> Option<Self> {
        store.active_cycle().map(Self::start)
    }

    pub fn cycle_id(&self) -> &str {
        &self.cycle_id
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn tick<R: CyclesStateRepository>(&mut self, store: &mut CycleStore<R>) -> TickOutcome {
        if self.done {
            return TickOutcome::Stopped;
        }
        store.reload();
        let Some(active) = store
            .active_cycle()
            .filter(|cycle| cycle.id == self.cycle_id)
        else {
            self.done = true;
            return TickOutcome::Stopped;
        };

        let elapsed = elapsed_seconds(active.started_at, store.now());
        if elapsed < active.planned_seconds() {
            return TickOutcome::Running {
                elapsed_seconds: elapsed,
                remaining_seconds: remaining_seconds(active.planned_minutes, elapsed),
            };
        }

        self.done = true;
        match store.finish_active_cycle() {
            Some(cycle) => TickOutcome::Finished(cycle),
            None => TickOutcome::Stopped,
        }
    }
}

/// Ticks `countdown` every `period` until its cycle stops running or `cancel`
/// resolves. Cancelling interrupts the cycle if it is still the active one.
pub async fn run_countdown<R, C, F>(
    store: &Mutex<CycleStore<R>>,
    mut countdown: Countdown,
    period: Duration,
    cancel: C,
    mut on_tick: F,
) -> Result<CountdownEnd, InfraError>
where
    R: CyclesStateRepository,
    C: Future<Output = ()>,
    F: FnMut(&TickOutcome),
{
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(cancel);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let outcome = {
                    let mut store = lock_store(store)?;
                    countdown.tick(&mut *store)
                };
                on_tick(&outcome);
                match outcome {
                    TickOutcome::Running { .. } => {}
                    TickOutcome::Finished(cycle) => {
                        tracing::info!(cycle_id = %cycle.id, "cycle finished");
                        return Ok(CountdownEnd::Finished(cycle));
                    }
                    TickOutcome::Stopped => {
                        tracing::debug!(cycle_id = countdown.cycle_id(), "countdown stopped");
                        return Ok(CountdownEnd::Stopped);
                    }
                }
            }
            _ = &mut cancel => {
                let mut store = lock_store(store)?;
                store.reload();
                let still_active = store
                    .active_cycle()
                    .is_some_and(|cycle| cycle.id == countdown.cycle_id());
                let interrupted = if still_active {
                    store.interrupt_active_cycle()
                } else {
                    None
                };
                tracing::info!(cycle_id = countdown.cycle_id(), "countdown cancelled");
                return Ok(CountdownEnd::Interrupted(interrupted));
            }
        }
    }
}

fn lock_store<R: CyclesStateRepository>(
    store: &Mutex<CycleStore<R>>,
) -> Result<MutexGuard<'_, CycleStore<R>>, InfraError> {
    store
        .lock()
        .map_err(|error| InfraError::InvalidState(format!("cycle store lock poisoned: {error}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::cycle_store::NowProvider;
    use crate::domain::models::CycleStatus;
    use crate::infrastructure::cycles_state_repository::InMemoryCyclesStateRepository;
    use std::sync::Arc;

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn manual_clock(start: DateTime<Utc>) -> (Arc<Mutex<DateTime<Utc>>>, NowProvider) {
        let current = Arc::new(Mutex::new(start));
        let handle = Arc::clone(&current);
        let provider: NowProvider = Arc::new(move || *handle.lock().expect("clock lock"));
        (current, provider)
    }

    // Wall clock that follows tokio's paused time.
    fn tokio_clock(start: DateTime<Utc>) -> NowProvider {
        let origin = tokio::time::Instant::now();
        Arc::new(move || {
            start + chrono::Duration::from_std(origin.elapsed()).expect("elapsed fits in chrono")
        })
    }

    fn store_with(clock: NowProvider) -> CycleStore<InMemoryCyclesStateRepository> {
        CycleStore::open(Arc::new(InMemoryCyclesStateRepository::default())).with_now_provider(clock)
    }

    #[test]
    fn elapsed_and_remaining_are_floored_at_zero() {
        let started_at = fixed_time("2026-02-16T09:00:00Z");
        assert_eq!(elapsed_seconds(started_at, fixed_time("2026-02-16T08:59:00Z")), 0);
        assert_eq!(elapsed_seconds(started_at, fixed_time("2026-02-16T09:01:30Z")), 90);
        assert_eq!(remaining_seconds(25, 90), 1410);
        assert_eq!(remaining_seconds(5, 400), 0);
    }

    #[test]
    fn format_remaining_pads_minutes_and_seconds() {
        assert_eq!(format_remaining(1500), "25:00");
        assert_eq!(format_remaining(65), "01:05");
        assert_eq!(format_remaining(0), "00:00");
        assert_eq!(format_remaining(-3), "00:00");
    }

    #[test]
    fn tick_finishes_cycle_once_planned_time_has_elapsed() {
        let (current, clock) = manual_clock(fixed_time("2026-02-16T09:00:00Z"));
        let mut store = store_with(clock);
        let cycle = store.create_cycle("Write report", 25);
        let mut countdown = Countdown::start(&cycle);

        *current.lock().expect("clock lock") = fixed_time("2026-02-16T09:10:00Z");
        assert_eq!(
            countdown.tick(&mut store),
            TickOutcome::Running {
                elapsed_seconds: 600,
                remaining_seconds: 900,
            }
        );

        *current.lock().expect("clock lock") = fixed_time("2026-02-16T09:25:00Z");
        let TickOutcome::Finished(finished) = countdown.tick(&mut store) else {
            panic!("expected finished outcome");
        };
        assert_eq!(finished.id, cycle.id);
        assert_eq!(finished.finished_at, Some(fixed_time("2026-02-16T09:25:00Z")));
        assert_eq!(store.state().active_cycle_id, None);
        assert!(countdown.is_done());
    }

    #[test]
    fn late_tick_after_terminal_cycle_changes_nothing() {
        let (current, clock) = manual_clock(fixed_time("2026-02-16T09:00:00Z"));
        let mut store = store_with(clock);
        let cycle = store.create_cycle("Write report", 25);
        let mut countdown = Countdown::start(&cycle);

        *current.lock().expect("clock lock") = fixed_time("2026-02-16T09:26:00Z");
        assert!(matches!(countdown.tick(&mut store), TickOutcome::Finished(_)));
        let snapshot = store.state().clone();

        *current.lock().expect("clock lock") = fixed_time("2026-02-16T09:27:00Z");
        assert_eq!(countdown.tick(&mut store), TickOutcome::Stopped);
        assert_eq!(store.state(), &snapshot);
    }

    #[test]
    fn tick_does_not_touch_a_replacement_cycle() {
        let (current, clock) = manual_clock(fixed_time("2026-02-16T09:00:00Z"));
        let mut store = store_with(clock);
        let first = store.create_cycle("First", 5);
        let mut countdown = Countdown::start(&first);

        store.interrupt_active_cycle();
        let second = store.create_cycle("Second", 5);
        *current.lock().expect("clock lock") = fixed_time("2026-02-16T10:00:00Z");

        assert_eq!(countdown.tick(&mut store), TickOutcome::Stopped);
        assert_eq!(store.active_cycle(), Some(&second));
    }

    #[test]
    fn countdown_resumes_from_rehydrated_start() {
        let (current, clock) = manual_clock(fixed_time("2026-02-16T09:00:00Z"));
        let repository = Arc::new(InMemoryCyclesStateRepository::default());
        let mut first = CycleStore::open(Arc::clone(&repository)).with_now_provider(Arc::clone(&clock));
        first.create_cycle("Write report", 25);

        *current.lock().expect("clock lock") = fixed_time("2026-02-16T09:20:00Z");
        let mut reopened = CycleStore::open(repository).with_now_provider(clock);
        let mut countdown = Countdown::for_active(&reopened).expect("active countdown");

        assert_eq!(
            countdown.tick(&mut reopened),
            TickOutcome::Running {
                elapsed_seconds: 1200,
                remaining_seconds: 300,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn run_countdown_finishes_after_planned_duration() {
        let mut store = store_with(tokio_clock(fixed_time("2026-02-16T09:00:00Z")));
        let cycle = store.create_cycle("Write report", 25);
        let store = Mutex::new(store);
        let mut ticks = 0usize;

        let end = run_countdown(
            &store,
            Countdown::start(&cycle),
            Duration::from_secs(1),
            std::future::pending::<()>(),
            |_| ticks += 1,
        )
        .await
        .expect("run countdown");

        let CountdownEnd::Finished(finished) = end else {
            panic!("expected finished countdown");
        };
        assert_eq!(finished.id, cycle.id);
        assert_eq!(finished.finished_at, Some(fixed_time("2026-02-16T09:25:00Z")));
        assert_eq!(ticks, 1501);
        assert_eq!(store.lock().expect("store lock").active_cycle(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn run_countdown_cancel_interrupts_active_cycle() {
        let mut store = store_with(tokio_clock(fixed_time("2026-02-16T09:00:00Z")));
        let cycle = store.create_cycle("X", 10);
        let store = Mutex::new(store);

        let end = run_countdown(
            &store,
            Countdown::start(&cycle),
            Duration::from_secs(1),
            tokio::time::sleep(Duration::from_millis(3_500)),
            |_| {},
        )
        .await
        .expect("run countdown");

        let CountdownEnd::Interrupted(Some(stopped)) = end else {
            panic!("expected interrupted countdown");
        };
        assert_eq!(stopped.stopped_at, Some(fixed_time("2026-02-16T09:00:03.500Z")));
        assert_eq!(stopped.finished_at, None);
    }

    #[test]
    fn tick_sees_interrupt_made_through_another_store() {
        let (current, clock) = manual_clock(fixed_time("2026-02-16T09:00:00Z"));
        let repository = Arc::new(InMemoryCyclesStateRepository::default());
        let mut watcher =
            CycleStore::open(Arc::clone(&repository)).with_now_provider(Arc::clone(&clock));
        let first = watcher.create_cycle("First", 5);
        let mut countdown = Countdown::start(&first);

        let mut other = CycleStore::open(Arc::clone(&repository)).with_now_provider(clock);
        other.interrupt_active_cycle();
        *current.lock().expect("clock lock") = fixed_time("2026-02-16T09:02:00Z");
        other.create_cycle("Second", 25);

        *current.lock().expect("clock lock") = fixed_time("2026-02-16T09:05:00Z");
        assert_eq!(countdown.tick(&mut watcher), TickOutcome::Stopped);

        let stored = repository.load().expect("load").expect("stored state");
        assert_eq!(stored.cycles.len(), 2);
        assert_eq!(stored.cycles[0].status(), CycleStatus::Interrupted);
        assert_eq!(stored.active_cycle().map(|cycle| cycle.task.as_str()), Some("Second"));
    }

    #[test]
    fn followed_unknown_cycle_stops_on_first_tick() {
        let mut store = store_with(Arc::new(Utc::now));
        let mut countdown = Countdown::follow("cyc-missing");
        assert!(!countdown.is_done());
        assert_eq!(countdown.tick(&mut store), TickOutcome::Stopped);
        assert!(countdown.is_done());
    }

    #[tokio::test(start_paused = true)]
    async fn run_countdown_stops_when_cycle_is_already_terminal() {
        let mut store = store_with(tokio_clock(fixed_time("2026-02-16T09:00:00Z")));
        let cycle = store.create_cycle("X", 10);
        store.interrupt_active_cycle();
        let store = Mutex::new(store);

        let end = run_countdown(
            &store,
            Countdown::start(&cycle),
            Duration::from_secs(1),
            std::future::pending::<()>(),
            |_| {},
        )
        .await
        .expect("run countdown");

        assert_eq!(end, CountdownEnd::Stopped);
    }
}
