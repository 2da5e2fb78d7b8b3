use crate::domain::models::{Cycle, CycleTransition, CyclesState};
use crate::infrastructure::cycles_state_repository::CyclesStateRepository;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id(prefix: &str) -> String {
    let sequence = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{}-{sequence}", Utc::now().timestamp_micros())
}

/// Owns the cycle aggregate and writes it through the repository after each change.
pub struct CycleStore<R>
where
    R: CyclesStateRepository,
{
    state: CyclesState,
    repository: Arc<R>,
    now_provider: NowProvider,
}

impl<R> CycleStore<R>
where
    R: CyclesStateRepository,
{
    pub fn open(repository: Arc<R>) -> Self {
        let state = read_stored(&*repository).unwrap_or_default();
        Self {
            state,
            repository,
            now_provider: Arc::new(Utc::now),
        }
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.now_provider)()
    }

    pub fn state(&self) -> &CyclesState {
        &self.state
    }

    pub fn cycles(&self) -> &[Cycle] {
        &self.state.cycles
    }

    pub fn cycle(&self, cycle_id: &str) -> Option<&Cycle> {
        self.state.cycles.iter().find(|cycle| cycle.id == cycle_id)
    }

    pub fn active_cycle(&self) -> Option<&Cycle> {
        self.state.active_cycle()
    }

    /// Picks up writes made through the same repository by another store.
    /// The current state is kept when the stored one cannot be read.
    pub fn reload(&mut self) {
        if let Some(state) = read_stored(&*self.repository) {
            self.state = state;
        }
    }

    /// Starts a new running cycle. Any cycle that is already running is left as is.
    pub fn create_cycle(&mut self, task: impl Into<String>, planned_minutes: u32) -> Cycle {
        self.reload();
        let now = self.now();
        let cycle = Cycle::new(next_id("cyc"), task, planned_minutes, now);
        let transition = CycleTransition::CreateCycle {
            id: cycle.id.clone(),
            task: cycle.task.clone(),
            planned_minutes,
        };
        let next = self.state.apply(&transition, now);
        self.commit(next, &transition);
        cycle
    }

    pub fn interrupt_active_cycle(&mut self) -> Option<Cycle> {
        self.dispatch(CycleTransition::InterruptActiveCycle)
    }

    pub fn finish_active_cycle(&mut self) -> Option<Cycle> {
        self.dispatch(CycleTransition::FinishActiveCycle)
    }

    /// Applies `transition` and returns the cycle it created or closed, or `None`
    /// when the transition had nothing to act on.
    pub fn dispatch(&mut self, transition: CycleTransition) -> Option<Cycle> {
        self.reload();
        let now = self.now();
        let next = self.state.apply(&transition, now);
        if next == self.state {
            tracing::debug!(transition = transition.name(), "transition was a no-op");
            return None;
        }

        let touched_id = match &transition {
            CycleTransition::CreateCycle { id, .. } => Some(id.clone()),
            CycleTransition::InterruptActiveCycle | CycleTransition::FinishActiveCycle => {
                self.state.active_cycle_id.clone()
            }
        };
        self.commit(next, &transition);
        touched_id.and_then(|id| self.cycle(&id).cloned())
    }

    fn commit(&mut self, next: CyclesState, transition: &CycleTransition) {
        self.state = next;
        if let Err(error) = self.repository.save(&self.state) {
            tracing::warn!(
                transition = transition.name(),
                %error,
                "failed to persist cycles state"
            );
        }
    }
}

fn read_stored<R: CyclesStateRepository>(repository: &R) -> Option<CyclesState> {
    match repository.load() {
        Ok(Some(state)) => match state.validate() {
            Ok(()) => Some(state),
            Err(reason) => {
                tracing::warn!(%reason, "ignoring invalid stored cycles state");
                None
            }
        },
        Ok(None) => Some(CyclesState::default()),
        Err(error) => {
            tracing::warn!(%error, "failed to load stored cycles state");
            None
        }
    }
}
