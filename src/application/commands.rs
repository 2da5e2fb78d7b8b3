use crate::application::bootstrap::bootstrap_workspace;
use crate::application::countdown::{
    elapsed_seconds, format_remaining, remaining_seconds, run_countdown, Countdown, CountdownEnd,
    TickOutcome,
};
use crate::application::cycle_store::{CycleStore, NowProvider};
use crate::application::history::{history_items, HistoryItem};
use crate::application::new_cycle_form::{MinutesRange, NewCycleForm};
use crate::domain::models::Cycle;
use crate::infrastructure::config::{load_app_config, AppConfig};
use crate::infrastructure::cycles_state_repository::SqliteCyclesStateRepository;
use crate::infrastructure::error::InfraError;
use chrono::Utc;
use serde::Serialize;
use std::fs::OpenOptions;
use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

pub type AppCycleStore = CycleStore<SqliteCyclesStateRepository>;

pub struct AppState {
    config: AppConfig,
    database_path: PathBuf,
    logs_dir: PathBuf,
    store: Mutex<AppCycleStore>,
    log_guard: Mutex<()>,
}

impl AppState {
    pub fn new(workspace_root: PathBuf) -> Result<Self, InfraError> {
        Self::with_now_provider(workspace_root, Arc::new(Utc::now))
    }

    pub fn with_now_provider(
        workspace_root: PathBuf,
        now_provider: NowProvider,
    ) -> Result<Self, InfraError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        let config = load_app_config(&bootstrap.config_dir)?;
        let repository = Arc::new(SqliteCyclesStateRepository::new(
            &bootstrap.database_path,
            config.storage_key.clone(),
        ));
        tracing::debug!(
            key = repository.key(),
            database = %bootstrap.database_path.display(),
            "opening cycle store"
        );
        let store = CycleStore::open(repository).with_now_provider(now_provider);

        Ok(Self {
            config,
            database_path: bootstrap.database_path,
            logs_dir: bootstrap.logs_dir,
            store: Mutex::new(store),
            log_guard: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    pub fn store(&self) -> &Mutex<AppCycleStore> {
        &self.store
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.config.tick_interval_ms)
    }

    pub fn command_error(&self, command: &str, error: &InfraError) -> String {
        self.log_error(command, &error.to_string());
        error.to_string()
    }

    pub fn log_info(&self, command: &str, message: &str) {
        self.append_log("info", command, message);
    }

    pub fn log_error(&self, command: &str, message: &str) {
        self.append_log("error", command, message);
    }

    fn append_log(&self, level: &str, command: &str, message: &str) {
        let Ok(_guard) = self.log_guard.lock() else {
            return;
        };
        let path = self.logs_dir.join("commands.log");
        let payload = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "level": level,
            "command": command,
            "message": message,
        });

        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let _ = writeln!(file, "{}", payload);
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ActiveCycleResponse {
    pub id: String,
    pub task: String,
    pub planned_minutes: u32,
    pub started_at: String,
    pub elapsed_seconds: i64,
    pub remaining_seconds: i64,
    pub remaining: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TimerStateResponse {
    pub active_cycle: Option<ActiveCycleResponse>,
    pub finished_cycle_id: Option<String>,
}

pub fn create_cycle_impl(
    state: &AppState,
    task: String,
    minutes_amount: String,
) -> Result<Cycle, InfraError> {
    let input = NewCycleForm::new(task, minutes_amount)
        .validate(MinutesRange::from(state.config()))
        .map_err(|errors| InfraError::InvalidInput(errors.to_string()))?;

    let mut store = lock_store(state)?;
    store.reload();
    if let Some(active) = store.active_cycle() {
        return Err(InfraError::InvalidInput(format!(
            "cycle already running: {}",
            active.task
        )));
    }

    let cycle = store.create_cycle(input.task, input.planned_minutes);
    state.log_info(
        "create_cycle",
        &format!(
            "created cycle_id={} planned_minutes={}",
            cycle.id, cycle.planned_minutes
        ),
    );
    Ok(cycle)
}

pub fn interrupt_cycle_impl(state: &AppState) -> Result<Option<Cycle>, InfraError> {
    let mut store = lock_store(state)?;
    let interrupted = store.interrupt_active_cycle();
    match &interrupted {
        Some(cycle) => state.log_info(
            "interrupt_cycle",
            &format!("interrupted cycle_id={}", cycle.id),
        ),
        None => state.log_info("interrupt_cycle", "no active cycle"),
    }
    Ok(interrupted)
}

/// Snapshot for the timer view. Runs one tick first so a cycle whose time ran
/// out while nothing was watching is finished before it is reported.
pub fn get_timer_state_impl(state: &AppState) -> Result<TimerStateResponse, InfraError> {
    let mut store = lock_store(state)?;
    store.reload();
    let mut finished_cycle_id = None;
    if let Some(mut countdown) = Countdown::for_active(&*store) {
        if let TickOutcome::Finished(cycle) = countdown.tick(&mut *store) {
            state.log_info(
                "get_timer_state",
                &format!("finished expired cycle_id={}", cycle.id),
            );
            finished_cycle_id = Some(cycle.id);
        }
    }

    let now = store.now();
    let active_cycle = store.active_cycle().map(|cycle| {
        let elapsed = elapsed_seconds(cycle.started_at, now);
        let remaining = remaining_seconds(cycle.planned_minutes, elapsed);
        ActiveCycleResponse {
            id: cycle.id.clone(),
            task: cycle.task.clone(),
            planned_minutes: cycle.planned_minutes,
            started_at: cycle.started_at.to_rfc3339(),
            elapsed_seconds: elapsed,
            remaining_seconds: remaining,
            remaining: format_remaining(remaining),
        }
    });

    Ok(TimerStateResponse {
        active_cycle,
        finished_cycle_id,
    })
}

pub fn list_history_impl(state: &AppState) -> Result<Vec<HistoryItem>, InfraError> {
    let tz = state.config().time_zone()?;
    let mut store = lock_store(state)?;
    store.reload();
    Ok(history_items(store.cycles(), store.now(), tz))
}

/// Counts down `cycle_id`, normally the active cycle reported by
/// `get_timer_state_impl`, until it ends or `cancel` resolves.
pub async fn watch_cycle_impl<C, F>(
    state: &AppState,
    cycle_id: &str,
    cancel: C,
    on_tick: F,
) -> Result<CountdownEnd, InfraError>
where
    C: Future<Output = ()>,
    F: FnMut(&TickOutcome),
{
    let countdown = Countdown::follow(cycle_id);
    state.log_info(
        "watch_cycle",
        &format!("watching cycle_id={}", countdown.cycle_id()),
    );

    let end = run_countdown(state.store(), countdown, state.tick_interval(), cancel, on_tick).await?;
    let message = match &end {
        CountdownEnd::Finished(cycle) => format!("finished cycle_id={}", cycle.id),
        CountdownEnd::Interrupted(Some(cycle)) => format!("interrupted cycle_id={}", cycle.id),
        CountdownEnd::Interrupted(None) => "cancelled without active cycle".to_string(),
        CountdownEnd::Stopped => "cycle stopped elsewhere".to_string(),
    };
    state.log_info("watch_cycle", &message);
    Ok(end)
}

fn lock_store(state: &AppState) -> Result<MutexGuard<'_, AppCycleStore>, InfraError> {
    state
        .store
        .lock()
        .map_err(|error| InfraError::InvalidState(format!("cycle store lock poisoned: {error}")))
}
