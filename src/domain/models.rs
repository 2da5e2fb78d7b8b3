use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CycleStatus {
    InProgress,
    Interrupted,
    Completed,
}

impl CycleStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::InProgress => "In Progress",
            Self::Interrupted => "Interrupted",
            Self::Completed => "Completed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Cycle {
    pub id: String,
    pub task: String,
    pub planned_minutes: u32,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stopped_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Cycle {
    pub fn new(
        id: impl Into<String>,
        task: impl Into<String>,
        planned_minutes: u32,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            task: task.into(),
            planned_minutes,
            started_at,
            stopped_at: None,
            finished_at: None,
        }
    }

    pub fn status(&self) -> CycleStatus {
        if self.finished_at.is_some() {
            CycleStatus::Completed
        } else if self.stopped_at.is_some() {
            CycleStatus::Interrupted
        } else {
            CycleStatus::InProgress
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.stopped_at.is_some() || self.finished_at.is_some()
    }

    pub fn planned_seconds(&self) -> i64 {
        i64::from(self.planned_minutes) * 60
    }

    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "cycle.id")?;
        validate_non_empty(&self.task, "cycle.task")?;
        if self.planned_minutes == 0 {
            return Err("cycle.planned_minutes must be > 0".to_string());
        }
        if self.stopped_at.is_some() && self.finished_at.is_some() {
            return Err("cycle cannot be both stopped and finished".to_string());
        }
        if let Some(ended_at) = self.stopped_at.or(self.finished_at) {
            if ended_at < self.started_at {
                return Err("cycle end time must be >= cycle.started_at".to_string());
            }
        }
        Ok(())
    }
}

/// The closed set of moves the cycle state machine accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleTransition {
    CreateCycle {
        id: String,
        task: String,
        planned_minutes: u32,
    },
    InterruptActiveCycle,
    FinishActiveCycle,
}

impl CycleTransition {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateCycle { .. } => "create_cycle",
            Self::InterruptActiveCycle => "interrupt_active_cycle",
            Self::FinishActiveCycle => "finish_active_cycle",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CyclesState {
    pub cycles: Vec<Cycle>,
    #[serde(default)]
    pub active_cycle_id: Option<String>,
}

impl CyclesState {
    pub fn active_cycle(&self) -> Option<&Cycle> {
        self.active_index().map(|index| &self.cycles[index])
    }

    /// Index of the cycle `active_cycle_id` points at, provided it is still running.
    fn active_index(&self) -> Option<usize> {
        let active_id = self.active_cycle_id.as_deref()?;
        self.cycles
            .iter()
            .position(|cycle| cycle.id == active_id)
            .filter(|index| !self.cycles[*index].is_terminal())
    }

    pub fn apply(&self, transition: &CycleTransition, now: DateTime<Utc>) -> CyclesState {
        let mut next = self.clone();
        match transition {
            CycleTransition::CreateCycle {
                id,
                task,
                planned_minutes,
            } => {
                if next.cycles.iter().any(|cycle| &cycle.id == id) {
                    return next;
                }
                next.cycles
                    .push(Cycle::new(id.clone(), task.clone(), *planned_minutes, now));
                next.active_cycle_id = Some(id.clone());
            }
            CycleTransition::InterruptActiveCycle => {
                if let Some(index) = next.active_index() {
                    let ended_at = clamped_end(&next.cycles[index], now);
                    next.cycles[index].stopped_at = Some(ended_at);
                    next.active_cycle_id = None;
                }
            }
            CycleTransition::FinishActiveCycle => {
                if let Some(index) = next.active_index() {
                    let ended_at = clamped_end(&next.cycles[index], now);
                    next.cycles[index].finished_at = Some(ended_at);
                    next.active_cycle_id = None;
                }
            }
        }
        next
    }

    pub fn validate(&self) -> Result<(), String> {
        let mut seen = HashSet::new();
        for cycle in &self.cycles {
            cycle.validate()?;
            if !seen.insert(cycle.id.as_str()) {
                return Err(format!("duplicate cycle id: {}", cycle.id));
            }
        }

        if let Some(active_id) = self.active_cycle_id.as_deref() {
            let Some(active) = self.cycles.iter().find(|cycle| cycle.id == active_id) else {
                return Err(format!("active cycle not found: {active_id}"));
            };
            if active.is_terminal() {
                return Err(format!("active cycle is already terminal: {active_id}"));
            }
        }
        Ok(())
    }
}

// A wall clock stepped backwards must not end a cycle before it started.
fn clamped_end(cycle: &Cycle, now: DateTime<Utc>) -> DateTime<Utc> {
    now.max(cycle.started_at)
}

fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}
