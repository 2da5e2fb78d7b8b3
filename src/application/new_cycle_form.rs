use crate::infrastructure::config::AppConfig;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCycleForm {
    pub task: String,
    pub minutes_amount: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCycleInput {
    pub task: String,
    pub planned_minutes: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinutesRange {
    pub min: u32,
    pub max: u32,
    pub step: u32,
}

impl Default for MinutesRange {
    fn default() -> Self {
        Self {
            min: 5,
            max: 60,
            step: 5,
        }
    }
}

impl From<&AppConfig> for MinutesRange {
    fn from(config: &AppConfig) -> Self {
        Self {
            min: config.min_minutes,
            max: config.max_minutes,
            step: config.minutes_step,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Error)]
#[error("{}", render_field_errors(.errors))]
pub struct FormErrors {
    pub errors: Vec<FieldError>,
}

impl FormErrors {
    fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field,
            message: message.into(),
        });
    }

    pub fn field(&self, field: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|error| error.field == field)
            .map(|error| error.message.as_str())
    }
}

fn render_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|error| format!("{}: {}", error.field, error.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl NewCycleForm {
    pub fn new(task: impl Into<String>, minutes_amount: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            minutes_amount: minutes_amount.into(),
        }
    }

    /// Start stays disabled until a task has been typed.
    pub fn is_submittable(&self) -> bool {
        !self.task.trim().is_empty()
    }

    pub fn validate(&self, range: MinutesRange) -> Result<NewCycleInput, FormErrors> {
        let mut errors = FormErrors::default();

        let task = self.task.trim();
        if task.is_empty() {
            errors.push("task", "Choose task");
        }

        let planned_minutes = match self.minutes_amount.trim().parse::<u32>() {
            Ok(minutes) if minutes < range.min => {
                errors.push("minutesAmount", format!("must be at least {} minutes", range.min));
                None
            }
            Ok(minutes) if minutes > range.max => {
                errors.push("minutesAmount", format!("must be at most {} minutes", range.max));
                None
            }
            Ok(minutes) if (minutes - range.min) % range.step != 0 => {
                errors.push(
                    "minutesAmount",
                    format!("must be a multiple of {} minutes", range.step),
                );
                None
            }
            Ok(minutes) => Some(minutes),
            Err(_) => {
                errors.push("minutesAmount", "must be a whole number of minutes");
                None
            }
        };

        match planned_minutes {
            Some(planned_minutes) if errors.errors.is_empty() => Ok(NewCycleInput {
                task: task.to_string(),
                planned_minutes,
            }),
            _ => Err(errors),
        }
    }
}
