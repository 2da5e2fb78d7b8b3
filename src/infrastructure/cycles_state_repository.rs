use crate::domain::models::CyclesState;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::storage::KeyValueStore;
use std::path::Path;
use std::sync::Mutex;

pub trait CyclesStateRepository: Send + Sync {
    fn load(&self) -> Result<Option<CyclesState>, InfraError>;
    fn save(&self, state: &CyclesState) -> Result<(), InfraError>;
}

/// Stores the whole aggregate as one JSON document under a versioned key.
#[derive(Debug, Clone)]
pub struct SqliteCyclesStateRepository {
    store: KeyValueStore,
    key: String,
}

impl SqliteCyclesStateRepository {
    pub fn new(db_path: impl AsRef<Path>, key: impl Into<String>) -> Self {
        Self {
            store: KeyValueStore::new(db_path),
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl CyclesStateRepository for SqliteCyclesStateRepository {
    fn load(&self) -> Result<Option<CyclesState>, InfraError> {
        let Some(raw) = self.store.get(&self.key)? else {
            return Ok(None);
        };
        let state: CyclesState = serde_json::from_str(&raw)?;
        Ok(Some(state))
    }

    fn save(&self, state: &CyclesState) -> Result<(), InfraError> {
        let raw = serde_json::to_string(state)?;
        self.store.set(&self.key, &raw)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryCyclesStateRepository {
    state: Mutex<Option<CyclesState>>,
    saves: Mutex<usize>,
}

impl InMemoryCyclesStateRepository {
    pub fn with_state(state: CyclesState) -> Self {
        Self {
            state: Mutex::new(Some(state)),
            saves: Mutex::new(0),
        }
    }

    pub fn save_count(&self) -> usize {
        self.saves.lock().map(|saves| *saves).unwrap_or(0)
    }
}

impl CyclesStateRepository for InMemoryCyclesStateRepository {
    fn load(&self) -> Result<Option<CyclesState>, InfraError> {
        let state = self
            .state
            .lock()
            .map_err(|error| InfraError::InvalidState(format!("cycles state lock poisoned: {error}")))?;
        Ok(state.clone())
    }

    fn save(&self, state: &CyclesState) -> Result<(), InfraError> {
        let mut stored = self
            .state
            .lock()
            .map_err(|error| InfraError::InvalidState(format!("cycles state lock poisoned: {error}")))?;
        *stored = Some(state.clone());
        if let Ok(mut saves) = self.saves.lock() {
            *saves += 1;
        }
        Ok(())
    }
}
