use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;

use super::{RunEvent, RunEventKind};
use crate::errors::CoreEngineError;

/// Almacenamiento de eventos append-only.
pub trait EventStore: Send {
    /// Agrega un evento a partir de su kind y devuelve el evento completo (con seq y ts).
    fn append_kind(&mut self, run_id: &str, kind: RunEventKind) -> Result<RunEvent, CoreEngineError>;
    /// Lista eventos de una ejecución (orden ascendente por seq).
    fn list(&self, run_id: &str) -> Vec<RunEvent>;
}

#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    inner: HashMap<String, Vec<RunEvent>>,
}

impl EventStore for InMemoryEventStore {
    fn append_kind(&mut self, run_id: &str, kind: RunEventKind) -> Result<RunEvent, CoreEngineError> {
        let events = self.inner.entry(run_id.to_string()).or_default();
        let ev = RunEvent { seq: events.len() as u64,
                            run_id: run_id.to_string(),
                            ts: Utc::now(),
                            kind };
        events.push(ev.clone());
        Ok(ev)
    }

    fn list(&self, run_id: &str) -> Vec<RunEvent> {
        self.inner.get(run_id).cloned().unwrap_or_default()
    }
}

/// Store en memoria que además añade cada evento como una línea JSON a
/// `<dir>/events.jsonl` (un fichero por directorio de ejecución).
#[derive(Debug)]
pub struct JsonlEventStore {
    path: PathBuf,
    memory: InMemoryEventStore,
}

impl JsonlEventStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(),
               memory: InMemoryEventStore::default() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventStore for JsonlEventStore {
    fn append_kind(&mut self, run_id: &str, kind: RunEventKind) -> Result<RunEvent, CoreEngineError> {
        let ev = self.memory.append_kind(run_id, kind)?;
        let mut line = serde_json::to_string(&ev)?;
        line.push('\n');
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(ev)
    }

    fn list(&self, run_id: &str) -> Vec<RunEvent> {
        self.memory.list(run_id)
    }
}
