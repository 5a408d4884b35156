use std::sync::Mutex;

use crate::error::PersistenceError;
use crate::record::Record;
use crate::task::Task;

/// Durable storage of extracted records.
///
/// Called once per fetched URL that produced records, so many times per run.
pub trait Store: Send + Sync {
    fn store(&self, task: &Task, records: &[Record]) -> Result<(), PersistenceError>;

    fn finalizer(&self) {}
}

/// Records of previous runs, used to seed generators that read another task's results.
pub trait RecordSource: Send + Sync {
    fn records(&self, task: &str) -> Vec<Record>;
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoStore;

impl Store for NoStore {
    fn store(&self, _task: &Task, _records: &[Record]) -> Result<(), PersistenceError> {
        Ok(())
    }
}

impl RecordSource for NoStore {
    fn records(&self, _task: &str) -> Vec<Record> {
        vec![]
    }
}

/// Keeps every stored record in memory, it is also a [`RecordSource`] for later runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Vec<Record>>,
    batches: Mutex<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<Record> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    /// How many times [`Store::store`] was called.
    pub fn batches(&self) -> usize {
        self.batches.lock().map(|b| *b).unwrap_or_default()
    }
}

impl Store for MemoryStore {
    fn store(&self, task: &Task, records: &[Record]) -> Result<(), PersistenceError> {
        let err = |message: String| PersistenceError {
            task: task.name.clone(),
            count: records.len(),
            message,
        };

        self.records
            .lock()
            .map_err(|e| err(e.to_string()))?
            .extend_from_slice(records);
        *self.batches.lock().map_err(|e| err(e.to_string()))? += 1;

        Ok(())
    }
}

impl RecordSource for MemoryStore {
    fn records(&self, task: &str) -> Vec<Record> {
        self.all().into_iter().filter(|r| r.task == task).collect()
    }
}
