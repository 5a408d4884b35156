use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;

use idps_crawler::{PersistenceError, Record, Store, Task};

use crate::writer::{CsvWriter, CsvWriterConfig, FileMode};

struct State {
    wtr: CsvWriter,
    headers_written: HashSet<String>,
}

/// Appends records as CSV rows, one column per selector of the task.
pub struct CsvStore {
    state: Mutex<State>,
    has_headers: bool,
}

impl CsvStore {
    pub fn new(config: &CsvWriterConfig, wtr: CsvWriter) -> Self {
        Self {
            state: Mutex::new(State {
                wtr,
                headers_written: HashSet::new(),
            }),
            has_headers: config.has_headers,
        }
    }

    /// Opens `path` according to `mode`. Appending to a non empty file writes no header.
    pub fn create<P>(config: &CsvWriterConfig, path: P, mode: FileMode) -> std::io::Result<Self>
    where
        P: AsRef<Path>,
    {
        let opts: std::fs::OpenOptions = mode.into();
        let file = opts.open(path)?;
        let resumed = mode == FileMode::Append && file.metadata()?.len() > 0;
        let mut store = Self::new(config, CsvWriter::file(config, file));
        store.has_headers &= !resumed;
        Ok(store)
    }

    pub fn stdout(config: &CsvWriterConfig) -> Self {
        Self::new(config, CsvWriter::stdout(config))
    }

    /// Consumes the store and returns what a buffer backed store has written.
    pub fn into_contents(self) -> Option<String> {
        let state = self.state.into_inner().ok()?;
        state
            .wtr
            .contents()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }
}

impl Store for CsvStore {
    fn store(&self, task: &Task, records: &[Record]) -> Result<(), PersistenceError> {
        let err = |message: String| PersistenceError {
            task: task.name.clone(),
            count: records.len(),
            message,
        };

        let mut state = self.state.lock().map_err(|e| err(e.to_string()))?;
        let State {
            wtr,
            headers_written,
        } = &mut *state;

        let (header, rows) = task.as_table(records);
        if self.has_headers && headers_written.insert(task.name.clone()) {
            wtr.write_record(header).map_err(|e| err(e.to_string()))?;
        }
        for row in rows {
            let row = row
                .into_iter()
                .map(|v| v.map(ToString::to_string).unwrap_or_default());
            wtr.write_record(row).map_err(|e| err(e.to_string()))?;
        }
        wtr.flush().map_err(|e| err(e.to_string()))?;

        log::debug!("Stored {} records of {}", records.len(), task.name);
        Ok(())
    }

    fn finalizer(&self) {
        if let Ok(mut state) = self.state.lock() {
            if let Err(e) = state.wtr.flush() {
                log::error!("Couldn't flush CSV writer: {e}");
            }
        }
    }
}

/// Writes a whole table at once: a header of selector names, then one row per record.
pub fn write_table(
    config: &CsvWriterConfig,
    wtr: CsvWriter,
    task: &Task,
    records: &[Record],
) -> Result<CsvWriter, PersistenceError> {
    let store = CsvStore::new(config, wtr);
    store.store(task, records)?;
    store
        .state
        .into_inner()
        .map(|state| state.wtr)
        .map_err(|e| PersistenceError {
            task: task.name.clone(),
            count: records.len(),
            message: e.to_string(),
        })
}
