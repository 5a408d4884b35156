use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::document::Document;
use crate::error::ExtractionError;
use crate::selector::TypedSelector;
use crate::task::Task;
use crate::value::Value;

/// One extraction result: the typed value of every selector of a task, in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub task: String,
    pub url: String,
    pub fields: Fields,
}

impl Record {
    pub fn new(task: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            url: url.into(),
            fields: Fields::default(),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: Option<Value>) -> Self {
        self.fields.set(name, value);
        self
    }

    /// The value of a field, `None` when absent or unknown.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.iter().all(|(_, v)| v.is_none())
    }

    /// Logical identity of the record, made of the task's key fields.
    pub fn identity(&self, task: &Task) -> RecordKey {
        RecordKey(
            task.key_selectors()
                .map(|sel| self.get(&sel.name).map(ToString::to_string))
                .collect(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey(pub Vec<Option<String>>);

/// Ordered mapping from field name to optional value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields(Vec<(String, Option<Value>)>);

impl Fields {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, v)| v.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|(n, _)| n == name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: Option<Value>) {
        let name = name.into();
        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some((_, v)) => *v = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&Value>)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for Fields {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in &self.0 {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[derive(Debug, Default)]
pub struct Extraction {
    pub records: Vec<Record>,
    pub errors: Vec<ExtractionError>,
}

/// Applies every selector to a document and lines up their matches into records.
///
/// The document yields as many records as the selector with the most matches. A selector with a
/// single match fills that field in every record, any other selector fills record `i` with its
/// `i`-th match. A failed query or conversion leaves the field absent.
pub fn extract_records(
    task: &str,
    url: &str,
    selectors: &[TypedSelector],
    doc: &Document,
) -> Extraction {
    let mut errors = vec![];
    let columns = selectors
        .iter()
        .map(|sel| match sel.try_extract_all(doc) {
            Ok(values) => values
                .into_iter()
                .map(|v| v.map_err(|e| errors.push(e)).ok())
                .collect::<Vec<_>>(),
            Err(e) => {
                errors.push(e);
                vec![]
            }
        })
        .collect::<Vec<_>>();

    let rows = columns.iter().map(Vec::len).max().unwrap_or(0);
    let records = (0..rows)
        .map(|i| {
            selectors
                .iter()
                .zip(&columns)
                .fold(Record::new(task, url), |record, (sel, column)| {
                    let value = match column.len() {
                        1 => column[0].clone(),
                        _ => column.get(i).cloned().flatten(),
                    };
                    record.with(sel.name(), value)
                })
        })
        .collect();

    for e in &errors {
        log::debug!("{url}: {e}");
    }

    Extraction { records, errors }
}
