mod store;
mod writer;

pub use store::{write_table, CsvStore};
pub use writer::{CsvTerminator, CsvWriter, CsvWriterConfig, FileMode};
