use std::{fs, io};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvWriterConfig {
    #[serde(default = "default_csv_delimiter")]
    pub delimiter: char,
    #[serde(default)]
    pub escape: Option<char>,
    #[serde(default)]
    pub flexible: bool,
    #[serde(default = "default_csv_terminator")]
    pub terminator: CsvTerminator,
    #[serde(default = "default_has_headers")]
    pub has_headers: bool,
}

impl Default for CsvWriterConfig {
    fn default() -> Self {
        Self {
            delimiter: ',',
            escape: None,
            flexible: false,
            terminator: CsvTerminator::Any('\n'),
            has_headers: true,
        }
    }
}

fn default_csv_delimiter() -> char {
    CsvWriterConfig::default().delimiter
}

fn default_csv_terminator() -> CsvTerminator {
    CsvWriterConfig::default().terminator
}

fn default_has_headers() -> bool {
    CsvWriterConfig::default().has_headers
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum CsvTerminator {
    CRLF,
    Any(char),
}

impl From<CsvTerminator> for csv::Terminator {
    fn from(source: CsvTerminator) -> Self {
        match source {
            CsvTerminator::CRLF => Self::CRLF,
            CsvTerminator::Any(c) => Self::Any(c as u8),
        }
    }
}

impl From<&CsvWriterConfig> for csv::WriterBuilder {
    fn from(c: &CsvWriterConfig) -> Self {
        let mut builder = csv::WriterBuilder::new();
        builder.delimiter(c.delimiter as u8);
        builder.terminator(c.terminator.into());
        builder.flexible(c.flexible);
        // Header rows are written by the store, from the task's selectors
        builder.has_headers(false);
        if let Some(escape) = c.escape {
            builder.double_quote(false);
            builder.escape(escape as u8);
        } else {
            builder.double_quote(true);
        }
        builder
    }
}

/// How an existing output file is opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FileMode {
    /// Fails when the file already exists.
    #[default]
    Create,
    Append,
    Truncate,
}

impl From<FileMode> for fs::OpenOptions {
    fn from(mode: FileMode) -> Self {
        let mut opts = fs::OpenOptions::new();
        match mode {
            FileMode::Create => opts.write(true).create_new(true),
            FileMode::Append => opts.append(true).create(true),
            FileMode::Truncate => opts.write(true).create(true).truncate(true),
        };
        opts
    }
}

pub enum CsvWriter {
    File(csv::Writer<fs::File>),
    Stdout(csv::Writer<io::Stdout>),
    Buffer(csv::Writer<Vec<u8>>),
}

impl CsvWriter {
    pub fn file(config: &CsvWriterConfig, file: fs::File) -> Self {
        Self::File(csv::WriterBuilder::from(config).from_writer(file))
    }

    pub fn stdout(config: &CsvWriterConfig) -> Self {
        Self::Stdout(csv::WriterBuilder::from(config).from_writer(io::stdout()))
    }

    pub fn buffer(config: &CsvWriterConfig) -> Self {
        Self::Buffer(csv::WriterBuilder::from(config).from_writer(vec![]))
    }

    pub fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::File(wtr) => wtr.flush(),
            Self::Stdout(wtr) => wtr.flush(),
            Self::Buffer(wtr) => wtr.flush(),
        }
    }

    pub fn write_record<I, T>(&mut self, record: I) -> csv::Result<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        match self {
            Self::File(wtr) => wtr.write_record(record),
            Self::Stdout(wtr) => wtr.write_record(record),
            Self::Buffer(wtr) => wtr.write_record(record),
        }
    }

    /// The written bytes of a [`CsvWriter::Buffer`].
    pub fn contents(&self) -> Option<&[u8]> {
        match self {
            Self::Buffer(wtr) => Some(wtr.get_ref()),
            _ => None,
        }
    }
}
