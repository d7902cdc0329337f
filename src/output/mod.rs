// Report output - persists record batches as CSV or JSON lines
//
// Each batch is appended and synced to disk before the next one is measured,
// so a crash loses at most one record period. With file_period > 0 a new file
// is started every file_period batches, the counter inserted before the
// extension: levels.csv -> levels000.csv, levels001.csv, ...

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::analysis::Levels;
use crate::error::OutputError;

/// On-disk report layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Csv,
    Json,
}

impl ReportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Csv => "csv",
            ReportFormat::Json => "json",
        }
    }
}

/// Destination for completed record batches
pub trait RecordSink {
    /// Persist one batch (a full record period, or the partial batch at exit)
    fn write_batch(&mut self, records: &[Levels]) -> Result<(), OutputError>;
}

/// Report path used when none is configured
///
/// `explicit` wins; otherwise the format extension is appended to the input
/// file path; live capture without a path writes `sound_meter.<ext>`.
pub fn default_output_path(
    explicit: Option<&Path>,
    input: Option<&Path>,
    format: ReportFormat,
) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    match input {
        Some(input) => {
            let mut name = input.as_os_str().to_os_string();
            name.push(".");
            name.push(format.extension());
            PathBuf::from(name)
        }
        None => PathBuf::from(format!("sound_meter.{}", format.extension())),
    }
}

/// Insert a three-digit counter before the extension
pub fn rotated_path(base: &Path, index: usize) -> PathBuf {
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match base.extension() {
        Some(ext) => format!("{}{:03}.{}", stem, index, ext.to_string_lossy()),
        None => format!("{}{:03}", stem, index),
    };
    base.with_file_name(name)
}

#[derive(Serialize)]
struct JsonRecord<'a> {
    identification: &'a str,
    #[serde(flatten)]
    levels: &'a Levels,
}

const CSV_HEADER: &str = "segment, ts, LAFmax, LAFmin, LApeak, LAE, LAeq";

/// Report file writer with optional rotation
pub struct ReportWriter {
    base_path: PathBuf,
    format: ReportFormat,
    identification: String,
    file_period: usize,
    batches_in_file: usize,
    file_index: usize,
    current: Option<(PathBuf, BufWriter<File>)>,
}

impl ReportWriter {
    /// # Arguments
    /// * `base_path` - Report path; rotated files derive their names from it
    /// * `format` - CSV or JSON lines
    /// * `identification` - Station name written into JSON records
    /// * `file_period` - Batches per file, 0 keeps a single file
    pub fn new(
        base_path: impl Into<PathBuf>,
        format: ReportFormat,
        identification: impl Into<String>,
        file_period: usize,
    ) -> Self {
        Self {
            base_path: base_path.into(),
            format,
            identification: identification.into(),
            file_period,
            batches_in_file: 0,
            file_index: 0,
            current: None,
        }
    }

    /// Path of the file the next batch goes to
    pub fn current_path(&self) -> PathBuf {
        if self.file_period == 0 {
            self.base_path.clone()
        } else {
            rotated_path(&self.base_path, self.file_index)
        }
    }

    fn open_next(&mut self) -> Result<(), OutputError> {
        let path = self.current_path();
        let file = File::create(&path).map_err(|err| OutputError::CreateFailed {
            path: path.display().to_string(),
            reason: err.to_string(),
        })?;
        let mut writer = BufWriter::new(file);
        if self.format == ReportFormat::Csv {
            writeln!(writer, "{}", CSV_HEADER).map_err(|err| write_failed(&path, err))?;
        }
        tracing::info!("[Report] Writing {:?}", path);
        self.current = Some((path, writer));
        Ok(())
    }

    fn format_record(&self, levels: &Levels) -> Result<String, String> {
        match self.format {
            ReportFormat::Csv => Ok(format!(
                "{}, {}, {:5.1}, {:5.1}, {:5.1}, {:5.1}, {:5.1}",
                levels.segment,
                levels.timestamp,
                levels.lafmax,
                levels.lafmin,
                levels.lapeak,
                levels.lae,
                levels.laeq
            )),
            ReportFormat::Json => serde_json::to_string(&JsonRecord {
                identification: &self.identification,
                levels,
            })
            .map_err(|err| err.to_string()),
        }
    }
}

fn write_failed(path: &Path, err: impl ToString) -> OutputError {
    OutputError::WriteFailed {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}

impl RecordSink for ReportWriter {
    fn write_batch(&mut self, records: &[Levels]) -> Result<(), OutputError> {
        if records.is_empty() {
            return Ok(());
        }
        if self.current.is_none() {
            self.open_next()?;
        }

        let lines = records
            .iter()
            .map(|levels| self.format_record(levels))
            .collect::<Result<Vec<_>, _>>();

        if let Some((path, writer)) = self.current.as_mut() {
            let path = path.as_path();
            let lines = lines.map_err(|err| write_failed(path, err))?;
            for line in &lines {
                writeln!(writer, "{}", line).map_err(|err| write_failed(path, err))?;
            }
            writer.flush().map_err(|err| write_failed(path, err))?;
            writer
                .get_ref()
                .sync_data()
                .map_err(|err| write_failed(path, err))?;
        }

        self.batches_in_file += 1;
        if self.file_period > 0 && self.batches_in_file >= self.file_period {
            self.current = None;
            self.batches_in_file = 0;
            self.file_index += 1;
        }
        Ok(())
    }
}
