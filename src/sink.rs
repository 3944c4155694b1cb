use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::info;

use crate::domain::Record;
use crate::error::HarvestError;

pub trait TabularSink {
    fn append(&mut self, rows: &[Record]) -> Result<Utf8PathBuf, HarvestError>;
}

#[derive(Debug, Clone)]
pub struct RollingCsvSink {
    base: Utf8PathBuf,
    columns: Vec<String>,
    max_bytes: u64,
}

struct Sheet {
    header: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl RollingCsvSink {
    pub fn new(base: Utf8PathBuf, columns: Vec<String>, max_bytes: u64) -> Self {
        Self {
            base,
            columns,
            max_bytes,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn candidate(&self, index: u32) -> Utf8PathBuf {
        let name = format!(
            "{}_{index}.csv",
            self.base.file_name().unwrap_or("final_result")
        );
        match self.base.parent() {
            Some(parent) => parent.join(name),
            None => Utf8PathBuf::from(name),
        }
    }

    // Existence and size are checked on every call, so a file that grew past
    // the threshold during this run is left alone from then on.
    pub fn target(&self) -> Result<Utf8PathBuf, HarvestError> {
        let mut index = 1;
        loop {
            let path = self.candidate(index);
            match fs::metadata(path.as_std_path()) {
                Ok(meta) if meta.len() > self.max_bytes => index += 1,
                Ok(_) => return Ok(path),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(path),
                Err(err) => return Err(HarvestError::Filesystem(err.to_string())),
            }
        }
    }

    fn create_with_header(&self, path: &Utf8Path) -> Result<(), HarvestError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent.as_std_path())
                .map_err(|err| HarvestError::Filesystem(err.to_string()))?;
        }
        let sheet = Sheet {
            header: self.columns.clone(),
            rows: Vec::new(),
        };
        write_sheet(path, &sheet)
    }
}

impl TabularSink for RollingCsvSink {
    fn append(&mut self, rows: &[Record]) -> Result<Utf8PathBuf, HarvestError> {
        let path = self.target()?;
        if !path.as_std_path().exists() {
            self.create_with_header(&path)?;
        }

        let mut sheet = read_sheet(&path)?;
        for column in &self.columns {
            if !sheet.header.contains(column) {
                sheet.header.push(column.clone());
            }
        }
        for row in rows {
            for column in row.columns() {
                if !sheet.header.iter().any(|existing| existing == column) {
                    sheet.header.push(column.to_string());
                }
            }
        }
        for row in rows {
            sheet.rows.push(
                sheet
                    .header
                    .iter()
                    .map(|column| row.get(column).map(str::to_string))
                    .collect(),
            );
        }

        write_sheet(&path, &sheet)?;
        info!(path = %path, rows = rows.len(), total = sheet.rows.len(), "data saved");
        Ok(path)
    }
}

fn read_sheet(path: &Utf8Path) -> Result<Sheet, HarvestError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path.as_std_path())
        .map_err(|err| HarvestError::Sheet(err.to_string()))?;
    let header = reader
        .headers()
        .map_err(|err| HarvestError::Sheet(err.to_string()))?
        .iter()
        .map(str::to_string)
        .collect::<Vec<_>>();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|err| HarvestError::Sheet(err.to_string()))?;
        rows.push(
            record
                .iter()
                .map(|cell| (!cell.is_empty()).then(|| cell.to_string()))
                .collect(),
        );
    }
    Ok(Sheet { header, rows })
}

fn write_sheet(path: &Utf8Path, sheet: &Sheet) -> Result<(), HarvestError> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let temp = tempfile::Builder::new()
        .prefix("geo-harvest-sheet")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| HarvestError::Filesystem(err.to_string()))?;
    {
        let mut writer = csv::Writer::from_writer(temp.as_file());
        writer
            .write_record(&sheet.header)
            .map_err(|err| HarvestError::Sheet(err.to_string()))?;
        for row in &sheet.rows {
            let cells = (0..sheet.header.len())
                .map(|index| row.get(index).cloned().flatten().unwrap_or_default());
            writer
                .write_record(cells)
                .map_err(|err| HarvestError::Sheet(err.to_string()))?;
        }
        writer
            .flush()
            .map_err(|err| HarvestError::Sheet(err.to_string()))?;
    }
    temp.persist(path.as_std_path())
        .map_err(|err| HarvestError::Filesystem(err.to_string()))?;
    Ok(())
}
