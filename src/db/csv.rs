use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use tokio::{fs, io::AsyncWriteExt};
use tracing::debug;

use super::{
    models::{FieldValue, Row},
    Sink,
};

/// Appends rows to `<dir>/<category>-<MM-DD-YY>.csv`, one file per local day.
#[derive(Debug, Clone)]
pub struct CsvSink {
    dir: PathBuf,
}

impl CsvSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, category: &str, date: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("{category}-{}.csv", date.format("%m-%d-%y")))
    }

    /// Append `row` to the file for `date`, writing the header first when the
    /// file is new or empty.
    pub async fn save_on(&self, category: &str, row: &Row, date: NaiveDate) -> Result<()> {
        if category.is_empty() || category.contains(['/', '\\']) || category.starts_with('.') {
            bail!("invalid CSV category: {category:?}");
        }

        fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("failed to create {}", self.dir.display()))?;

        let path = self.path_for(category, date);
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .with_context(|| format!("failed to open {}", path.display()))?;

        let empty = file.metadata().await?.len() == 0;
        let mut out = String::new();
        if empty {
            out.push_str(&header_line(row));
        }
        out.push_str(&data_line(row));

        file.write_all(out.as_bytes())
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        file.flush().await?;

        debug!(path = %path.display(), header = empty, "Row appended");
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Sink for CsvSink {
    async fn save(&mut self, category: &str, row: &Row) -> Result<()> {
        let today = chrono::Local::now().date_naive();
        self.save_on(category, row, today).await
    }
}

fn header_line(row: &Row) -> String {
    join(row.names().map(escape))
}

fn data_line(row: &Row) -> String {
    join(row.values().map(|v| match v {
        FieldValue::Null => String::new(),
        other => escape(&other.to_string()),
    }))
}

fn join(cells: impl Iterator<Item = String>) -> String {
    let mut line = cells.collect::<Vec<_>>().join(",");
    line.push('\n');
    line
}

fn escape(cell: &str) -> String {
    if cell.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_owned()
    }
}
