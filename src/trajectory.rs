use crate::error::{Result, TunerError};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Append-only CSV of estimate vectors, one header-less row per generation.
///
/// Each row goes out in a single unbuffered write, so an interrupted
/// campaign leaves only complete rows behind.
pub struct TrajectoryLog {
    path: PathBuf,
    file: File,
    rows_written: usize,
}

impl TrajectoryLog {
    /// Open (creating if needed) in append mode. Existing rows are never touched.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| TunerError::io(dir, e))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| TunerError::io(&path, e))?;
        Ok(Self { path, file, rows_written: 0 })
    }

    pub fn path(&self) -> &Path { &self.path }

    /// Rows appended through this handle (not counting pre-existing ones).
    pub fn rows_written(&self) -> usize { self.rows_written }

    pub fn append(&mut self, row: &[f64]) -> Result<()> {
        let mut line = format_row(row);
        line.push('\n');
        self.file.write_all(line.as_bytes()).map_err(|e| TunerError::io(&self.path, e))?;
        self.file.flush().map_err(|e| TunerError::io(&self.path, e))?;
        self.rows_written += 1;
        Ok(())
    }

    /// Parse every row of an existing log. A missing file reads as empty.
    pub fn read_rows<P: AsRef<Path>>(path: P) -> Result<Vec<Vec<f64>>> {
        let path = path.as_ref();
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(TunerError::io(path, e)),
        };
        let mut rows = Vec::new();
        for (idx, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| TunerError::io(path, e))?;
            let line = line.trim();
            if line.is_empty() { continue; }
            let row = line
                .split(',')
                .map(|cell| cell.trim().parse::<f64>())
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| TunerError::Config(format!("{} line {}: {}", path.display(), idx + 1, e)))?;
            rows.push(row);
        }
        Ok(rows)
    }
}

fn format_row(row: &[f64]) -> String {
    row.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(",")
}
