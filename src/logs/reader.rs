use crate::error::{Kiro2ApiError, Result};
use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Read the last `lines` lines of a log file.
///
/// A missing file yields no entries rather than an error. Invalid UTF-8 is
/// replaced rather than rejected, since the log captures arbitrary output.
pub fn read_last_lines(file_path: &Path, lines: usize) -> Result<Vec<String>> {
    let file = match File::open(file_path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(Kiro2ApiError::LogFileError(format!(
                "Failed to open log file: {}",
                e
            )))
        }
    };

    if lines == 0 {
        return Ok(Vec::new());
    }

    let mut reader = BufReader::new(file);
    let mut tail = VecDeque::with_capacity(lines);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .map_err(|e| Kiro2ApiError::LogFileError(format!("Failed to read log line: {}", e)))?;
        if read == 0 {
            break;
        }

        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(['\n', '\r']);

        if tail.len() == lines {
            tail.pop_front();
        }
        tail.push_back(line.to_string());
    }

    Ok(tail.into())
}
