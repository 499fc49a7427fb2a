//! Read the last lines of a file without scanning it from the start.

use miette::Diagnostic;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use thiserror::Error;

const BLOCK_SIZE: u64 = 1024;

#[derive(Debug, Error, Diagnostic)]
pub enum TailError {
    #[error("number of lines must be greater than zero")]
    InvalidN,
    #[error("{0} is empty")]
    EmptyFile(PathBuf),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Open `path` and position the returned handle at the start of its last `n` lines.
///
/// A trailing line without a terminating newline is not counted, so it is
/// returned in addition to the last `n` complete lines. Files with fewer than
/// `n` lines are returned whole.
pub fn tail(path: impl AsRef<Path>, n: usize) -> Result<File, TailError> {
    let path = path.as_ref();
    let mut file = File::open(path)?;

    if file.metadata()?.len() == 0 {
        return Err(TailError::EmptyFile(path.to_path_buf()));
    }
    if n == 0 {
        return Err(TailError::InvalidN);
    }

    let start = find_tail_line_start(&mut file, n as u64)?;
    file.seek(SeekFrom::Start(start))?;
    Ok(file)
}

/// Byte offset of the first of the last `n` lines.
///
/// Walks backwards one block at a time counting newlines until more than `n`
/// have been seen or the start is reached, then trims forward inside the first
/// block read to the exact offset.
fn find_tail_line_start<R: Read + Seek>(reader: &mut R, n: u64) -> io::Result<u64> {
    let size = reader.seek(SeekFrom::End(0))?;

    let mut left = size;
    let mut count: u64 = 0;
    let mut buf: Vec<u8> = Vec::new();
    let mut right = size;

    while right > 0 && count <= n {
        left = right.saturating_sub(BLOCK_SIZE);
        buf.resize((right - left) as usize, 0);
        reader.seek(SeekFrom::Start(left))?;
        reader.read_exact(&mut buf)?;
        count += buf.iter().filter(|&&b| b == b'\n').count() as u64;
        right = left;
    }

    let mut offset = 0usize;
    while count > n {
        match buf[offset..].iter().position(|&b| b == b'\n') {
            Some(idx) => offset += idx + 1,
            None => break,
        }
        count -= 1;
    }

    Ok(left + offset as u64)
}
