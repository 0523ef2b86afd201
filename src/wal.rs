//! File-backed operation log.
//!
//! Frame layout: `[len: u32 LE][crc32: u32 LE][payload: len bytes]`, payload is the
//! bincode (serde, standard config) encoding of an [`Operation`]. Every append is
//! fsynced. An incomplete frame at the tail is a torn write from a crash: it is
//! dropped and truncated on open. A complete frame with a bad checksum is corruption.
//!
//! A failed append is rolled back to the last acknowledged frame before the error is
//! returned, so later appends never land behind a partial frame. If the rollback itself
//! fails the log refuses further appends.

use crate::errors::DbError;
use crate::storage::StorageEngine;
use crate::types::Operation;
use bincode::config::standard;
use bincode::serde::{decode_from_slice, encode_to_vec};
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

const HEADER_LEN: usize = 8;

pub struct Wal {
    file: File,
    path: PathBuf,
    // end of the last acknowledged frame
    end: u64,
    failed: bool,
}

impl Wal {
    /// Opens or creates the log at `path`, truncating any torn tail.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or a complete frame is corrupted.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DbError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().read(true).append(true).create(true).open(&path)?;
        let buf = read_file(&path)?;
        let scan = scan_frames(&buf)?;
        if scan.valid_len < buf.len() {
            log::warn!(
                "wal {}: dropping torn tail ({} of {} bytes valid)",
                path.display(),
                scan.valid_len,
                buf.len()
            );
            file.set_len(scan.valid_len as u64)?;
            file.sync_data()?;
        }
        Ok(Self { file, path, end: scan.valid_len as u64, failed: false })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn rollback(&mut self) -> std::io::Result<()> {
        self.file.set_len(self.end)?;
        self.file.sync_data()
    }
}

impl StorageEngine for Wal {
    fn append(&mut self, operation: &Operation) -> Result<(), DbError> {
        if self.failed {
            return Err(DbError::Corrupted(format!("wal {} is read-only after a failed rollback", self.path.display())));
        }
        let payload = encode_to_vec(operation, standard())?;
        let len = u32::try_from(payload.len())
            .map_err(|_| DbError::InvalidDocument("operation exceeds 4 GiB frame limit".into()))?;
        let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
        frame.extend_from_slice(&len.to_le_bytes());
        frame.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
        frame.extend_from_slice(&payload);

        let on_disk = self.file.metadata()?.len();
        if on_disk < self.end {
            return Err(DbError::Corrupted(format!(
                "wal {} shrank to {on_disk} bytes below acknowledged {}",
                self.path.display(),
                self.end
            )));
        }
        if on_disk > self.end {
            log::warn!("wal {}: discarding {} unacknowledged bytes", self.path.display(), on_disk - self.end);
            self.rollback()?;
        }

        if let Err(e) = self.file.write_all(&frame).and_then(|()| self.file.sync_data()) {
            if let Err(rb) = self.rollback() {
                log::error!("wal {}: rollback after failed append also failed: {rb}", self.path.display());
                self.failed = true;
            }
            return Err(e.into());
        }
        self.end += frame.len() as u64;
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<Operation>, DbError> {
        let buf = read_file(&self.path)?;
        Ok(scan_frames(&buf)?.operations)
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>, DbError> {
    let mut buf = Vec::new();
    File::open(path)?.read_to_end(&mut buf)?;
    Ok(buf)
}

struct Scan {
    operations: Vec<Operation>,
    valid_len: usize,
}

fn scan_frames(buf: &[u8]) -> Result<Scan, DbError> {
    let mut operations = Vec::new();
    let mut offset = 0usize;
    while offset + HEADER_LEN <= buf.len() {
        let (len_bytes, rest) = buf[offset..].split_at(4);
        let len = u32::from_le_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]]) as usize;
        let crc = u32::from_le_bytes([rest[0], rest[1], rest[2], rest[3]]);
        let start = offset + HEADER_LEN;
        let Some(end) = start.checked_add(len).filter(|end| *end <= buf.len()) else { break };
        let payload = &buf[start..end];
        if crc32fast::hash(payload) != crc {
            return Err(DbError::Corrupted(format!("checksum mismatch in frame at offset {offset}")));
        }
        let (op, _) = decode_from_slice::<Operation, _>(payload, standard())?;
        operations.push(op);
        offset = end;
    }
    Ok(Scan { operations, valid_len: offset })
}
