//! Multi-file splitter
//!
//! Physical layout: `<base>.<N>` data files plus an optional `<base>.stats`
//! sidecar holding `(read_id, read_offset, write_id, write_offset)` as four
//! little-endian u64 values. The sidecar is written atomically (temp file +
//! rename) on rotation and on [`Splitter::save_cursors`].
//!
//! Concurrency: the two cursors are guarded independently, so one reader and
//! one writer can run from different threads without contending. A single
//! `write` call always lands wholly inside one file, which is what keeps the
//! stored frames parseable file by file.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::error::SpoolError;
use crate::{Result, DEFAULT_MAX_FILE_SIZE};

/// Tuning knobs for a splitter
#[derive(Debug, Clone)]
pub struct SplitterOptions {
    /// Rotate to a new file once the current one reaches this size
    pub max_file_size: u64,
    /// Unlink a data file once the reader has fully drained it
    pub auto_delete: bool,
}

impl Default for SplitterOptions {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            auto_delete: true,
        }
    }
}

struct WriteCursor {
    file: File,
    id: u64,
    offset: u64,
}

struct ReadCursor {
    file: Option<File>,
    id: u64,
    offset: u64,
}

/// Ordered byte sequence split across size-capped files
pub struct Splitter {
    base: PathBuf,
    opts: SplitterOptions,
    write: Mutex<WriteCursor>,
    read: Mutex<ReadCursor>,
    /// Highest file id the writer has opened, visible to the reader
    write_id: AtomicU64,
}

impl Splitter {
    /// Open or recover the queue rooted at `base`
    ///
    /// `base` is the path prefix; data lands in `base.0`, `base.1`, ...
    pub fn open(base: impl Into<PathBuf>, opts: SplitterOptions) -> Result<Self> {
        let base = base.into();
        if let Some(parent) = base.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| SpoolError::Open {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let (mut rid, mut roffset, mut wid, mut woffset) = match read_sidecar(&base) {
            Some(cursors) => cursors,
            None => (0, 0, 0, 0),
        };

        // The directory is the source of truth: a sidecar can be stale after
        // a crash, existing files cannot.
        if let Some((first, last)) = scan_ids(&base)? {
            if rid < first || rid > last {
                rid = first;
                roffset = 0;
            }
            wid = wid.max(last);
            // Never trust an offset other than what is actually on disk:
            // the write side always appends at the tail.
            woffset = file_len(&data_path(&base, wid));
            if rid == wid && roffset > woffset {
                roffset = woffset;
            }
        } else {
            (rid, roffset, wid, woffset) = (0, 0, 0, 0);
        }

        let wpath = data_path(&base, wid);
        let wfile = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&wpath)
            .map_err(|e| SpoolError::Open {
                path: wpath,
                source: e,
            })?;

        tracing::debug!(
            base = %base.display(),
            read_id = rid,
            read_offset = roffset,
            write_id = wid,
            write_offset = woffset,
            "spool opened"
        );

        let splitter = Self {
            base,
            opts,
            write_id: AtomicU64::new(wid),
            write: Mutex::new(WriteCursor {
                file: wfile,
                id: wid,
                offset: woffset,
            }),
            read: Mutex::new(ReadCursor {
                file: None,
                id: rid,
                offset: roffset,
            }),
        };
        Ok(splitter)
    }

    /// Append a record; never splits it across files
    pub fn write(&self, buf: &[u8]) -> Result<()> {
        let mut w = self.write.lock();

        if w.offset > 0 && w.offset + buf.len() as u64 > self.opts.max_file_size {
            let next = w.id + 1;
            let path = data_path(&self.base, next);
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|e| SpoolError::Open {
                    path,
                    source: e,
                })?;
            w.file = file;
            w.id = next;
            w.offset = 0;
            self.write_id.store(next, Ordering::Release);
            tracing::debug!(base = %self.base.display(), file_id = next, "spool rotated");
            self.persist_cursors_locked(&w, &self.read.lock());
        }

        w.file.write_all(buf).map_err(|e| SpoolError::Write {
            path: data_path(&self.base, w.id),
            source: e,
        })?;
        w.offset += buf.len() as u64;
        Ok(())
    }

    /// Consume up to `buf.len()` bytes; `Ok(0)` means caught up
    pub fn read(&self, buf: &mut [u8]) -> Result<usize> {
        let mut r = self.read.lock();
        loop {
            let path = data_path(&self.base, r.id);
            if r.file.is_none() {
                let mut file = match File::open(&path) {
                    Ok(f) => f,
                    // The current read file not existing means nothing was
                    // ever spilled at this id: caught up.
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
                    Err(e) => return Err(SpoolError::Open { path, source: e }),
                };
                let offset = r.offset;
                file.seek(SeekFrom::Start(offset))
                    .map_err(|e| SpoolError::Read {
                        path: path.clone(),
                        source: e,
                    })?;
                r.file = Some(file);
            }

            let n = r
                .file
                .as_mut()
                .unwrap()
                .read(buf)
                .map_err(|e| SpoolError::Read {
                    path: path.clone(),
                    source: e,
                })?;
            if n > 0 {
                r.offset += n as u64;
                return Ok(n);
            }

            // EOF on the current file: advance only if the writer has moved
            // on, otherwise the reader has caught up with the tail.
            if r.id >= self.write_id.load(Ordering::Acquire) {
                return Ok(0);
            }
            r.file = None;
            if self.opts.auto_delete {
                if let Err(e) = fs::remove_file(&path) {
                    tracing::warn!(path = %path.display(), error = %e, "failed to unlink drained spool file");
                }
            }
            r.id += 1;
            r.offset = 0;
        }
    }

    /// Reposition the read cursor (tests and replay only)
    pub fn seek_read(&self, file_id: u64, offset: u64) -> Result<()> {
        let last = self.write_id.load(Ordering::Acquire);
        let first = scan_ids(&self.base)?.map(|(f, _)| f).unwrap_or(0);
        if file_id < first || file_id > last {
            return Err(SpoolError::SeekOutOfRange {
                id: file_id,
                first,
                last,
            });
        }
        let mut r = self.read.lock();
        r.file = None;
        r.id = file_id;
        r.offset = offset;
        Ok(())
    }

    /// Current `((read_id, read_offset), (write_id, write_offset))`
    ///
    /// Lock order is write-then-read everywhere the two are held together.
    pub fn cursors(&self) -> ((u64, u64), (u64, u64)) {
        let w = self.write.lock();
        let r = self.read.lock();
        ((r.id, r.offset), (w.id, w.offset))
    }

    /// Unconsumed bytes currently sitting on disk
    pub fn backlog_bytes(&self) -> u64 {
        let ((rid, roff), (wid, woff)) = self.cursors();
        if rid == wid {
            woff.saturating_sub(roff)
        } else {
            let mut total = file_len(&data_path(&self.base, rid)).saturating_sub(roff);
            for id in rid + 1..wid {
                total += file_len(&data_path(&self.base, id));
            }
            total + woff
        }
    }

    /// Persist both cursors to the sidecar
    pub fn save_cursors(&self) {
        let w = self.write.lock();
        let r = self.read.lock();
        self.persist_cursors_locked(&w, &r);
    }

    fn persist_cursors_locked(&self, w: &WriteCursor, r: &ReadCursor) {
        let mut record = [0u8; 32];
        record[0..8].copy_from_slice(&r.id.to_le_bytes());
        record[8..16].copy_from_slice(&r.offset.to_le_bytes());
        record[16..24].copy_from_slice(&w.id.to_le_bytes());
        record[24..32].copy_from_slice(&w.offset.to_le_bytes());

        let path = stats_path(&self.base);
        let tmp = path.with_extension("stats.tmp");
        let result = fs::write(&tmp, record).and_then(|()| fs::rename(&tmp, &path));
        if let Err(e) = result {
            tracing::warn!(path = %path.display(), error = %e, "failed to persist spool cursors");
        }
    }
}

impl Drop for Splitter {
    fn drop(&mut self) {
        self.save_cursors();
    }
}

fn data_path(base: &Path, id: u64) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(format!(".{id}"));
    PathBuf::from(name)
}

fn stats_path(base: &Path) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(".stats");
    PathBuf::from(name)
}

fn file_len(path: &Path) -> u64 {
    fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

fn read_sidecar(base: &Path) -> Option<(u64, u64, u64, u64)> {
    let bytes = fs::read(stats_path(base)).ok()?;
    if bytes.len() != 32 {
        return None;
    }
    let word = |i: usize| u64::from_le_bytes(bytes[i * 8..(i + 1) * 8].try_into().unwrap());
    Some((word(0), word(1), word(2), word(3)))
}

/// Lowest and highest data file ids present on disk
fn scan_ids(base: &Path) -> Result<Option<(u64, u64)>> {
    let dir = base.parent().filter(|p| !p.as_os_str().is_empty());
    let dir = dir.unwrap_or_else(|| Path::new("."));
    let prefix = match base.file_name() {
        Some(n) => {
            let mut p = n.to_os_string();
            p.push(".");
            p
        }
        None => return Ok(None),
    };
    let prefix = prefix.to_string_lossy().into_owned();

    let entries = fs::read_dir(dir).map_err(|e| SpoolError::Scan {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut bounds: Option<(u64, u64)> = None;
    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        let Some(suffix) = name.strip_prefix(&prefix) else {
            continue;
        };
        let Ok(id) = suffix.parse::<u64>() else {
            continue;
        };
        bounds = Some(match bounds {
            None => (id, id),
            Some((lo, hi)) => (lo.min(id), hi.max(id)),
        });
    }
    Ok(bounds)
}
