//! `LogMap`: an append-only, content-addressable byte-blob store. Keys are
//! resolved through an [`FstMap`] to a stable integer "slot"; slots index
//! fixed-width records in `idx` that point at byte ranges in `log`.
//!
//! Grounded on the append-log / index-file split used by `bitcask`-style
//! engines (see the pack's own `rskv` key-value store): a long-lived
//! append-mode writer plus short-lived, freshly-seeked readers, so that
//! reads never race the writer's file position.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::error::Result;
use crate::fst_map::FstMap;

const IDX_RECORD_LEN: u64 = 8;

pub struct LogMap {
    dir: PathBuf,
    log_file: File,
    idx_file: File,
    fst: FstMap,
    log_len: u64,
    flushed_len: u64,
    log_cache: Vec<(Vec<u8>, Vec<u8>)>,
    fst_cache: BTreeMap<Vec<u8>, u64>,
}

impl LogMap {
    /// Open (or create) the three-file store rooted at `dir`.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<LogMap> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;

        let log_path = dir.join("log");
        let idx_path = dir.join("idx");
        let fst_path = dir.join("fst");

        let log_len = recover(&log_path, &idx_path)?;

        let log_file = OpenOptions::new().create(true).append(true).open(&log_path)?;
        let idx_file = OpenOptions::new().create(true).append(true).open(&idx_path)?;
        let fst = FstMap::open(&fst_path)?;

        let flushed_len = idx_file.metadata()?.len() / IDX_RECORD_LEN;

        Ok(LogMap {
            dir,
            log_file,
            idx_file,
            fst,
            log_len,
            flushed_len,
            log_cache: Vec::new(),
            fst_cache: BTreeMap::new(),
        })
    }

    /// Buffer `blob` under `key`. The slot it will occupy after flush is
    /// computed purely from counts: `flushed_len + buffered_count_so_far`,
    /// never from a byte offset.
    pub fn set<K: Into<Vec<u8>>>(&mut self, key: K, blob: Vec<u8>) -> u64 {
        let key = key.into();
        self.log_cache.push((key.clone(), blob));
        let slot = self.flushed_len + self.log_cache.len() as u64 - 1;
        self.fst_cache.insert(key, slot);
        slot
    }

    /// Overlay first (latest buffered write wins), then fall through to
    /// the flushed store.
    pub fn get<K: AsRef<[u8]>>(&self, key: K) -> Result<Option<Vec<u8>>> {
        let key = key.as_ref();
        for (k, v) in self.log_cache.iter().rev() {
            if k.as_slice() == key {
                return Ok(Some(v.clone()));
            }
        }
        match self.fst.get(key) {
            Some(slot) => self.read_at(slot),
            None => Ok(None),
        }
    }

    pub fn contains<K: AsRef<[u8]>>(&self, key: K) -> bool {
        let key = key.as_ref();
        self.log_cache.iter().any(|(k, _)| k.as_slice() == key) || self.fst.get(key).is_some()
    }

    /// Random read by slot number. Reopens the underlying files with a
    /// private handle so a read never disturbs the append writer's cursor.
    pub fn read_at(&self, slot: u64) -> Result<Option<Vec<u8>>> {
        let idx_path = self.dir.join("idx");
        let log_path = self.dir.join("log");

        let mut idx = File::open(&idx_path)?;
        let idx_byte_offset = slot * IDX_RECORD_LEN;
        if idx_byte_offset + IDX_RECORD_LEN > idx.metadata()?.len() {
            return Ok(None);
        }
        idx.seek(SeekFrom::Start(idx_byte_offset))?;
        let offset = idx.read_u32::<BigEndian>()? as u64;
        let length = idx.read_u32::<BigEndian>()? as u64;

        let mut log = File::open(&log_path)?;
        log.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; length as usize];
        log.read_exact(&mut buf)?;
        Ok(Some(buf))
    }

    /// Number of flushed records plus buffered (not yet flushed) records.
    pub fn len(&self) -> u64 {
        self.flushed_len + self.log_cache.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append buffered records to `log`/`idx`, then union `fst_cache` into
    /// the on-disk FST (max-wins) and atomically swap it in.
    pub fn flush(&mut self) -> Result<()> {
        if self.log_cache.is_empty() {
            return Ok(());
        }

        for (_, blob) in &self.log_cache {
            self.idx_file.write_u32::<BigEndian>(self.log_len as u32)?;
            self.idx_file.write_u32::<BigEndian>(blob.len() as u32)?;
            self.log_file.write_all(blob)?;
            self.log_len += blob.len() as u64;
        }
        self.log_file.flush()?;
        self.log_file.sync_data()?;
        self.idx_file.flush()?;
        self.idx_file.sync_data()?;

        let fst_path = self.dir.join("fst");
        let overlay_path = self.dir.join("fst.overlay");
        FstMap::build(&overlay_path, self.fst_cache.iter().map(|(k, v)| (k.clone(), *v)))?;
        let overlay = FstMap::open(&overlay_path)?;

        let merged = self.fst.union_with(&overlay);
        crate::fst_map::build_and_swap(
            &fst_path,
            merged.into_iter().map(|(k, vs)| (k, vs.into_iter().max().unwrap())),
        )?;
        std::fs::remove_file(&overlay_path)?;

        self.fst = FstMap::open(&fst_path)?;
        self.flushed_len += self.log_cache.len() as u64;
        self.log_cache.clear();
        self.fst_cache.clear();
        Ok(())
    }

    /// All `(key, slot)` pairs currently resolvable through the on-disk FST
    /// (used by `Db::compact`).
    pub fn fst_entries(&self) -> Vec<(Vec<u8>, u64)> {
        self.fst.iter()
    }
}

/// Truncate `idx`/`log` to the longest consistent prefix: any idx row whose
/// `offset + length` exceeds the log size is dropped along with every row
/// after it (crash recovery, §4.3). Returns the validated log length.
fn recover(log_path: &Path, idx_path: &Path) -> Result<u64> {
    if !log_path.exists() || !idx_path.exists() {
        return Ok(log_path.metadata().map(|m| m.len()).unwrap_or(0));
    }

    let log_len = log_path.metadata()?.len();
    let mut idx = File::open(idx_path)?;
    let idx_len = idx.metadata()?.len();
    let record_count = idx_len / IDX_RECORD_LEN;

    let mut valid_records = 0u64;
    for slot in 0..record_count {
        idx.seek(SeekFrom::Start(slot * IDX_RECORD_LEN))?;
        let offset = match idx.read_u32::<BigEndian>() {
            Ok(v) => v as u64,
            Err(_) => break,
        };
        let length = match idx.read_u32::<BigEndian>() {
            Ok(v) => v as u64,
            Err(_) => break,
        };
        if offset + length > log_len {
            break;
        }
        valid_records += 1;
    }

    if valid_records < record_count {
        let idx_file = OpenOptions::new().write(true).open(idx_path)?;
        idx_file.set_len(valid_records * IDX_RECORD_LEN)?;
    }

    Ok(log_len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut lm = LogMap::open(dir.path()).unwrap();
        lm.set("a", b"hello".to_vec());
        lm.flush().unwrap();
        assert_eq!(lm.get("a").unwrap(), Some(b"hello".to_vec()));

        drop(lm);
        let lm = LogMap::open(dir.path()).unwrap();
        assert_eq!(lm.get("a").unwrap(), Some(b"hello".to_vec()));
    }

    #[test]
    fn positional_stability() {
        let dir = tempfile::tempdir().unwrap();
        let mut lm = LogMap::open(dir.path()).unwrap();
        let s0 = lm.set("k0", b"v0".to_vec());
        let s1 = lm.set("k1", b"v1".to_vec());
        assert_eq!((s0, s1), (0, 1));
        lm.flush().unwrap();

        let s2 = lm.set("k2", b"v2".to_vec());
        assert_eq!(s2, 2);
        lm.flush().unwrap();

        assert_eq!(lm.read_at(0).unwrap(), Some(b"v0".to_vec()));
        assert_eq!(lm.read_at(1).unwrap(), Some(b"v1".to_vec()));
        assert_eq!(lm.read_at(2).unwrap(), Some(b"v2".to_vec()));
    }

    #[test]
    fn len_counts_buffered_and_flushed() {
        let dir = tempfile::tempdir().unwrap();
        let mut lm = LogMap::open(dir.path()).unwrap();
        assert_eq!(lm.len(), 0);
        lm.set("a", b"x".to_vec());
        assert_eq!(lm.len(), 1);
        lm.flush().unwrap();
        assert_eq!(lm.len(), 1);
        lm.set("b", b"y".to_vec());
        assert_eq!(lm.len(), 2);
    }

    #[test]
    fn recovery_truncates_dangling_idx_row() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut lm = LogMap::open(dir.path()).unwrap();
            lm.set("a", b"hello".to_vec());
            lm.flush().unwrap();
        }
        // Simulate a crash mid-flush: an idx row was written but its log
        // bytes never made it to disk.
        let idx_path = dir.path().join("idx");
        let mut idx = OpenOptions::new().append(true).open(&idx_path).unwrap();
        idx.write_u32::<BigEndian>(1000).unwrap();
        idx.write_u32::<BigEndian>(50).unwrap();

        let lm = LogMap::open(dir.path()).unwrap();
        assert_eq!(lm.get("a").unwrap(), Some(b"hello".to_vec()));
        assert_eq!(lm.flushed_len, 1);
    }
}
