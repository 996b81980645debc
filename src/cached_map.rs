//! `CachedMap`: a persistent ordered string→u64 map with a write-through
//! in-memory overlay. See [`crate::fst_map::FstMap`] for the underlying
//! ordered-map primitive.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::fst_map::FstMap;

pub struct CachedMap {
    path: PathBuf,
    fst: FstMap,
    overlay: BTreeMap<Vec<u8>, u64>,
}

impl CachedMap {
    /// Open (or create) the FST file at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<CachedMap> {
        let path = path.as_ref().to_path_buf();
        let fst = FstMap::open(&path)?;
        Ok(CachedMap { path, fst, overlay: BTreeMap::new() })
    }

    /// Buffer a write. Durable only after `flush`.
    pub fn set<K: Into<Vec<u8>>>(&mut self, key: K, value: u64) {
        self.overlay.insert(key.into(), value);
    }

    /// Overlay wins over the on-disk FST.
    pub fn get<K: AsRef<[u8]>>(&self, key: K) -> Option<u64> {
        let key = key.as_ref();
        if let Some(&v) = self.overlay.get(key) {
            return Some(v);
        }
        self.fst.get(key)
    }

    pub fn contains<K: AsRef<[u8]>>(&self, key: K) -> bool {
        let key = key.as_ref();
        self.overlay.contains_key(key) || self.fst.get(key).is_some()
    }

    /// Bounded edit-distance search. Delegates to the on-disk FST only; the
    /// overlay is not searched approximately. Callers who need fuzzy
    /// results over just-written keys should `flush` first.
    pub fn search(&self, key: &str, max_dist: u8) -> Result<Vec<(String, u64)>> {
        self.fst.search(key, max_dist)
    }

    /// All `(key, value)` pairs currently resolvable through the on-disk
    /// FST (used by `Db::compact`).
    pub fn fst_entries(&self) -> Vec<(Vec<u8>, u64)> {
        self.fst.iter()
    }

    /// Build a new FST from the overlay, union it with the current FST
    /// (max-wins on colliding keys), and atomically swap it in.
    pub fn flush(&mut self) -> Result<()> {
        if self.overlay.is_empty() {
            return Ok(());
        }
        let overlay_fst_path = self.path.with_extension("overlay");
        FstMap::build(&overlay_fst_path, self.overlay.iter().map(|(k, v)| (k.clone(), *v)))?;
        let overlay_fst = FstMap::open(&overlay_fst_path)?;

        let merged = self.fst.union_with(&overlay_fst);
        crate::fst_map::build_and_swap(
            &self.path,
            merged.into_iter().map(|(k, vs)| (k, vs.into_iter().max().unwrap())),
        )?;

        std::fs::remove_file(&overlay_fst_path)?;
        self.fst = FstMap::open(&self.path)?;
        self.overlay.clear();
        Ok(())
    }

    /// Replace the on-disk FST outright with `entries`, discarding whatever
    /// it held before. Unlike `flush`, this does not merge against the
    /// existing map, for callers (like compaction) whose new handles were
    /// renumbered from zero and so can't be compared against old ones by
    /// magnitude.
    pub fn rebuild<I: IntoIterator<Item = (Vec<u8>, u64)>>(&mut self, entries: I) -> Result<()> {
        let mut sorted: Vec<(Vec<u8>, u64)> = entries.into_iter().collect();
        sorted.sort_by(|a, b| a.0.cmp(&b.0));
        crate::fst_map::build_and_swap(&self.path, sorted)?;
        self.fst = FstMap::open(&self.path)?;
        self.overlay.clear();
        Ok(())
    }
}
