//! Thin typed wrapper around the `fst` crate: an immutable, on-disk
//! ordered string→u64 map with exact, prefix and bounded edit-distance
//! lookup, plus value-collecting union of two maps.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use fst::automaton::{Automaton, Str};
use fst::{IntoStreamer, Map, MapBuilder, Streamer};
use levenshtein_automata::{LevenshteinAutomatonBuilder, DFA};

use crate::error::{Error, Result};

/// An immutable, memory-mapped ordered string→u64 map.
pub struct FstMap {
    map: Map<memmap2::Mmap>,
}

impl FstMap {
    /// Build a new FST at `path` from a strictly ascending sequence of
    /// `(key, value)` pairs.
    pub fn build<P, I, K>(path: P, iter: I) -> Result<()>
    where
        P: AsRef<Path>,
        I: IntoIterator<Item = (K, u64)>,
        K: AsRef<[u8]>,
    {
        let file = File::create(path)?;
        let mut builder = MapBuilder::new(BufWriter::new(file)).map_err(classify_build_error)?;
        for (key, value) in iter {
            builder.insert(key, value).map_err(classify_build_error)?;
        }
        builder.finish().map_err(classify_build_error)?;
        Ok(())
    }

    /// Open the FST at `path`. If the file does not exist, an empty map is
    /// returned instead of an error.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<FstMap> {
        let path = path.as_ref();
        if !path.exists() {
            Self::build(path, std::iter::empty::<(Vec<u8>, u64)>())?;
        }
        let file = File::open(path)?;
        let mmap = unsafe { memmap2::Mmap::map(&file)? };
        let map = Map::new(mmap).map_err(|e| Error::CorruptIndex { detail: e.to_string() })?;
        Ok(FstMap { map })
    }

    /// Exact key lookup.
    pub fn get<K: AsRef<[u8]>>(&self, key: K) -> Option<u64> {
        self.map.get(key)
    }

    /// Returns `(matched_key, value)` pairs within `max_dist` Levenshtein
    /// edits of `key`, in ascending key order. `max_dist == 0` degenerates
    /// to a prefix-or-exact match over `key`.
    pub fn search(&self, key: &str, max_dist: u8) -> Result<Vec<(String, u64)>> {
        let mut out = Vec::new();
        if max_dist == 0 {
            let aut = Str::new(key).starts_with();
            let mut stream = self.map.search(aut).into_stream();
            while let Some((k, v)) = stream.next() {
                out.push((String::from_utf8_lossy(k).into_owned(), v));
            }
        } else {
            let dfa = build_dfa(key, max_dist);
            let mut stream = self.map.search(&dfa).into_stream();
            while let Some((k, v)) = stream.next() {
                out.push((String::from_utf8_lossy(k).into_owned(), v));
            }
        }
        Ok(out)
    }

    /// Number of entries in the map.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterate all `(key, value)` pairs in ascending key order.
    pub fn iter(&self) -> Vec<(Vec<u8>, u64)> {
        let mut out = Vec::with_capacity(self.map.len());
        let mut stream = self.map.stream();
        while let Some((k, v)) = stream.next() {
            out.push((k.to_vec(), v));
        }
        out
    }

    /// Union this map with `other`, returning for every key in the merged
    /// keyset the non-empty ordered list of values it had in `self` and in
    /// `other`.
    pub fn union_with(&self, other: &FstMap) -> Vec<(Vec<u8>, Vec<u64>)> {
        let mut out = Vec::new();
        let mut op = fst::map::OpBuilder::new()
            .add(self.map.stream())
            .add(other.map.stream())
            .union();
        while let Some((key, values)) = op.next() {
            out.push((key.to_vec(), values.iter().map(|iv| iv.value).collect()));
        }
        out
    }
}

fn build_dfa(key: &str, max_dist: u8) -> DFA {
    let builder = LevenshteinAutomatonBuilder::new(max_dist, true);
    builder.build_dfa(key)
}

/// Keys inserted out of order or duplicated are a caller bug, distinct from
/// any other failure while constructing or writing the FST.
fn classify_build_error(e: fst::Error) -> Error {
    match e {
        fst::Error::Io(io_err) => Error::Io(io_err),
        fst::Error::Fst(fst::raw::Error::OutOfOrder { .. })
        | fst::Error::Fst(fst::raw::Error::DuplicateKey { .. }) => Error::InvalidBuild,
        other => Error::Fst(other),
    }
}

/// Write `entries` (already sorted, ascending, deduplicated by key with a
/// single winning value) to a temporary path next to `path` and atomically
/// rename it over `path`.
pub fn build_and_swap<P, I, K>(path: P, entries: I) -> Result<()>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = (K, u64)>,
    K: AsRef<[u8]>,
{
    let path = path.as_ref();
    let tmp = path.with_extension("tmp");
    FstMap::build(&tmp, entries)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
