//! `Db`: the inverted index. Composes four stores (`page`, `pageset`,
//! `link`, `word`) into `insert`/`search`/`complete`/`flush`/`compact`.

use std::path::Path;

use log::debug;

use crate::bitmap::Postings;
use crate::cached_map::CachedMap;
use crate::error::Result;
use crate::log_map::LogMap;
use crate::normalize::tokenize;

/// A single search hit: the source URL and a snippet of its text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub url: String,
    pub snippet: String,
}

const SNIPPET_LEN: usize = 500;

pub struct Db {
    page: LogMap,
    pageset: LogMap,
    link: CachedMap,
    word: CachedMap,
}

impl Db {
    /// Open (or create) the four stores rooted at `dir`.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Db> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        Ok(Db {
            page: LogMap::open(dir.join("page"))?,
            pageset: LogMap::open(dir.join("pageset"))?,
            link: CachedMap::open(dir.join("link"))?,
            word: CachedMap::open(dir.join("word"))?,
        })
    }

    /// Insert a crawled page. Returns `Ok(None)` if `url` was already
    /// indexed (link idempotence); otherwise the freshly assigned doc-id.
    pub fn insert(&mut self, url: &str, fragments: &[String]) -> Result<Option<u32>> {
        if self.link.contains(url) {
            debug!("insert: {url} already indexed, skipping");
            return Ok(None);
        }

        let payload = format!("{}\n{}", url, fragments.concat());
        let page_key = format!("{:x}", md5::compute(payload.as_bytes()));
        let doc_id = self.page.set(page_key, payload.into_bytes());
        debug_assert_eq!(doc_id, self.page.len() - 1);
        let doc_id = doc_id as u32;

        self.link.set(url.to_string(), doc_id as u64);

        let mut tokens = Vec::new();
        for fragment in fragments {
            tokens.extend(tokenize(fragment));
        }
        tokens.sort();
        tokens.dedup();

        for word in tokens {
            let mut postings = match self.word.get(&word) {
                Some(handle) => match self.pageset.read_at(handle)? {
                    Some(bytes) => Postings::from_bytes(&bytes)?,
                    None => Postings::new(),
                },
                None => Postings::new(),
            };
            postings.add(doc_id);
            let bytes = postings.to_bytes();
            let key = format!("{:x}", md5::compute(&bytes));
            let new_handle = self.pageset.set(key, bytes);
            self.word.set(word, new_handle);
        }

        self.flush()?;
        Ok(Some(doc_id))
    }

    /// Persist all buffered writes across the four stores.
    pub fn flush(&mut self) -> Result<()> {
        self.page.flush()?;
        self.link.flush()?;
        self.pageset.flush()?;
        self.word.flush()?;
        Ok(())
    }

    /// AND-intersection search across `words`. A word with no matching
    /// entries in the word index makes the whole conjunction empty.
    pub fn search(&self, words: &[&str]) -> Result<Vec<SearchHit>> {
        let mut acc: Option<Postings> = None;

        for word in words {
            let candidates = self.word.search(word, 0)?;
            let mut word_postings = Postings::new();
            for (_, handle) in candidates {
                if let Some(bytes) = self.pageset.read_at(handle)? {
                    let bitmap = Postings::from_bytes(&bytes)?;
                    word_postings = &word_postings | &bitmap;
                }
            }

            acc = Some(match acc {
                Some(prev) => &prev & &word_postings,
                None => word_postings,
            });

            if acc.as_ref().map(Postings::is_empty).unwrap_or(true) {
                return Ok(Vec::new());
            }
        }

        let mut hits = Vec::new();
        for doc_id in acc.into_iter().flatten() {
            if let Some(bytes) = self.page.read_at(doc_id as u64)? {
                let payload = String::from_utf8_lossy(&bytes);
                if let Some((url, text)) = payload.split_once('\n') {
                    hits.push(SearchHit { url: url.to_string(), snippet: truncate_snippet(text) });
                }
            }
        }
        Ok(hits)
    }

    /// Completion candidates within edit distance 2 of `word`.
    pub fn complete(&self, word: &str) -> Result<Vec<String>> {
        let mut matches: Vec<String> = self.word.search(word, 2)?.into_iter().map(|(k, _)| k).collect();
        matches.sort();
        matches.dedup();
        Ok(matches)
    }

    /// Rebuild `pageset` from scratch: iterate every `(token, handle)` pair
    /// the `word` FST currently resolves, re-emit each referenced bitmap in
    /// a fresh `LogMap`, and swap it in only once every bitmap and the
    /// remapped `word` index are fully written. The previous `pageset`
    /// directory is retained until that point, so a crash mid-compact
    /// leaves it intact.
    pub fn compact<P: AsRef<Path>>(&mut self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        let fresh_path = dir.join("pageset.compact");
        if fresh_path.exists() {
            std::fs::remove_dir_all(&fresh_path)?;
        }
        let mut fresh = LogMap::open(&fresh_path)?;

        let mut remap = Vec::new();
        for (word_bytes, old_handle) in self.word.fst_entries() {
            let bytes = match self.pageset.read_at(old_handle)? {
                Some(bytes) => bytes,
                None => continue,
            };
            let key = format!("{:x}", md5::compute(&bytes));
            let new_handle = fresh.set(key, bytes);
            remap.push((word_bytes, new_handle));
        }
        fresh.flush()?;

        // Rebuild rather than overlay-and-merge: `fresh`'s slots are
        // renumbered from zero, so the usual max-wins flush (which assumes
        // later writes carry higher handles) would let a stale pre-compact
        // handle outrank a smaller but current one.
        self.word.rebuild(remap)?;

        let live_path = dir.join("pageset");
        let old_path = dir.join("pageset.old");
        if old_path.exists() {
            std::fs::remove_dir_all(&old_path)?;
        }
        std::fs::rename(&live_path, &old_path)?;
        std::fs::rename(&fresh_path, &live_path)?;
        self.pageset = LogMap::open(&live_path)?;
        std::fs::remove_dir_all(&old_path)?;

        Ok(())
    }

}

fn truncate_snippet(text: &str) -> String {
    if text.len() <= SNIPPET_LEN {
        return text.to_string();
    }
    let mut end = SNIPPET_LEN;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frags(s: &str) -> Vec<String> {
        vec![s.to_string()]
    }

    #[test]
    fn s1_fresh_insert_single_word() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = Db::open(dir.path()).unwrap();
        let id = db.insert("http://a", &frags("hello")).unwrap();
        assert_eq!(id, Some(0));

        let hits = db.search(&["hello"]).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].url, "http://a");
    }

    #[test]
    fn s2_second_insert_new_word() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = Db::open(dir.path()).unwrap();
        db.insert("http://a", &frags("hello")).unwrap();
        let id = db.insert("http://b", &frags("world")).unwrap();
        assert_eq!(id, Some(1));

        assert_eq!(db.search(&["hello"]).unwrap()[0].url, "http://a");
        assert_eq!(db.search(&["world"]).unwrap()[0].url, "http://b");
    }

    #[test]
    fn s3_overlapping_word() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = Db::open(dir.path()).unwrap();
        db.insert("http://a", &frags("hello")).unwrap();
        db.insert("http://b", &frags("world")).unwrap();
        db.insert("http://c", &frags("hello world")).unwrap();

        let mut hello_urls: Vec<_> = db.search(&["hello"]).unwrap().into_iter().map(|h| h.url).collect();
        hello_urls.sort();
        assert_eq!(hello_urls, vec!["http://a", "http://c"]);

        let mut world_urls: Vec<_> = db.search(&["world"]).unwrap().into_iter().map(|h| h.url).collect();
        world_urls.sort();
        assert_eq!(world_urls, vec!["http://b", "http://c"]);
    }

    #[test]
    fn s4_reinsert_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = Db::open(dir.path()).unwrap();
        db.insert("http://a", &frags("hello")).unwrap();
        let second = db.insert("http://a", &frags("anything")).unwrap();
        assert_eq!(second, None);
        // the new word must not have been indexed
        assert!(db.search(&["anything"]).unwrap().is_empty());
    }

    #[test]
    fn s5_complete() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = Db::open(dir.path()).unwrap();
        db.insert("http://a", &frags("hello")).unwrap();
        let candidates = db.complete("helo").unwrap();
        assert!(candidates.contains(&"hello".to_string()));
    }

    #[test]
    fn s7_search_intersection() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = Db::open(dir.path()).unwrap();
        db.insert("http://a", &frags("hello")).unwrap();
        db.insert("http://b", &frags("world")).unwrap();
        db.insert("http://c", &frags("hello world")).unwrap();

        let hits = db.search(&["hello", "world"]).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].url, "http://c");
    }

    #[test]
    fn search_with_unknown_word_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = Db::open(dir.path()).unwrap();
        db.insert("http://a", &frags("hello")).unwrap();
        assert!(db.search(&["nonexistent"]).unwrap().is_empty());
    }

    #[test]
    fn snippet_is_truncated_on_char_boundary() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = Db::open(dir.path()).unwrap();
        let long_text = "word ".repeat(200);
        db.insert("http://a", &frags(&long_text)).unwrap();
        let hits = db.search(&["word"]).unwrap();
        assert!(hits[0].snippet.len() <= SNIPPET_LEN);
    }

    #[test]
    fn s6_crash_between_temp_write_and_rename() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = Db::open(dir.path()).unwrap();

        // Replicate insert()'s protocol by hand, but stop short of
        // flushing `word` -- simulating a crash before that store's
        // fst-rename became visible.
        let payload = "http://a\nhello".to_string();
        let page_key = format!("{:x}", md5::compute(payload.as_bytes()));
        let doc_id = db.page.set(page_key, payload.into_bytes()) as u32;
        db.link.set("http://a".to_string(), doc_id as u64);
        let mut postings = Postings::new();
        postings.add(doc_id);
        let bytes = postings.to_bytes();
        let key = format!("{:x}", md5::compute(&bytes));
        let handle = db.pageset.set(key, bytes);
        db.word.set("hello".to_string(), handle);

        db.page.flush().unwrap();
        db.link.flush().unwrap();
        db.pageset.flush().unwrap();
        // db.word.flush() intentionally skipped.
        drop(db);

        let reopened = Db::open(dir.path()).unwrap();
        assert!(reopened.page.read_at(0).unwrap().is_some());
        assert!(reopened.search(&["hello"]).unwrap().is_empty());
    }

    #[test]
    fn compact_preserves_search_results() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = Db::open(dir.path()).unwrap();
        db.insert("http://a", &frags("hello")).unwrap();
        db.insert("http://b", &frags("hello world")).unwrap();

        db.compact(dir.path()).unwrap();

        let hits = db.search(&["hello"]).unwrap();
        assert_eq!(hits.len(), 2);
    }
}
