//! Compressed, sortable bitmaps of document ids, used to store each word's
//! posting list. A thin newtype over [`roaring::RoaringBitmap`].

use std::ops::{BitAnd, BitOr};

use roaring::RoaringBitmap;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Postings(RoaringBitmap);

impl Postings {
    pub fn new() -> Postings {
        Postings(RoaringBitmap::new())
    }

    pub fn add(&mut self, doc_id: u32) -> bool {
        self.0.insert(doc_id)
    }

    pub fn len(&self) -> u64 {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, doc_id: u32) -> bool {
        self.0.contains(doc_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.iter()
    }

    /// True iff every id in `other` is also in `self`.
    pub fn is_superset(&self, other: &Postings) -> bool {
        self.0.is_superset(&other.0)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.0.serialized_size());
        self.0.serialize_into(&mut out).expect("writing to a Vec cannot fail");
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Postings> {
        RoaringBitmap::deserialize_from(bytes)
            .map(Postings)
            .map_err(|e| Error::CorruptIndex { detail: e.to_string() })
    }
}

impl BitAnd for &Postings {
    type Output = Postings;

    fn bitand(self, rhs: &Postings) -> Postings {
        Postings(&self.0 & &rhs.0)
    }
}

impl BitOr for &Postings {
    type Output = Postings;

    fn bitor(self, rhs: &Postings) -> Postings {
        Postings(&self.0 | &rhs.0)
    }
}

impl IntoIterator for Postings {
    type Item = u32;
    type IntoIter = <RoaringBitmap as IntoIterator>::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialize_round_trip() {
        let mut p = Postings::new();
        p.add(1);
        p.add(5);
        p.add(3);
        let bytes = p.to_bytes();
        let back = Postings::from_bytes(&bytes).unwrap();
        assert_eq!(p, back);
        assert_eq!(back.iter().collect::<Vec<_>>(), vec![1, 3, 5]);
    }

    #[test]
    fn and_or() {
        let mut a = Postings::new();
        a.add(1);
        a.add(2);
        let mut b = Postings::new();
        b.add(2);
        b.add(3);

        let and = &a & &b;
        assert_eq!(and.iter().collect::<Vec<_>>(), vec![2]);

        let or = &a | &b;
        assert_eq!(or.iter().collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn monotone_superset() {
        let mut a = Postings::new();
        a.add(1);
        let mut b = a.clone();
        b.add(2);
        assert!(b.is_superset(&a));
        assert!(!a.is_superset(&b));
    }
}
