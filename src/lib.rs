//! `gleaner`: a small personal search engine. Crawls RSS feeds, extracts
//! the main text of each linked page, and builds a persistent full-text
//! index over the harvested corpus.
//!
//! The hard part lives in [`fst_map`], [`cached_map`], [`log_map`],
//! [`bitmap`] and [`db`], a content-addressable blob store and an
//! inverted-index protocol built on top of it. Everything else
//! ([`fetch`], [`extract`], [`rss`], [`normalize`]) is a collaborator that
//! feeds text into the index.

pub mod bitmap;
pub mod cached_map;
pub mod db;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod fst_map;
pub mod log_map;
pub mod normalize;
pub mod rss;

pub use db::{Db, SearchHit};
pub use error::{Error, Result};
