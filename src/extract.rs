//! Heuristic main-text extractor: identify the tag-path (e.g.
//! `html>body>article>p`) whose text nodes have the highest average
//! length, and return the contiguous run of the document's text between
//! the first and last node on one of the top-scoring paths.
//!
//! A structural port of the original's stack-based `TextParser`/`topN`:
//! where the original walked SAX-style start/end tag events onto a stack,
//! this walks `scraper`'s parsed DOM tree directly, since the whole
//! document is available up front.

use std::collections::{HashMap, HashSet};

use scraper::{Html, Node};

const TOP_N: usize = 3;

const SKIP_TAGS: &[&str] =
    &["script", "noscript", "svg", "img", "g", "input", "form", "style", "html", "body", "path"];

struct Row {
    path: Vec<String>,
    text: String,
}

/// Extract the page's main text fragments, one per retained text node.
pub fn extract_text(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let root = document.tree.root();

    let mut rows = Vec::new();
    let mut path = Vec::new();
    collect_rows(root, &mut path, &mut rows);

    if rows.is_empty() {
        return Vec::new();
    }

    let mut scores: HashMap<&[String], Vec<usize>> = HashMap::new();
    for row in &rows {
        scores.entry(row.path.as_slice()).or_default().push(row.text.len());
    }

    let mut board: Vec<(f64, &[String])> = scores
        .iter()
        .map(|(path, lens)| {
            let avg = lens.iter().sum::<usize>() as f64 / lens.len() as f64;
            (avg, *path)
        })
        .collect();
    board.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());

    let keep: HashSet<Vec<String>> = board.iter().rev().take(TOP_N).map(|(_, p)| p.to_vec()).collect();

    let first = rows.iter().position(|r| path_matches(&r.path, &keep));
    let last = rows.iter().rposition(|r| path_matches(&r.path, &keep));

    match (first, last) {
        (Some(first), Some(last)) => rows[first..=last].iter().map(|r| r.text.clone()).collect(),
        _ => Vec::new(),
    }
}

fn path_matches(path: &[String], keep: &HashSet<Vec<String>>) -> bool {
    keep.iter().any(|k| path.len() >= k.len() && path[..k.len()] == k[..])
}

fn collect_rows(node: ego_tree::NodeRef<Node>, path: &mut Vec<String>, rows: &mut Vec<Row>) {
    match node.value() {
        Node::Element(el) => {
            let name = el.name().to_ascii_lowercase();
            // Collapse consecutive repeats of the same tag (e.g. nested
            // `div > div`), matching the original's `collapse` helper.
            let pushed = path.last().map(|p| p != &name).unwrap_or(true);
            if pushed {
                path.push(name);
            }
            for child in node.children() {
                collect_rows(child, path, rows);
            }
            if pushed {
                path.pop();
            }
        }
        Node::Text(text) => {
            let content = text.trim();
            // Only the immediate enclosing tag is checked against
            // SKIP_TAGS, matching the original's leaf-only check; ancestors
            // further up the path are not consulted.
            let leaf_skipped = path.last().map(|p| SKIP_TAGS.contains(&p.as_str())).unwrap_or(false);
            if !content.is_empty() && !path.is_empty() && !leaf_skipped {
                rows.push(Row { path: path.clone(), text: content.to_string() });
            }
        }
        _ => {
            for child in node.children() {
                collect_rows(child, path, rows);
            }
        }
    }
}
