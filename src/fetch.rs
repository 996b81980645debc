//! HTTP fetcher. A blocking `reqwest` client, kept synchronous to match the
//! store's single-threaded execution model (§5).

use crate::error::{Error, Result};

pub struct FetchedPage {
    pub body: String,
    pub content_type: String,
}

const USER_AGENT: &str = concat!("gleaner/", env!("CARGO_PKG_VERSION"));

/// Fetch `url`, returning its decoded body and `Content-Type` header.
pub fn get(url: &str) -> Result<FetchedPage> {
    let client = reqwest::blocking::Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| Error::Fetch(e.to_string()))?;

    let resp = client.get(url).send().map_err(|e| Error::Fetch(e.to_string()))?;
    if !resp.status().is_success() {
        return Err(Error::Fetch(format!("{url}: HTTP {}", resp.status())));
    }

    let content_type = resp
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    let body = resp.text().map_err(|e| Error::Fetch(e.to_string()))?;
    Ok(FetchedPage { body, content_type })
}
