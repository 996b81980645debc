//! RSS parser: a structural port of the original's stack-based
//! `<rss><channel><item>` walker, rebuilt on `quick-xml`'s pull-parser
//! instead of `html.parser`'s SAX callbacks.

use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FeedItem {
    pub title: Option<String>,
    pub link: String,
    pub description: Option<String>,
}

/// Parse RSS `<channel><item>` entries out of `xml`.
pub fn parse(xml: &str) -> Result<Vec<FeedItem>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut items = Vec::new();
    let mut stack: Vec<String> = Vec::new();
    let mut current: Option<FeedItem> = None;
    let mut text_buf = String::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf).map_err(|e| Error::Parse(e.to_string()))? {
            Event::Eof => break,
            Event::Start(tag) => {
                let name = local_name(&tag);
                if in_item(&stack) && name != "item" {
                    text_buf.clear();
                }
                if stack.last().map(String::as_str) == Some("channel") && name == "item" {
                    current = Some(FeedItem::default());
                }
                stack.push(name);
            }
            Event::Text(t) => {
                text_buf.push_str(&t.unescape().map_err(|e| Error::Parse(e.to_string()))?);
            }
            Event::CData(t) => {
                text_buf.push_str(&String::from_utf8_lossy(&t.into_inner()));
            }
            Event::End(tag) => {
                let name = local_name_close(&tag);
                if let (Some(top), true) = (stack.last(), in_item(&stack)) {
                    if top == &name && name != "item" {
                        if let Some(item) = current.as_mut() {
                            apply_field(item, &name, text_buf.trim());
                        }
                    }
                }
                if name == "item" {
                    if let Some(item) = current.take() {
                        items.push(item);
                    }
                }
                stack.pop();
                text_buf.clear();
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(items)
}

fn in_item(stack: &[String]) -> bool {
    stack.len() >= 3 && stack[0] == "rss" && stack[1] == "channel" && stack[2] == "item"
}

fn apply_field(item: &mut FeedItem, name: &str, content: &str) {
    match name {
        "title" => item.title = Some(content.to_string()),
        "link" => item.link = content.to_string(),
        "description" => item.description = Some(content.to_string()),
        _ => {}
    }
}

fn local_name(tag: &quick_xml::events::BytesStart) -> String {
    String::from_utf8_lossy(tag.local_name().as_ref()).to_lowercase()
}

fn local_name_close(tag: &quick_xml::events::BytesEnd) -> String {
    String::from_utf8_lossy(tag.local_name().as_ref()).to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"
        <rss version="2.0">
          <channel>
            <title>Example Feed</title>
            <link>http://example.com</link>
            <item>
              <title>First post</title>
              <link>http://example.com/1</link>
              <description>The first post.</description>
            </item>
            <item>
              <title>Second post</title>
              <link>http://example.com/2</link>
              <description><![CDATA[Has <b>markup</b>]]></description>
            </item>
          </channel>
        </rss>
    "#;

    #[test]
    fn parses_items() {
        let items = parse(FEED).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title.as_deref(), Some("First post"));
        assert_eq!(items[0].link, "http://example.com/1");
        assert_eq!(items[1].description.as_deref(), Some("Has <b>markup</b>"));
    }

    #[test]
    fn empty_feed_yields_no_items() {
        let items = parse("<rss><channel><title>Empty</title></channel></rss>").unwrap();
        assert!(items.is_empty());
    }
}
