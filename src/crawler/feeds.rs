//! RSS/Atom feed and XML sitemap parsing

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use super::error::CrawlError;

/// A parsed sitemap document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sitemap {
    /// `<sitemapindex>`: locations of nested sitemap documents
    Index(Vec<String>),
    /// `<urlset>`: page locations
    UrlSet(Vec<String>),
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).to_ascii_lowercase()
}

fn attr(e: &BytesStart<'_>, key: &str) -> Option<String> {
    e.attributes().flatten().find_map(|a| {
        if a.key.local_name().as_ref().eq_ignore_ascii_case(key.as_bytes()) {
            a.unescape_value().ok().map(|v| v.trim().to_string())
        } else {
            None
        }
    })
}

/// Collect the entry links of an RSS 2.0, RSS 1.0 or Atom feed
pub fn parse_feed(xml: &str) -> Result<Vec<String>, CrawlError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut links = Vec::new();
    let mut in_entry = false;
    let mut in_link = false;
    let mut text = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(ref e) => match local_name(e).as_str() {
                "item" | "entry" => in_entry = true,
                "link" if in_entry => {
                    // Atom links carry the target in href; RSS links in the text
                    if let Some(href) = atom_href(e) {
                        links.push(href);
                    } else {
                        in_link = true;
                        text.clear();
                    }
                }
                _ => {}
            },
            Event::Empty(ref e) => {
                if in_entry && local_name(e) == "link" {
                    if let Some(href) = atom_href(e) {
                        links.push(href);
                    }
                }
            }
            Event::Text(ref e) if in_link => {
                if let Ok(t) = e.unescape() {
                    text.push_str(&t);
                }
            }
            Event::CData(ref e) if in_link => {
                text.push_str(&String::from_utf8_lossy(e));
            }
            Event::End(ref e) => match String::from_utf8_lossy(e.local_name().as_ref())
                .to_ascii_lowercase()
                .as_str()
            {
                "link" if in_link => {
                    in_link = false;
                    let link = text.trim();
                    if !link.is_empty() {
                        links.push(link.to_string());
                    }
                }
                "item" | "entry" => in_entry = false,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(links)
}

/// href of an Atom `<link>` that points at the entry itself
fn atom_href(e: &BytesStart<'_>) -> Option<String> {
    let href = attr(e, "href")?;
    match attr(e, "rel").as_deref() {
        None | Some("alternate") => Some(href).filter(|h| !h.is_empty()),
        Some(_) => None,
    }
}

/// Parse a sitemap, telling an index document apart from a urlset
pub fn parse_sitemap(xml: &str) -> Result<Sitemap, CrawlError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut is_index: Option<bool> = None;
    let mut locs = Vec::new();
    let mut in_loc = false;
    let mut text = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(ref e) => match local_name(e).as_str() {
                "sitemapindex" if is_index.is_none() => is_index = Some(true),
                "urlset" if is_index.is_none() => is_index = Some(false),
                "loc" => {
                    in_loc = true;
                    text.clear();
                }
                _ => {}
            },
            Event::Text(ref e) if in_loc => {
                if let Ok(t) = e.unescape() {
                    text.push_str(&t);
                }
            }
            Event::CData(ref e) if in_loc => {
                text.push_str(&String::from_utf8_lossy(e));
            }
            Event::End(ref e) if e.local_name().as_ref().eq_ignore_ascii_case(b"loc") => {
                in_loc = false;
                let loc = text.trim();
                if !loc.is_empty() {
                    locs.push(loc.to_string());
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    match is_index {
        Some(true) => Ok(Sitemap::Index(locs)),
        Some(false) => Ok(Sitemap::UrlSet(locs)),
        None => Err(CrawlError::Other(
            "Document is neither a sitemap index nor a urlset".to_string(),
        )),
    }
}
