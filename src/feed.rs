use std::io::{BufRead, BufReader, Seek, SeekFrom};

use chrono::Local;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::reader::NsReader;
use reqwest::Client;
use tokio::{fs::File, io::AsyncWriteExt, task::spawn_blocking};

use crate::{info_time, Error, Result, ScrapeConfig};

/// Downloads the feed and returns the text of every `{namespace}local_name` element, in
/// document order.
///
/// The body is streamed into an anonymous temporary file and parsed back from disk, so the
/// whole feed never sits in memory. The file is unlinked when its handle drops, whichever way
/// this function exits.
///
/// Malformed XML comes back as [`Error::FeedParse`]; see [`try_extract_urls`] for the variant
/// that swallows it.
pub async fn extract_urls(client: &Client, config: &ScrapeConfig) -> Result<Vec<String>> {
    let start_time = Local::now();
    info_time!("Requesting feed: {}", config.feed_url);

    let mut res = client.get(&config.feed_url).send().await?;
    let mut file = File::from_std(tempfile::tempfile()?);
    while let Some(chunk) = res.chunk().await? {
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    let mut file = file.into_std().await;
    info_time!(start_time, "Downloaded feed.");

    let namespace = config.url_namespace.clone();
    let local_name = config.url_local_name.clone();
    let urls = spawn_blocking(move || -> Result<Vec<String>> {
        file.seek(SeekFrom::Start(0))?;
        parse_feed(BufReader::new(file), &namespace, &local_name)
    })
    .await??;

    info_time!(start_time, "Found {} item URLs in feed.", urls.len());
    Ok(urls)
}

/// Same as [`extract_urls`], but a malformed feed is reported on stderr and turned into
/// `Ok(None)`. Transport errors still propagate.
pub async fn try_extract_urls(client: &Client, config: &ScrapeConfig) -> Result<Option<Vec<String>>> {
    match extract_urls(client, config).await {
        Ok(urls) => Ok(Some(urls)),
        Err(err @ Error::FeedParse { .. }) => {
            eprintln!("{:<30} : An error happened: {err}", Local::now());
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

/// Pull-parses a feed and collects the text content of each element whose resolved name is
/// `{namespace}local_name`. Text of nested children is included; `<URL/>` yields `""`.
pub fn parse_feed<R: BufRead>(source: R, namespace: &str, local_name: &str) -> Result<Vec<String>> {
    let mut reader = NsReader::from_reader(source);
    let mut buf = Vec::new();
    let mut urls = Vec::new();

    let mut depth = 0usize;
    let mut seen_root = false;
    // Depth of the matching element we are inside of, plus its text so far.
    let mut capture: Option<(usize, String)> = None;

    loop {
        buf.clear();
        let (ns, event) = match reader.read_resolved_event_into(&mut buf) {
            Ok(resolved) => resolved,
            Err(e) => return Err(feed_error(reader.buffer_position() as u64, e)),
        };
        let checked = match &event {
            Event::Start(e) | Event::Empty(e) => check_element(&ns, e, namespace, local_name),
            _ => Ok(false),
        };
        // Releases the resolver's borrow of `reader`.
        drop(ns);
        let on_target = checked.map_err(|msg| feed_error(reader.buffer_position() as u64, msg))?;

        if depth == 0 {
            let misplaced = match &event {
                Event::Start(_) | Event::Empty(_) if seen_root => Some("more than one root element"),
                Event::Text(e) if !is_blank(e) => Some("text outside the root element"),
                Event::CData(_) => Some("CDATA outside the root element"),
                _ => None,
            };
            if let Some(msg) = misplaced {
                return Err(feed_error(reader.buffer_position() as u64, msg));
            }
        }

        match event {
            Event::Start(_) => {
                seen_root = true;
                depth += 1;
                if capture.is_none() && on_target {
                    capture = Some((depth, String::new()));
                }
            }
            Event::Empty(_) => {
                seen_root = true;
                if capture.is_none() && on_target {
                    urls.push(String::new());
                }
            }
            Event::Text(e) => {
                if let Some((_, text)) = capture.as_mut() {
                    let unescaped = e
                        .unescape()
                        .map_err(|err| feed_error(reader.buffer_position() as u64, err))?;
                    text.push_str(&unescaped);
                }
            }
            Event::CData(e) => {
                if let Some((_, text)) = capture.as_mut() {
                    text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Event::End(_) => {
                if matches!(capture, Some((d, _)) if d == depth) {
                    if let Some((_, text)) = capture.take() {
                        urls.push(text);
                    }
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let position = reader.buffer_position() as u64;
    if !seen_root {
        return Err(feed_error(position, "no root element"));
    }
    if depth > 0 {
        return Err(feed_error(
            position,
            format!("document ended with {depth} unclosed element(s)"),
        ));
    }

    Ok(urls)
}

/// Rejects unbound prefixes and broken attributes; otherwise tells whether this is an element
/// we collect.
fn check_element(
    ns: &ResolveResult,
    e: &BytesStart<'_>,
    namespace: &str,
    local_name: &str,
) -> core::result::Result<bool, String> {
    if let ResolveResult::Unknown(prefix) = ns {
        return Err(format!(
            "unbound namespace prefix `{}`",
            String::from_utf8_lossy(prefix)
        ));
    }
    for attr in e.attributes() {
        attr.map_err(|err| err.to_string())?;
    }
    Ok(is_target(ns, e.local_name().as_ref(), namespace, local_name))
}

#[inline]
fn is_blank(text: &[u8]) -> bool {
    String::from_utf8_lossy(text)
        .trim_matches(|c: char| c.is_whitespace() || c == '\u{feff}')
        .is_empty()
}

fn is_target(ns: &ResolveResult, local: &[u8], namespace: &str, local_name: &str) -> bool {
    matches!(ns, ResolveResult::Bound(Namespace(n)) if *n == namespace.as_bytes())
        && local == local_name.as_bytes()
}

#[inline]
fn feed_error(position: u64, err: impl std::fmt::Display) -> Error {
    Error::FeedParse {
        position,
        message: err.to_string(),
    }
}
