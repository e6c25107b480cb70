//! Listing page parsing.
//!
//! Page layout:
//!
//! ```html
//! <h2 class="group">Beispiel</h2>
//! <div class="results">Found <b>2</b> entries</div>
//! <table class="modland">
//!   <tr><th>Name</th><th>Size</th></tr>
//!   <tr><td><a href="/pub/modules/Protracker/Beispiel/track1.mod">track1.mod</a></td><td>12,345</td></tr>
//! </table>
//! <a class="next" href="?md=aut&amp;id=42&amp;pg=2">Next</a>
//! ```
//!
//! Group listings use the same table, with `?id=N` links and the track count
//! in the second cell.

use super::consts;
use crate::error::{ErrorKind, Result};
use crate::{Group, Track};
use exn::{OptionExt, ResultExt};
use percent_encoding::percent_decode_str;
use scraper::{ElementRef, Html};
use tracing::instrument;
use url::Url;

/// One parsed listing page.
#[derive(Debug)]
pub(crate) struct Page<T> {
    /// "Found N" header.
    pub count: Option<u64>,
    pub heading: Option<String>,
    pub items: Vec<T>,
    pub has_next: bool,
}

#[instrument(level = "trace", skip(html), fields(html_size = html.len()))]
pub(crate) fn groups_page(html: &str) -> Result<Page<Group>> {
    let document = Html::parse_document(html);
    let mut items = Vec::new();
    for row in document.select(&consts::ROW_SELECTOR) {
        let Some(link) = row.select(&consts::LINK_SELECTOR).next() else {
            continue;
        };
        let href = link.value().attr("href").unwrap_or_default();
        let id = consts::GROUP_ID_REGEX
            .captures(href)
            .and_then(|captures| captures.get(1))
            .ok_or_raise(|| ErrorKind::Parse(format!("group link without id: {href}")))?
            .as_str()
            .parse::<u32>()
            .or_raise(|| ErrorKind::Parse(format!("group id out of range: {href}")))?;
        let name = self::text(link);
        if name.is_empty() {
            exn::bail!(ErrorKind::Parse(format!("group {id} has no name")));
        }
        let tracks = match self::cell(row, 1) {
            Some(cell) => u32::try_from(self::number(&cell)?)
                .or_raise(|| ErrorKind::Parse(format!("track count out of range: {cell}")))?,
            None => 0,
        };
        items.push(Group { id, name, tracks });
    }
    Ok(Page {
        count: self::count(&document)?,
        heading: self::heading(&document),
        items,
        has_next: self::has_next(&document),
    })
}

/// Track links are resolved against `base` (the storage root).
#[instrument(level = "trace", skip(html), fields(html_size = html.len()))]
pub(crate) fn tracks_page(html: &str, base: &Url) -> Result<Page<Track>> {
    let document = Html::parse_document(html);
    let mut items = Vec::new();
    for row in document.select(&consts::ROW_SELECTOR) {
        let Some(link) = row.select(&consts::LINK_SELECTOR).next() else {
            continue;
        };
        let href = link.value().attr("href").unwrap_or_default();
        let location = base.join(href).or_raise(|| ErrorKind::Parse(format!("invalid track link: {href}")))?;
        let path = percent_decode_str(location.path()).decode_utf8_lossy().into_owned();
        if path.ends_with('/') {
            exn::bail!(ErrorKind::Parse(format!("track link is a directory: {href}")));
        }
        let size = self::cell(row, 1)
            .ok_or_raise(|| ErrorKind::Parse(format!("track without size: {href}")))
            .and_then(|cell| self::number(&cell))?;
        items.push(Track::new(path, size));
    }
    Ok(Page {
        count: self::count(&document)?,
        heading: self::heading(&document),
        items,
        has_next: self::has_next(&document),
    })
}

fn text(element: ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn cell(row: ElementRef, index: usize) -> Option<String> {
    row.select(&consts::CELL_SELECTOR).nth(index).map(self::text)
}

/// Digits with optional thousands separators.
fn number(text: &str) -> Result<u64> {
    let digits: String = text.chars().filter(|c| *c != ',').collect();
    digits.trim().parse::<u64>().or_raise(|| ErrorKind::Parse(format!("not a number: {text:?}")))
}

fn count(document: &Html) -> Result<Option<u64>> {
    let Some(results) = document.select(&consts::RESULTS_SELECTOR).next() else {
        return Ok(None);
    };
    let text = self::text(results);
    match consts::FOUND_REGEX.captures(&text).and_then(|captures| captures.get(1)) {
        Some(found) => self::number(found.as_str()).map(Some),
        None => Ok(None),
    }
}

fn heading(document: &Html) -> Option<String> {
    document.select(&consts::HEADING_SELECTOR).next().map(self::text).filter(|s| !s.is_empty())
}

fn has_next(document: &Html) -> bool {
    document.select(&consts::NEXT_SELECTOR).next().is_some()
}
