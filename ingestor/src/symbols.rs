//! S&P 500 constituents list.
//!
//! The symbol set is scraped once at startup from the constituents table of a
//! public page and normalized to the provider's ticker format. Any failure here
//! is fatal to the process.

use regex::Regex;
use thiserror::Error;
use tracing::info;

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 sp500-ingestor";

#[derive(Error, Debug)]
pub enum SymbolError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {0}")]
    Status(reqwest::StatusCode),

    #[error("no table found in page")]
    NoTable,

    #[error("table has no Symbol column")]
    NoSymbolColumn,

    #[error("symbol table is empty")]
    Empty,

    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Rewrites exchange class suffixes to the provider's form ("BRK.B" -> "BRK-B").
pub fn normalize_symbol(raw: &str) -> String {
    raw.trim().replace('.', "-")
}

/// Downloads the constituents page and extracts the normalized symbol column.
pub async fn fetch_symbols(url: &str) -> Result<Vec<String>, SymbolError> {
    info!("Fetching symbol list from {}", url);

    let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
    let response = client.get(url).send().await?;

    let status = response.status();
    if !status.is_success() {
        return Err(SymbolError::Status(status));
    }

    let html = response.text().await?;
    let symbols = parse_symbols(&html)?;
    info!("Loaded {} symbols", symbols.len());
    Ok(symbols)
}

/// Extracts the `Symbol` column of the constituents table, in page order.
pub fn parse_symbols(html: &str) -> Result<Vec<String>, SymbolError> {
    let table = constituents_table(html).ok_or(SymbolError::NoTable)?;

    let row_re = Regex::new(r"(?is)<tr(?:\s[^>]*)?>(.*?)</tr>")?;
    let cell_re = Regex::new(r"(?is)<(td|th)(?:\s[^>]*)?>(.*?)</t[dh]>")?;
    let tag_re = Regex::new(r"(?s)<[^>]*>")?;

    let mut column: Option<usize> = None;
    let mut symbols = Vec::new();

    for row in row_re.captures_iter(table) {
        let cells: Vec<(bool, String)> = cell_re
            .captures_iter(&row[1])
            .map(|cell| {
                let is_header = cell[1].eq_ignore_ascii_case("th");
                (is_header, cell_text(&tag_re, &cell[2]))
            })
            .collect();

        if cells.is_empty() {
            continue;
        }

        match column {
            None => {
                // first row must be the header
                if !cells.iter().all(|(is_header, _)| *is_header) {
                    return Err(SymbolError::NoSymbolColumn);
                }
                let index = cells
                    .iter()
                    .position(|(_, text)| text.eq_ignore_ascii_case("symbol"))
                    .ok_or(SymbolError::NoSymbolColumn)?;
                column = Some(index);
            }
            Some(index) => {
                if let Some((_, text)) = cells.get(index) {
                    if !text.is_empty() {
                        symbols.push(normalize_symbol(text));
                    }
                }
            }
        }
    }

    if column.is_none() {
        return Err(SymbolError::NoSymbolColumn);
    }
    if symbols.is_empty() {
        return Err(SymbolError::Empty);
    }
    Ok(symbols)
}

/// The table tagged `id="constituents"`, or the first table of the page.
fn constituents_table(html: &str) -> Option<&str> {
    let start = match html.find("id=\"constituents\"") {
        Some(anchor) => html[..anchor].rfind("<table")?,
        None => html.find("<table")?,
    };
    let rest = &html[start..];
    let end = rest.find("</table>")?;
    Some(&rest[..end])
}

fn cell_text(tag_re: &Regex, inner: &str) -> String {
    tag_re
        .replace_all(inner, "")
        .replace("&amp;", "&")
        .replace("&nbsp;", " ")
        .replace("&#160;", " ")
        .trim()
        .to_string()
}
