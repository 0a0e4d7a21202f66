//! Parser for saved item collections.

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::record::Record;

#[derive(Deserialize)]
#[serde(untagged)]
enum Saved {
    List(Vec<Record>),
    Page {
        #[serde(default)]
        resultado: Option<Vec<Record>>,
    },
}

/// Decodes records saved from the items endpoint: either a bare JSON array
/// of items or a full page document with a `resultado` list.
///
/// # Errors
///
/// Returns an error if the bytes are neither shape.
pub fn parse_records(bytes: &[u8]) -> Result<Vec<Record>> {
    let saved: Saved =
        serde_json::from_slice(bytes).context("input is not an item list or items page")?;
    Ok(match saved {
        Saved::List(records) => records,
        Saved::Page { resultado } => resultado.unwrap_or_default(),
    })
}
