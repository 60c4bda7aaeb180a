//! Derived tabular export of the source registry.
//!
//! A flattened one-row-per-source view (`state,url,category`) that dashboard
//! and spreadsheet tooling read instead of the registry JSON. The curator
//! regenerates it after every registry mutation so the two never diverge.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use crate::registry::Registry;

pub const EXPORT_HEADER: [&str; 3] = ["state", "url", "category"];

/* ---------------------------- Row writing ---------------------------- */

fn needs_quotes(field: &str) -> bool {
    field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r')
}

/// Write a single CSV row to any writer, quoting only when required.
fn write_row<W: Write>(mut w: W, row: &[&str]) -> io::Result<()> {
    let mut first = true;
    for cell in row {
        if !first {
            write!(w, ",")?;
        } else {
            first = false;
        }
        if needs_quotes(cell) {
            let escaped = cell.replace('"', "\"\"");
            write!(w, "\"{}\"", escaped)?;
        } else {
            write!(w, "{}", cell)?;
        }
    }
    writeln!(w)
}

/* ---------------------------- Export ---------------------------- */

/// Render the registry as CSV text: header line first, then one row per
/// source, states in key order and each state's sources in registry order.
pub fn registry_to_csv(registry: &Registry) -> String {
    let mut buf: Vec<u8> = Vec::new();
    let _ = write_row(&mut buf, &EXPORT_HEADER);
    for source in registry.all_sources() {
        let _ = write_row(&mut buf, &[source.state, source.url, source.category.as_str()]);
    }
    match String::from_utf8(buf) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(&e.into_bytes()).into_owned(),
    }
}

/// Regenerate the export file from the registry. Returns the number of
/// source rows written, header excluded.
pub fn write_registry_csv(registry: &Registry, path: &Path) -> io::Result<usize> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, registry_to_csv(registry))?;
    Ok(registry.total_sources())
}
