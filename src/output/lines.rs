//! Flat line printer

use std::io::{self, Write};

use crate::entry::Entry;
use crate::style::Style;

use super::{render_entry, render_titles};

/// Print one line per entry, annotations indented beneath it.
///
/// `titles` is printed before the entries when `header` is set and after them
/// when `footer` is set.
pub fn write_lines<W: Write>(
    out: &mut W,
    entries: &[Entry],
    titles: Option<&[String]>,
    header: bool,
    footer: bool,
    style: &dyn Style,
) -> io::Result<()> {
    if let (Some(titles), true) = (titles, header) {
        writeln!(out, "{}", render_titles(titles, style))?;
    }
    for entry in entries {
        writeln!(out, "{}", render_entry(entry))?;
        for line in &entry.annotations {
            writeln!(out, "    {line}")?;
        }
    }
    if let (Some(titles), true) = (titles, footer) {
        writeln!(out, "{}", render_titles(titles, style))?;
    }
    Ok(())
}
