//! Printers for resolved batches
//!
//! - `lines` - one line per entry, optional header and footer
//! - `tree` - connector-prefixed lines for tree mode
//! - `json` - pretty-printed JSON
//! - `report` - trailing total-size line and duplicates report
//!
//! Printers write to any `io::Write`; they never resolve or align anything.

mod json;
mod lines;
mod report;
mod tree;

pub use json::{JsonListing, write_json};
pub use lines::write_lines;
pub use report::{write_duplicates, write_total};
pub use tree::write_tree;

use crate::entry::Entry;
use crate::style::{Style, StyleKind};

/// Field values of one entry in display order, separated by single spaces.
pub fn render_entry(entry: &Entry) -> String {
    entry
        .fields_by_order()
        .iter()
        .map(|f| f.value.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Already padded titles joined like a data row.
pub fn render_titles(titles: &[String], style: &dyn Style) -> String {
    titles
        .iter()
        .map(|t| style.paint(StyleKind::Header, t))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::Plain;
    use crate::test_utils::MemoryFs;
    use std::path::Path;

    #[test]
    fn test_render_entry_uses_producer_order() {
        let fs = MemoryFs::new();
        fs.add_file("/a", "");
        let mut entry = Entry::from_path(&fs, Path::new("/a")).unwrap();
        entry.set_field("Name", "a".into(), 2);
        entry.set_field("Size", "-".into(), 0);
        entry.set_field("Owner", "root".into(), 1);
        assert_eq!(render_entry(&entry), "- root a");
    }

    #[test]
    fn test_render_titles() {
        let titles = vec!["Size".to_string(), "Name".to_string()];
        assert_eq!(render_titles(&titles, &Plain), "Size Name");
    }
}
