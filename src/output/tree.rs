//! Tree printer

use std::io::{self, Write};

use crate::entry::Entry;
use crate::style::Style;
use crate::tree::{GlyphSet, Tree};

use super::{render_entry, render_titles};

/// Print `tree` in pre-order, each line prefixed with its connectors.
pub fn write_tree<W: Write>(
    out: &mut W,
    entries: &[Entry],
    tree: &Tree,
    glyphs: &GlyphSet,
    titles: Option<&[String]>,
    style: &dyn Style,
) -> io::Result<()> {
    if let Some(titles) = titles {
        writeln!(out, "{}", render_titles(titles, style))?;
    }
    for index in tree.pre_order() {
        let node = tree.node(index);
        let entry = &entries[node.entry];
        writeln!(
            out,
            "{}{}",
            glyphs.prefix(&node.connectors),
            render_entry(entry)
        )?;
        if entry.annotations.is_empty() {
            continue;
        }
        let mut prefix = glyphs.annotation_prefix(&node.connectors);
        if !node.children.is_empty() {
            prefix.push_str(&glyphs.continuation);
        } else {
            prefix.push_str(&glyphs.blank);
        }
        for line in &entry.annotations {
            writeln!(out, "{prefix}{line}")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::Plain;
    use crate::test_utils::MemoryFs;
    use crate::tree::assemble;
    use std::path::{Path, PathBuf};

    #[test]
    fn test_tree_output() {
        let fs = MemoryFs::new();
        fs.add_file("/r/a/c", "");
        fs.add_file("/r/b", "");
        let tagged = [
            ("/r", None, 0),
            ("/r/a", Some("/r"), 1),
            ("/r/a/c", Some("/r/a"), 2),
            ("/r/b", Some("/r"), 1),
        ];
        let entries: Vec<Entry> = tagged
            .iter()
            .map(|(path, parent, depth)| {
                let mut e = Entry::from_path(&fs, Path::new(path))
                    .unwrap()
                    .with_position(parent.map(PathBuf::from), *depth);
                let name = e.name.clone();
                e.set_field("Name", name, 0);
                e
            })
            .collect();
        let tree = assemble(&entries).unwrap();

        let mut out = Vec::new();
        write_tree(&mut out, &entries, &tree, &GlyphSet::rectangle(), None, &Plain).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[1], "├── a");
        assert_eq!(lines[2], "│   └── c");
        assert_eq!(lines[3], "└── b");
    }
}
