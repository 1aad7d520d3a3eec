//! Trailing summary lines

use std::io::{self, Write};
use std::path::PathBuf;

/// `  total 12.5 KB`
pub fn write_total<W: Write>(out: &mut W, total: &str) -> io::Result<()> {
    writeln!(out, "  total {total}")
}

/// List every group of identical files on one line. Nothing is printed when
/// there are no duplicates.
pub fn write_duplicates<W: Write>(out: &mut W, groups: &[Vec<PathBuf>]) -> io::Result<()> {
    if groups.is_empty() {
        return Ok(());
    }
    writeln!(out, "Duplicates:")?;
    for group in groups {
        for path in group {
            write!(out, "    {}", path.display())?;
        }
        writeln!(out)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_line() {
        let mut out = Vec::new();
        write_total(&mut out, "3.0 KB").unwrap();
        assert_eq!(out, b"  total 3.0 KB\n");
    }

    #[test]
    fn test_duplicates_report() {
        let mut out = Vec::new();
        write_duplicates(&mut out, &[]).unwrap();
        assert!(out.is_empty());

        let groups = vec![vec![PathBuf::from("/a"), PathBuf::from("/b")]];
        write_duplicates(&mut out, &groups).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "Duplicates:\n    /a    /b\n");
    }
}
