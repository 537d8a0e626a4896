use std::fs;
use std::path::{Path, PathBuf};

use crate::schema::TableSchema;

/// Find a source file in `dir`, ignoring case
pub fn locate_source(dir: &Path, file_name: &str) -> Option<PathBuf> {
    let exact = dir.join(file_name);
    if exact.is_file() {
        return Some(exact);
    }

    fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .find(|path| {
            path.is_file()
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.eq_ignore_ascii_case(file_name))
        })
}

/// Source files of `tables` that are not present in `dir`
pub fn missing_sources(dir: &Path, tables: &[&TableSchema]) -> Vec<&'static str> {
    tables
        .iter()
        .filter(|t| locate_source(dir, t.source_file).is_none())
        .map(|t| t.source_file)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::tables::{ACFTREF, ENGINE};
    use tempfile::TempDir;

    #[test]
    fn test_locate_source_ignores_case() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("acftref.TXT"), "").unwrap();

        let found = locate_source(dir.path(), "ACFTREF.txt").unwrap();
        assert_eq!(found.file_name().unwrap(), "acftref.TXT");
    }

    #[test]
    fn test_missing_sources_lists_absent_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("ENGINE.txt"), "").unwrap();

        assert_eq!(missing_sources(dir.path(), &[&ACFTREF, &ENGINE]), vec!["ACFTREF.txt"]);
        assert_eq!(
            missing_sources(&dir.path().join("absent"), &[&ENGINE]),
            vec!["ENGINE.txt"]
        );
    }
}
