use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use zip::ZipArchive;

use crate::error::{BoxError, RegistryError, Result};
use crate::ui::Ui;

/// Extract every file in a zip archive into `dest_dir`, flattening directory
/// prefixes and overwriting earlier extracts. Returns the written paths.
pub fn extract_zip(zip_path: &Path, dest_dir: &Path, ui: &mut dyn Ui) -> Result<Vec<PathBuf>> {
    let extract_error = |message: String, source: Option<BoxError>| RegistryError::Extract {
        path: zip_path.to_path_buf(),
        message,
        source,
    };

    let file = File::open(zip_path)
        .map_err(|e| extract_error("cannot open archive".into(), Some(e.into())))?;
    let mut archive = ZipArchive::new(BufReader::new(file))
        .map_err(|e| extract_error("corrupt or incomplete archive".into(), Some(e.into())))?;

    fs::create_dir_all(dest_dir).map_err(|e| {
        extract_error(format!("cannot create {:?}", dest_dir), Some(e.into()))
    })?;

    let total_files = archive.len();
    let mut written = Vec::with_capacity(total_files);
    info!(archive = %zip_path.display(), members = total_files, "Extracting archive");

    for i in 0..total_files {
        let mut member = archive
            .by_index(i)
            .map_err(|e| extract_error(format!("cannot read member #{}", i), Some(e.into())))?;

        if member.is_dir() {
            continue;
        }

        // Reject absolute paths and `..` components, then drop the directory
        let Some(file_name) = member
            .enclosed_name()
            .and_then(|p| p.file_name().map(|n| n.to_os_string()))
        else {
            warn!(member = member.name(), "Skipping archive member with unsafe path");
            continue;
        };

        let dest_path = dest_dir.join(&file_name);
        let mut dest_file = File::create(&dest_path).map_err(|e| {
            extract_error(format!("cannot create {:?}", dest_path), Some(e.into()))
        })?;

        io::copy(&mut member, &mut dest_file).map_err(|e| {
            extract_error(format!("failed to extract {}", member.name()), Some(e.into()))
        })?;

        debug!(file = %dest_path.display(), "Extracted");
        written.push(dest_path);
        ui.set_progress(i as u64 + 1, total_files as u64, "Extracting");
    }

    ui.clear_progress();
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::SilentUi;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn write_zip(path: &Path, members: &[(&str, &str)]) {
        let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
        for (name, body) in members {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn test_extract_flattens_and_overwrites() {
        let dir = TempDir::new().unwrap();
        let zip_path = dir.path().join("registry.zip");
        let out = dir.path().join("out");
        write_zip(&zip_path, &[("nested/ENGINE.txt", "CODE,MFR\n"), ("ACFTREF.txt", "x")]);

        fs::create_dir_all(&out).unwrap();
        fs::write(out.join("ENGINE.txt"), "stale").unwrap();

        let written = extract_zip(&zip_path, &out, &mut SilentUi::new()).unwrap();
        assert_eq!(written.len(), 2);
        assert_eq!(fs::read_to_string(out.join("ENGINE.txt")).unwrap(), "CODE,MFR\n");
        assert!(out.join("ACFTREF.txt").exists());
    }

    #[test]
    fn test_corrupt_archive_is_extract_error() {
        let dir = TempDir::new().unwrap();
        let zip_path = dir.path().join("broken.zip");
        fs::write(&zip_path, b"PK\x03\x04 definitely not a zip").unwrap();

        let err = extract_zip(&zip_path, &dir.path().join("out"), &mut SilentUi::new()).unwrap_err();
        assert!(matches!(err, RegistryError::Extract { .. }));
    }

    #[test]
    fn test_missing_archive_is_extract_error() {
        let dir = TempDir::new().unwrap();
        let err = extract_zip(&dir.path().join("none.zip"), dir.path(), &mut SilentUi::new())
            .unwrap_err();
        assert!(matches!(err, RegistryError::Extract { .. }));
    }
}
