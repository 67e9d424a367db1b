// 🔍 Directory scan and file fingerprints for the ingest flow

use crate::error::{PipelineError, PipelineResult};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::warn;

const IMPORTABLE_EXTENSIONS: [&str; 2] = ["csv", "json"];

fn is_importable(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            IMPORTABLE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

/// Absolute paths of the `.csv` / `.json` files directly inside `dir`, sorted.
/// A missing or unreadable directory yields an empty list.
pub fn scan_directory(dir: &Path) -> Vec<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            warn!(path = %dir.display(), error = %err, "cannot scan directory");
            return Vec::new();
        }
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_importable(path))
        .map(|path| fs::canonicalize(&path).unwrap_or(path))
        .collect();

    files.sort();
    files
}

/// SHA-256 of the file contents, lowercase hex
pub fn file_fingerprint(path: &Path) -> PipelineResult<String> {
    let mut file = fs::File::open(path).map_err(|e| PipelineError::io(path, e))?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let read = file.read(&mut buffer).map_err(|e| PipelineError::io(path, e))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_scan_lists_only_importable_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b_measurements.csv"), "id\n").unwrap();
        fs::write(dir.path().join("a_batch.JSON"), "{}").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignore").unwrap();
        fs::write(dir.path().join("image.png"), "ignore").unwrap();
        fs::create_dir(dir.path().join("nested.csv")).unwrap();

        let found = scan_directory(dir.path());

        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|p| p.is_absolute()));
        assert!(found[0].ends_with("a_batch.JSON"));
        assert!(found[1].ends_with("b_measurements.csv"));
    }

    #[test]
    fn test_scan_missing_directory_is_empty() {
        assert!(scan_directory(Path::new("/no/such/directory")).is_empty());
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.csv");
        let b = dir.path().join("b.csv");
        fs::write(&a, "id,model,resolution,scale\n").unwrap();
        fs::write(&b, "id,model,resolution,scale\n").unwrap();

        let fa = file_fingerprint(&a).unwrap();
        assert_eq!(fa.len(), 64);
        assert_eq!(fa, file_fingerprint(&b).unwrap());

        fs::write(&b, "id,model,resolution,scale\nMIC_1,Zeiss,10x10,1\n").unwrap();
        assert_ne!(fa, file_fingerprint(&b).unwrap());
        assert!(file_fingerprint(&dir.path().join("missing.csv")).is_err());
    }
}
