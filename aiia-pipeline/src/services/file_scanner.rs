//! Image file scanner
//!
//! Directory discovery for the curation stage:
//! - extension allow-list (case-insensitive), then magic-byte verification
//! - recursive or single-level traversal
//! - symlinks followed; walkdir reports loops as entry errors
//! - one path per underlying file (a link to an image already found is
//!   dropped, the non-link path wins)
//! - deterministic output order (sorted paths)

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

/// Extensions accepted for analysis
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "tif", "tiff", "webp"];

/// Image file scanner errors
#[derive(Debug, Error)]
pub enum ScanError {
    /// Specified path does not exist
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    /// Path exists but is not a directory
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// Cannot access file
    #[error("File access error {0}: {1}")]
    FileAccessError(PathBuf, String),
}

/// Scan result with statistics
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    /// Image paths found, sorted
    pub files: Vec<PathBuf>,
    /// Total size of all files in bytes
    pub total_size: u64,
    /// Count of files by extension (lowercase)
    pub by_format: BTreeMap<String, usize>,
    /// Entries that could not be read during traversal
    pub errors: Vec<String>,
    /// Images reached a second time through a symlink
    pub linked_duplicates: usize,
}

/// Accepted image, keyed by canonical path during a scan
struct Candidate {
    path: PathBuf,
    via_link: bool,
    size: u64,
}

/// Image file scanner
pub struct FileScanner {
    ignore_patterns: Vec<String>,
    recursive: bool,
}

impl FileScanner {
    /// Create a recursive scanner with default ignore patterns
    ///
    /// Ignores system and tooling entries like .DS_Store, Thumbs.db, .git.
    pub fn new() -> Self {
        Self {
            ignore_patterns: vec![
                ".DS_Store".to_string(),
                "Thumbs.db".to_string(),
                ".git".to_string(),
                ".svn".to_string(),
                "@eaDir".to_string(),
                "node_modules".to_string(),
            ],
            recursive: true,
        }
    }

    /// Set whether subdirectories are traversed
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Scan directory for image files
    pub fn scan(&self, root_path: &Path) -> Result<Vec<PathBuf>, ScanError> {
        Ok(self.scan_with_stats(root_path)?.files)
    }

    /// Scan with statistics
    pub fn scan_with_stats(&self, root_path: &Path) -> Result<ScanResult, ScanError> {
        if !root_path.exists() {
            return Err(ScanError::PathNotFound(root_path.to_path_buf()));
        }

        if !root_path.is_dir() {
            return Err(ScanError::NotADirectory(root_path.to_path_buf()));
        }

        let mut result = ScanResult::default();
        let mut candidates: BTreeMap<PathBuf, Candidate> = BTreeMap::new();

        let walker = WalkDir::new(root_path)
            .follow_links(true)
            .max_depth(if self.recursive { usize::MAX } else { 1 })
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| self.should_process_entry(e));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Error accessing entry: {}", e);
                    result.errors.push(e.to_string());
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            match self.is_image_file(path) {
                Ok(true) => {
                    let candidate = Candidate {
                        path: path.to_path_buf(),
                        via_link: entry.path_is_symlink() || is_below_link(root_path, path),
                        size: entry.metadata().map(|m| m.len()).unwrap_or(0),
                    };
                    let key = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

                    match candidates.get_mut(&key) {
                        Some(existing) => {
                            result.linked_duplicates += 1;
                            tracing::debug!(
                                file = %path.display(),
                                same_as = %existing.path.display(),
                                "Image already reached through another path"
                            );
                            if existing.via_link && !candidate.via_link {
                                *existing = candidate;
                            }
                        }
                        None => {
                            candidates.insert(key, candidate);
                        }
                    }
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!("Error verifying {}: {}", path.display(), e);
                    result.errors.push(e.to_string());
                }
            }
        }

        for candidate in candidates.into_values() {
            result.total_size += candidate.size;
            if let Some(ext) = candidate.path.extension() {
                *result
                    .by_format
                    .entry(ext.to_string_lossy().to_lowercase())
                    .or_insert(0) += 1;
            }
            result.files.push(candidate.path);
        }
        result.files.sort();

        tracing::debug!(
            root = %root_path.display(),
            files = result.files.len(),
            total_bytes = result.total_size,
            recursive = self.recursive,
            linked_duplicates = result.linked_duplicates,
            "Image scan complete"
        );

        Ok(result)
    }

    /// Check if entry should be processed
    fn should_process_entry(&self, entry: &DirEntry) -> bool {
        let file_name = entry.file_name().to_string_lossy();

        // The root itself is never filtered
        if entry.depth() > 0 {
            for pattern in &self.ignore_patterns {
                if file_name.contains(pattern.as_str()) {
                    return false;
                }
            }

            // macOS resource forks (._IMG_0001.jpg)
            if file_name.starts_with("._") {
                return false;
            }
        }

        true
    }

    /// Check if file is a supported image
    fn is_image_file(&self, path: &Path) -> Result<bool, ScanError> {
        match path.extension() {
            Some(ext) if is_supported_extension(&ext.to_string_lossy()) => {
                self.verify_magic_bytes(path)
            }
            _ => Ok(false),
        }
    }

    /// Verify file type using magic bytes
    fn verify_magic_bytes(&self, path: &Path) -> Result<bool, ScanError> {
        let mut file = File::open(path)
            .map_err(|e| ScanError::FileAccessError(path.to_path_buf(), e.to_string()))?;

        let mut buffer = [0u8; 12];
        let bytes_read = file
            .read(&mut buffer)
            .map_err(|e| ScanError::FileAccessError(path.to_path_buf(), e.to_string()))?;

        if bytes_read < 4 {
            return Ok(false);
        }

        let is_image = match &buffer[..bytes_read] {
            // JPEG
            [0xFF, 0xD8, 0xFF, ..] => true,

            // PNG
            [0x89, b'P', b'N', b'G', ..] => true,

            // TIFF (little / big endian)
            [b'I', b'I', 0x2A, 0x00, ..] | [b'M', b'M', 0x00, 0x2A, ..] => true,

            // WEBP
            [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P'] => true,

            _ => false,
        };

        Ok(is_image)
    }
}

impl Default for FileScanner {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether any directory between `root` and `path` is a symlink
fn is_below_link(root: &Path, path: &Path) -> bool {
    path.ancestors()
        .skip(1)
        .take_while(|dir| *dir != root)
        .any(|dir| dir.symlink_metadata().map(|m| m.file_type().is_symlink()).unwrap_or(false))
}

/// Case-insensitive extension check against the allow-list
pub fn is_supported_extension(ext: &str) -> bool {
    let lower = ext.to_ascii_lowercase();
    SUPPORTED_EXTENSIONS.contains(&lower.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const JPEG_HEADER: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10, b'J', b'F', b'I', b'F', 0, 1];
    const PNG_HEADER: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn test_image_extension_detection() {
        assert!(is_supported_extension("jpg"));
        assert!(is_supported_extension("JPEG"));
        assert!(is_supported_extension("Tif"));
        assert!(!is_supported_extension("txt"));
        assert!(!is_supported_extension("mp3"));
    }

    #[test]
    fn test_scan_nonexistent_path() {
        let scanner = FileScanner::new();
        let result = scanner.scan(Path::new("/nonexistent/path"));
        assert!(matches!(result, Err(ScanError::PathNotFound(_))));
    }

    #[test]
    fn test_scan_file_as_directory() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.jpg");
        fs::write(&file, JPEG_HEADER).unwrap();

        let result = FileScanner::new().scan(&file);
        assert!(matches!(result, Err(ScanError::NotADirectory(_))));
    }

    #[test]
    fn test_scan_empty_directory() {
        let dir = TempDir::new().unwrap();
        let result = FileScanner::new().scan(dir.path()).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_uppercase_extension_and_magic_bytes() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("IMG_0001.JPG"), JPEG_HEADER).unwrap();
        fs::write(dir.path().join("chart.png"), PNG_HEADER).unwrap();
        // Right extension, wrong content
        fs::write(dir.path().join("fake.jpg"), b"not an image at all").unwrap();
        fs::write(dir.path().join("notes.txt"), b"hello").unwrap();

        let files = FileScanner::new().scan(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["IMG_0001.JPG", "chart.png"]);
    }

    #[test]
    fn test_recursive_flag() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("top.jpg"), JPEG_HEADER).unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("deep.jpg"), JPEG_HEADER).unwrap();

        let all = FileScanner::new().scan(dir.path()).unwrap();
        assert_eq!(all.len(), 2);

        let top_only = FileScanner::new().recursive(false).scan(dir.path()).unwrap();
        assert_eq!(top_only.len(), 1);
        assert!(top_only[0].ends_with("top.jpg"));
    }

    #[test]
    fn test_ignored_entries() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        fs::write(dir.path().join(".git").join("x.jpg"), JPEG_HEADER).unwrap();
        fs::write(dir.path().join("._resource.jpg"), JPEG_HEADER).unwrap();
        fs::write(dir.path().join("keep.jpg"), JPEG_HEADER).unwrap();

        let files = FileScanner::new().scan(dir.path()).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("keep.jpg"));
    }

    #[test]
    fn test_scan_with_stats_counts_formats() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.jpg"), JPEG_HEADER).unwrap();
        fs::write(dir.path().join("b.JPG"), JPEG_HEADER).unwrap();
        fs::write(dir.path().join("c.png"), PNG_HEADER).unwrap();

        let stats = FileScanner::new().scan_with_stats(dir.path()).unwrap();
        assert_eq!(stats.files.len(), 3);
        assert_eq!(stats.by_format.get("jpg"), Some(&2));
        assert_eq!(stats.by_format.get("png"), Some(&1));
        assert_eq!(stats.total_size, (JPEG_HEADER.len() * 2 + PNG_HEADER.len()) as u64);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_image_outside_root_is_found() {
        use std::os::unix::fs::symlink;

        let library = TempDir::new().unwrap();
        let elsewhere = TempDir::new().unwrap();
        fs::write(library.path().join("plain.jpg"), JPEG_HEADER).unwrap();
        fs::write(elsewhere.path().join("real.jpg"), JPEG_HEADER).unwrap();
        symlink(elsewhere.path().join("real.jpg"), library.path().join("linked.jpg")).unwrap();

        let files = FileScanner::new().scan(library.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["linked.jpg", "plain.jpg"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_directory_is_traversed() {
        use std::os::unix::fs::symlink;

        let library = TempDir::new().unwrap();
        let archive = TempDir::new().unwrap();
        fs::write(archive.path().join("old.png"), PNG_HEADER).unwrap();
        symlink(archive.path(), library.path().join("archive")).unwrap();

        let files = FileScanner::new().scan(library.path()).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("archive/old.png"));
    }

    #[cfg(unix)]
    #[test]
    fn test_link_to_image_in_tree_counted_once() {
        use std::os::unix::fs::symlink;

        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("photo.jpg"), JPEG_HEADER).unwrap();
        // Sorts before the real file
        symlink(dir.path().join("photo.jpg"), dir.path().join("alias.jpg")).unwrap();

        let stats = FileScanner::new().scan_with_stats(dir.path()).unwrap();
        assert_eq!(stats.files, vec![dir.path().join("photo.jpg")]);
        assert_eq!(stats.linked_duplicates, 1);
        assert_eq!(stats.total_size, JPEG_HEADER.len() as u64);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_loop_terminates() {
        use std::os::unix::fs::symlink;

        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub").join("a.jpg"), JPEG_HEADER).unwrap();
        symlink(dir.path(), dir.path().join("sub").join("loop")).unwrap();

        let stats = FileScanner::new().scan_with_stats(dir.path()).unwrap();
        assert_eq!(stats.files, vec![dir.path().join("sub").join("a.jpg")]);
        assert!(!stats.errors.is_empty());
    }
}
