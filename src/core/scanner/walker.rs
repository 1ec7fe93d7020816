//! Directory walking implementation using walkdir.

use super::filter::{is_hidden, ImageFilter};
use super::{ImageScanner, ScanResult, SkippedEntry};
use crate::error::ScanError;
use crate::events::{Event, EventSender, ScanEvent, ScanProgress};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Configuration for the directory scanner
#[derive(Debug, Clone, Default)]
pub struct ScanConfig {
    /// Whether to follow symbolic links
    pub follow_symlinks: bool,
    /// Whether to include hidden files and directories
    pub include_hidden: bool,
    /// Maximum directory depth (None = unlimited)
    pub max_depth: Option<usize>,
    /// Custom extensions to include (None = use defaults)
    pub extensions: Option<Vec<String>>,
}

/// Scanner implementation using the walkdir crate
pub struct WalkDirScanner {
    config: ScanConfig,
    filter: ImageFilter,
}

impl WalkDirScanner {
    /// Create a new scanner with the given configuration
    pub fn new(config: ScanConfig) -> Self {
        let mut filter = ImageFilter::new().with_hidden(config.include_hidden);

        if let Some(ref extensions) = config.extensions {
            filter = filter.with_extensions(extensions.clone());
        }

        Self { config, filter }
    }

    /// Resolve the root to an absolute directory, or fail
    fn resolve_root(root: &Path) -> Result<PathBuf, ScanError> {
        let metadata = fs::metadata(root).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ScanError::DirectoryNotFound {
                path: root.to_path_buf(),
            },
            _ => ScanError::ReadDirectory {
                path: root.to_path_buf(),
                source: e,
            },
        })?;

        if !metadata.is_dir() {
            return Err(ScanError::NotADirectory {
                path: root.to_path_buf(),
            });
        }

        let canonical = fs::canonicalize(root).map_err(|e| ScanError::ReadDirectory {
            path: root.to_path_buf(),
            source: e,
        })?;

        // The root itself must be listable; deeper failures are only skipped
        fs::read_dir(&canonical).map_err(|e| ScanError::ReadDirectory {
            path: canonical.clone(),
            source: e,
        })?;

        Ok(canonical)
    }
}

impl ImageScanner for WalkDirScanner {
    fn scan(&self, root: &Path) -> Result<ScanResult, ScanError> {
        self.scan_with_events(root, &crate::events::null_sender())
    }

    fn scan_with_events(&self, root: &Path, events: &EventSender) -> Result<ScanResult, ScanError> {
        let root = Self::resolve_root(root)?;
        events.send(Event::Scan(ScanEvent::Started { root: root.clone() }));

        let mut images = Vec::new();
        let mut skipped = Vec::new();
        let mut directories_scanned = 0;

        let mut walker = WalkDir::new(&root).follow_links(self.config.follow_symlinks);
        if let Some(depth) = self.config.max_depth {
            walker = walker.max_depth(depth);
        }

        let include_hidden = self.filter.includes_hidden();
        let entries = walker
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || include_hidden || !is_hidden(entry.path()));

        for entry_result in entries {
            let entry = match entry_result {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().map(|p| p.to_path_buf()).unwrap_or_default();
                    let message = e.to_string();
                    tracing::warn!("Skipping unreadable entry {}: {}", path.display(), message);

                    events.send(Event::Scan(ScanEvent::Error {
                        path: path.clone(),
                        message: message.clone(),
                    }));
                    skipped.push(SkippedEntry { path, message });
                    continue;
                }
            };

            let path = entry.path();

            if entry.file_type().is_dir() {
                directories_scanned += 1;
                events.send(Event::Scan(ScanEvent::Progress(ScanProgress {
                    directories_scanned,
                    images_found: images.len(),
                    current_path: path.to_path_buf(),
                })));
                continue;
            }

            if self.filter.should_include(path) {
                images.push(path.to_path_buf());
            }
        }

        images.sort();
        images.dedup();

        tracing::info!(
            "Found {} candidate images under {} ({} directories)",
            images.len(),
            root.display(),
            directories_scanned
        );
        events.send(Event::Scan(ScanEvent::Completed {
            total_images: images.len(),
        }));

        Ok(ScanResult {
            root,
            images,
            skipped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    fn create_test_photo(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        // Write minimal JPEG header
        file.write_all(&[0xFF, 0xD8, 0xFF, 0xE0]).unwrap();
        path
    }

    #[test]
    fn scan_empty_directory_returns_empty_vec() {
        let temp_dir = TempDir::new().unwrap();
        let scanner = WalkDirScanner::new(ScanConfig::default());

        let result = scanner.scan(temp_dir.path()).unwrap();

        assert!(result.images.is_empty());
        assert!(result.skipped.is_empty());
    }

    #[test]
    fn scan_returns_sorted_absolute_paths() {
        let temp_dir = TempDir::new().unwrap();
        create_test_photo(temp_dir.path(), "c.jpg");
        create_test_photo(temp_dir.path(), "a.png");
        create_test_photo(temp_dir.path(), "b.webp");

        let scanner = WalkDirScanner::new(ScanConfig::default());
        let result = scanner.scan(temp_dir.path()).unwrap();

        assert_eq!(result.images.len(), 3);
        assert!(result.images.iter().all(|p| p.is_absolute()));
        let mut sorted = result.images.clone();
        sorted.sort();
        assert_eq!(result.images, sorted);
        assert!(result.images[0].ends_with("a.png"));
    }

    #[test]
    fn scan_excludes_non_image_files() {
        let temp_dir = TempDir::new().unwrap();
        create_test_photo(temp_dir.path(), "photo.jpg");
        File::create(temp_dir.path().join("document.txt")).unwrap();
        File::create(temp_dir.path().join("document.pdf")).unwrap();

        let scanner = WalkDirScanner::new(ScanConfig::default());
        let result = scanner.scan(temp_dir.path()).unwrap();

        assert_eq!(result.images.len(), 1);
        assert!(result.images[0].ends_with("photo.jpg"));
    }

    #[test]
    fn scan_traverses_nested_directories() {
        let temp_dir = TempDir::new().unwrap();
        let subdir = temp_dir.path().join("subdir");
        fs::create_dir(&subdir).unwrap();

        create_test_photo(temp_dir.path(), "root.jpg");
        create_test_photo(&subdir, "nested.jpg");

        let scanner = WalkDirScanner::new(ScanConfig::default());
        let result = scanner.scan(temp_dir.path()).unwrap();

        assert_eq!(result.images.len(), 2);
    }

    #[test]
    fn scan_skips_hidden_files_and_directories_by_default() {
        let temp_dir = TempDir::new().unwrap();
        create_test_photo(temp_dir.path(), "visible.jpg");
        create_test_photo(temp_dir.path(), ".hidden.jpg");
        let hidden_dir = temp_dir.path().join(".thumbnails");
        fs::create_dir(&hidden_dir).unwrap();
        create_test_photo(&hidden_dir, "thumb.jpg");

        let scanner = WalkDirScanner::new(ScanConfig::default());
        let result = scanner.scan(temp_dir.path()).unwrap();
        assert_eq!(result.images.len(), 1);
        assert!(result.images[0].ends_with("visible.jpg"));

        let scanner = WalkDirScanner::new(ScanConfig {
            include_hidden: true,
            ..Default::default()
        });
        assert_eq!(scanner.scan(temp_dir.path()).unwrap().images.len(), 3);
    }

    #[test]
    fn scan_nonexistent_directory_is_fatal() {
        let scanner = WalkDirScanner::new(ScanConfig::default());
        let result = scanner.scan(Path::new("/nonexistent/path/12345"));

        assert!(matches!(result, Err(ScanError::DirectoryNotFound { .. })));
    }

    #[test]
    fn scan_of_a_file_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let file = create_test_photo(temp_dir.path(), "photo.jpg");

        let scanner = WalkDirScanner::new(ScanConfig::default());
        assert!(matches!(
            scanner.scan(&file),
            Err(ScanError::NotADirectory { .. })
        ));
    }

    #[test]
    fn scan_reports_progress_events() {
        let temp_dir = TempDir::new().unwrap();
        create_test_photo(temp_dir.path(), "photo.jpg");

        let (sender, receiver) = crate::events::EventChannel::new();
        WalkDirScanner::new(ScanConfig::default())
            .scan_with_events(temp_dir.path(), &sender)
            .unwrap();
        drop(sender);

        let events: Vec<Event> = receiver.iter().collect();
        assert!(matches!(events.first(), Some(Event::Scan(ScanEvent::Started { .. }))));
        assert!(matches!(
            events.last(),
            Some(Event::Scan(ScanEvent::Completed { total_images: 1 }))
        ));
    }
}
