//! Sorted, single-level directory listing using walkdir.
//!
//! Identity labels and image order both come from this listing, so entries
//! are always returned in lexicographic file-name order regardless of what
//! order the filesystem enumerates them in.

use super::filter::ImageFilter;
use crate::error::LoadError;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Which kind of entry to keep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File,
}

/// List the immediate children of `dir` of the given kind, sorted by name.
///
/// Hidden entries are dropped when the filter says so.
pub fn list_entries(
    dir: &Path,
    kind: EntryKind,
    filter: &ImageFilter,
) -> Result<Vec<PathBuf>, LoadError> {
    let mut entries = list_all_entries(dir, kind)?;
    if filter.skips_hidden() {
        entries.retain(|path| !ImageFilter::is_hidden(path));
    }
    Ok(entries)
}

/// Like [`list_entries`] but keeps hidden entries, for callers that report
/// what they skip. Symlinks are followed so linked identity folders work.
pub fn list_all_entries(dir: &Path, kind: EntryKind) -> Result<Vec<PathBuf>, LoadError> {
    if !dir.is_dir() {
        return Err(LoadError::DirectoryNotFound {
            path: dir.to_path_buf(),
        });
    }

    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name();

    let mut entries = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| dir.to_path_buf());
            let source = e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("filesystem loop detected"));
            LoadError::ReadDirectory { path, source }
        })?;

        let matches = match kind {
            EntryKind::Directory => entry.file_type().is_dir(),
            EntryKind::File => entry.file_type().is_file(),
        };
        if matches {
            entries.push(entry.into_path());
        }
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn lists_directories_sorted() {
        let temp_dir = TempDir::new().unwrap();
        for name in ["zoe", "Brad", "angelina"] {
            fs::create_dir(temp_dir.path().join(name)).unwrap();
        }
        fs::write(temp_dir.path().join("readme.txt"), b"x").unwrap();

        let dirs = list_entries(temp_dir.path(), EntryKind::Directory, &ImageFilter::new()).unwrap();
        let names: Vec<_> = dirs
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();

        assert_eq!(names, vec!["Brad", "angelina", "zoe"]);
    }

    #[test]
    fn lists_files_only() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir(temp_dir.path().join("nested")).unwrap();
        fs::write(temp_dir.path().join("b.png"), b"x").unwrap();
        fs::write(temp_dir.path().join("a.png"), b"x").unwrap();

        let files = list_entries(temp_dir.path(), EntryKind::File, &ImageFilter::new()).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("a.png"));
        assert!(files[1].ends_with("b.png"));
    }

    #[test]
    fn skips_hidden_directories() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir(temp_dir.path().join(".git")).unwrap();
        fs::create_dir(temp_dir.path().join("Brad")).unwrap();

        let dirs = list_entries(temp_dir.path(), EntryKind::Directory, &ImageFilter::new()).unwrap();
        assert_eq!(dirs.len(), 1);
    }

    #[test]
    fn unfiltered_listing_keeps_hidden_files() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(".hidden.png"), b"x").unwrap();
        fs::write(temp_dir.path().join("a.png"), b"x").unwrap();

        let all = list_all_entries(temp_dir.path(), EntryKind::File).unwrap();
        assert_eq!(all.len(), 2);
        assert!(all[0].ends_with(".hidden.png"));

        let visible = list_entries(temp_dir.path(), EntryKind::File, &ImageFilter::new()).unwrap();
        assert_eq!(visible.len(), 1);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let result = list_entries(
            Path::new("/nonexistent/people/12345"),
            EntryKind::Directory,
            &ImageFilter::new(),
        );
        assert!(matches!(result, Err(LoadError::DirectoryNotFound { .. })));
    }
}
