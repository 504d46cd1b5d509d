//! Decides which directory entries are loadable face images.

use std::collections::HashSet;
use std::path::Path;

/// Filters directory entries down to decodable image files
#[derive(Debug, Clone)]
pub struct ImageFilter {
    /// Lowercase file extensions to accept
    extensions: HashSet<String>,
    /// Whether entries starting with '.' are considered
    include_hidden: bool,
}

impl ImageFilter {
    /// Create a filter accepting every format the `image` crate decodes by default
    pub fn new() -> Self {
        Self {
            extensions: ["jpg", "jpeg", "png", "webp", "gif", "bmp", "tiff", "tif"]
                .iter()
                .map(|e| e.to_string())
                .collect(),
            include_hidden: false,
        }
    }

    /// Include hidden files (starting with .)
    pub fn with_hidden(mut self, include: bool) -> Self {
        self.include_hidden = include;
        self
    }

    /// Whether `path` names a hidden entry
    pub fn is_hidden(path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| name.starts_with('.'))
    }

    /// Whether hidden entries should be skipped
    pub fn skips_hidden(&self) -> bool {
        !self.include_hidden
    }

    /// Check if a file should be loaded
    pub fn should_include(&self, path: &Path) -> bool {
        if !self.include_hidden && Self::is_hidden(path) {
            return false;
        }

        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions.contains(&ext.to_lowercase()))
    }
}

impl Default for ImageFilter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_includes_common_formats() {
        let filter = ImageFilter::new();
        assert!(filter.should_include(Path::new("/people/Brad/1.jpg")));
        assert!(filter.should_include(Path::new("/people/Brad/2.JPEG")));
        assert!(filter.should_include(Path::new("/people/Brad/3.png")));
    }

    #[test]
    fn filter_excludes_non_images() {
        let filter = ImageFilter::new();
        assert!(!filter.should_include(Path::new("/people/Brad/notes.txt")));
        assert!(!filter.should_include(Path::new("/people/Brad/no_extension")));
    }

    #[test]
    fn filter_excludes_hidden_by_default() {
        let filter = ImageFilter::new();
        assert!(!filter.should_include(Path::new("/people/Brad/.thumb.jpg")));
        assert!(filter.skips_hidden());
    }

    #[test]
    fn filter_can_include_hidden() {
        let filter = ImageFilter::new().with_hidden(true);
        assert!(filter.should_include(Path::new("/people/Brad/.thumb.jpg")));
    }
}
