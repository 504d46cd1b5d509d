//! Reference images with the names they answer to.

use crate::core::dataset::PairDataset;
use crate::core::loader::FaceImage;
use crate::error::MatchError;
use serde::{Deserialize, Serialize};

/// Which training images make up the gallery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GalleryMode {
    /// Every training image, labeled with its identity's name
    #[default]
    AllImages,
    /// The first image of each identity
    Representatives,
}

/// A named reference image
#[derive(Debug, Clone)]
pub struct GalleryEntry {
    pub name: String,
    pub image: FaceImage,
}

/// Ordered reference images a probe is matched against
#[derive(Debug, Clone, Default)]
pub struct Gallery {
    entries: Vec<GalleryEntry>,
}

impl Gallery {
    pub fn new(entries: Vec<GalleryEntry>) -> Self {
        Self { entries }
    }

    /// Build from a dataset according to `mode`.
    ///
    /// `names` overrides the directory names and must have one entry per
    /// identity.
    pub fn from_dataset(
        dataset: &PairDataset,
        names: Option<&[String]>,
        mode: GalleryMode,
    ) -> Result<Self, MatchError> {
        let names = resolve_names(dataset, names)?;
        let mut entries = Vec::new();
        let mut last_label = None;

        for (image, &label) in dataset.images().iter().zip(dataset.labels()) {
            let first_of_identity = last_label != Some(label);
            last_label = Some(label);

            if mode == GalleryMode::Representatives && !first_of_identity {
                continue;
            }
            entries.push(GalleryEntry {
                name: names[label].clone(),
                image: image.clone(),
            });
        }

        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[GalleryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Display name per identity label
pub fn resolve_names(
    dataset: &PairDataset,
    names: Option<&[String]>,
) -> Result<Vec<String>, MatchError> {
    let identities = dataset.identities();
    match names {
        Some(names) if names.len() != identities.len() => Err(MatchError::NameCountMismatch {
            names: names.len(),
            identities: identities.len(),
        }),
        Some(names) => Ok(names.to_vec()),
        None => Ok(identities.iter().map(|i| i.name.clone()).collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::loader::AxisOrder;

    fn face(tag: &str) -> FaceImage {
        FaceImage::from_pixels(tag, 1, AxisOrder::Transposed, vec![0.0; 3]).unwrap()
    }

    fn dataset() -> PairDataset {
        PairDataset::from_identities(vec![
            ("Angelina".to_string(), vec![face("a1"), face("a2")]),
            ("Brad".to_string(), vec![face("b1")]),
        ])
    }

    #[test]
    fn all_images_mode_labels_every_image() {
        let gallery = Gallery::from_dataset(&dataset(), None, GalleryMode::AllImages).unwrap();
        let names: Vec<_> = gallery.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Angelina", "Angelina", "Brad"]);
    }

    #[test]
    fn representatives_mode_keeps_first_image() {
        let gallery =
            Gallery::from_dataset(&dataset(), None, GalleryMode::Representatives).unwrap();
        assert_eq!(gallery.len(), 2);
        assert_eq!(gallery.entries()[0].image.path().to_str(), Some("a1"));
        assert_eq!(gallery.entries()[1].name, "Brad");
    }

    #[test]
    fn names_override_directory_names() {
        let names = vec!["Jolie".to_string(), "Pitt".to_string()];
        let gallery =
            Gallery::from_dataset(&dataset(), Some(&names), GalleryMode::Representatives).unwrap();
        assert_eq!(gallery.entries()[1].name, "Pitt");
    }

    #[test]
    fn name_count_must_match_identities() {
        let names = vec!["Angelina".to_string()];
        let result = Gallery::from_dataset(&dataset(), Some(&names), GalleryMode::AllImages);
        assert_eq!(
            result.unwrap_err(),
            MatchError::NameCountMismatch {
                names: 1,
                identities: 2
            }
        );
    }

    #[test]
    fn empty_dataset_gives_empty_gallery() {
        let gallery =
            Gallery::from_dataset(&PairDataset::default(), None, GalleryMode::AllImages).unwrap();
        assert!(gallery.is_empty());
    }
}
