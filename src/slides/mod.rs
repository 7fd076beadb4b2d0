//! Slide decks: exactly 20 page images with known dimensions.
//!
//! Rasterising a presentation into images happens elsewhere; a deck is read
//! from a directory of images sorted by file name, numbers by value.

use image::DynamicImage;
use std::cmp::Ordering;
use std::iter::Peekable;
use std::path::{Path, PathBuf};
use std::str::Chars;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::timer::TOTAL_SLIDES;

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "webp"];

#[derive(Debug, Error)]
pub enum DeckError {
    #[error("failed to read deck directory {path:?}: {source}")]
    Unreadable {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("a deck needs exactly {expected} slides, found {found}")]
    WrongCount { expected: usize, found: usize },
    #[error("failed to read slide {path:?}: {message}")]
    Image { path: PathBuf, message: String },
}

/// Where a slide's encoded image lives.
#[derive(Debug, Clone)]
pub enum SlideSource {
    File(PathBuf),
    Encoded(Arc<[u8]>),
}

#[derive(Debug, Clone)]
pub struct Slide {
    pub page_number: u32,
    pub source: SlideSource,
    pub width: u32,
    pub height: u32,
}

impl Slide {
    pub fn from_file(page_number: u32, path: PathBuf) -> Result<Self, DeckError> {
        let (width, height) = image::image_dimensions(&path).map_err(|e| DeckError::Image {
            path: path.clone(),
            message: e.to_string(),
        })?;
        Ok(Self {
            page_number,
            source: SlideSource::File(path),
            width,
            height,
        })
    }

    pub fn from_encoded(page_number: u32, bytes: impl Into<Arc<[u8]>>, width: u32, height: u32) -> Self {
        Self {
            page_number,
            source: SlideSource::Encoded(bytes.into()),
            width,
            height,
        }
    }

    /// Decode the slide image. Called on every full redraw.
    pub fn decode(&self) -> image::ImageResult<DynamicImage> {
        match &self.source {
            SlideSource::File(path) => image::open(path),
            SlideSource::Encoded(bytes) => image::load_from_memory(bytes),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Deck {
    slides: Vec<Slide>,
}

impl Deck {
    pub fn new(slides: Vec<Slide>) -> Result<Self, DeckError> {
        if slides.len() != TOTAL_SLIDES {
            return Err(DeckError::WrongCount {
                expected: TOTAL_SLIDES,
                found: slides.len(),
            });
        }
        Ok(Self { slides })
    }

    pub fn slides(&self) -> &[Slide] {
        &self.slides
    }

    pub fn get(&self, index: usize) -> Option<&Slide> {
        self.slides.get(index)
    }

    /// Load a deck from a directory of page images, ordered by file name with
    /// digit runs compared by value (`Slide2` before `Slide10`).
    pub fn load_dir(dir: &Path) -> Result<Self, DeckError> {
        let paths = sorted_image_paths(dir)?;
        info!("Loading deck of {} images from {:?}", paths.len(), dir);

        let slides = paths
            .into_iter()
            .enumerate()
            .map(|(index, path)| Slide::from_file(index as u32 + 1, path))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(slides)
    }
}

fn sorted_image_paths(dir: &Path) -> Result<Vec<PathBuf>, DeckError> {
    let unreadable = |source| DeckError::Unreadable {
        path: dir.to_path_buf(),
        source,
    };

    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(unreadable)? {
        let path = entry.map_err(unreadable)?.path();
        if !path.is_file() {
            continue;
        }
        let is_image = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()));
        if is_image {
            paths.push(path);
        } else {
            debug!("Skipping non-image file {:?}", path);
        }
    }
    paths.sort_by(|a, b| natural_cmp(&file_name(a), &file_name(b)));
    Ok(paths)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Compare names with runs of ASCII digits ordered by numeric value.
fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut a = a.chars().peekable();
    let mut b = b.chars().peekable();
    loop {
        match (a.peek().copied(), b.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let left = take_digits(&mut a);
                let right = take_digits(&mut b);
                let ordering = left
                    .trim_start_matches('0')
                    .len()
                    .cmp(&right.trim_start_matches('0').len())
                    .then_with(|| left.trim_start_matches('0').cmp(right.trim_start_matches('0')))
                    .then_with(|| left.len().cmp(&right.len()));
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            (Some(x), Some(y)) => {
                if x != y {
                    return x.cmp(&y);
                }
                a.next();
                b.next();
            }
        }
    }
}

fn take_digits(chars: &mut Peekable<Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(c) = chars.next_if(char::is_ascii_digit) {
        digits.push(c);
    }
    digits
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = RgbaImage::from_pixel(width, height, Rgba([10, 20, 30, 255]));
        let mut out = Cursor::new(Vec::new());
        image.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_deck_requires_twenty_slides() {
        let slides = vec![Slide::from_encoded(1, png_bytes(4, 4), 4, 4); 19];
        match Deck::new(slides) {
            Err(DeckError::WrongCount { expected, found }) => {
                assert_eq!(expected, 20);
                assert_eq!(found, 19);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_load_dir_sorts_and_skips_non_images() {
        let dir = tempfile::tempdir().unwrap();
        for i in (1..=20).rev() {
            std::fs::write(dir.path().join(format!("page-{i:02}.png")), png_bytes(8, 6)).unwrap();
        }
        std::fs::write(dir.path().join("notes.txt"), "speaker notes").unwrap();

        let deck = Deck::load_dir(dir.path()).unwrap();
        assert_eq!(deck.slides().len(), 20);
        let first = deck.get(0).unwrap();
        assert_eq!(first.page_number, 1);
        assert_eq!(first.width, 8);
        assert_eq!(first.height, 6);
        match &deck.get(19).unwrap().source {
            SlideSource::File(path) => assert!(path.ends_with("page-20.png")),
            SlideSource::Encoded(_) => panic!("expected file source"),
        }
    }

    #[test]
    fn test_load_dir_orders_unpadded_numbers() {
        let dir = tempfile::tempdir().unwrap();
        for i in 1..=20 {
            std::fs::write(dir.path().join(format!("Slide{i}.png")), png_bytes(8, 6)).unwrap();
        }

        let deck = Deck::load_dir(dir.path()).unwrap();
        let names: Vec<String> = deck
            .slides()
            .iter()
            .map(|slide| match &slide.source {
                SlideSource::File(path) => file_name(path),
                SlideSource::Encoded(_) => panic!("expected file source"),
            })
            .collect();
        let expected: Vec<String> = (1..=20).map(|i| format!("Slide{i}.png")).collect();
        assert_eq!(names, expected);
    }

    #[test]
    fn test_natural_cmp() {
        assert_eq!(natural_cmp("Slide2.png", "Slide10.png"), Ordering::Less);
        assert_eq!(natural_cmp("page-09.png", "page-10.png"), Ordering::Less);
        assert_eq!(natural_cmp("a.png", "b.png"), Ordering::Less);
        assert_eq!(natural_cmp("Slide1.png", "Slide1.png"), Ordering::Equal);
        assert_eq!(natural_cmp("Slide01.png", "Slide1.png"), Ordering::Greater);
        assert_eq!(natural_cmp("Slide", "Slide1"), Ordering::Less);
    }

    #[test]
    fn test_load_dir_with_too_few_images() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.png"), png_bytes(2, 2)).unwrap();
        assert!(matches!(
            Deck::load_dir(dir.path()),
            Err(DeckError::WrongCount { found: 1, .. })
        ));
    }

    #[test]
    fn test_missing_dir_is_unreadable() {
        assert!(matches!(
            Deck::load_dir(Path::new("/nonexistent/deck")),
            Err(DeckError::Unreadable { .. })
        ));
    }

    #[test]
    fn test_decode_encoded_and_corrupt() {
        let good = Slide::from_encoded(1, png_bytes(3, 2), 3, 2);
        let decoded = good.decode().unwrap();
        assert_eq!((decoded.width(), decoded.height()), (3, 2));

        let bad = Slide::from_encoded(2, vec![1u8, 2, 3], 3, 2);
        assert!(bad.decode().is_err());
    }
}
