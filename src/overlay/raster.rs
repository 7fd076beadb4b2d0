use ab_glyph::{FontArc, PxScale};
use image::{Pixel, Rgba, RgbaImage};
use std::path::Path;
use tracing::{debug, warn};

use super::{FontWeight, Rect, Surface, TextStyle};
use crate::config::OverlayConfig;

/// Fonts used by the raster surface. Any of them may be missing; lookups fall
/// back to the regular face, and text is skipped when no face is available.
#[derive(Clone, Default)]
pub struct FontSet {
    regular: Option<FontArc>,
    semibold: Option<FontArc>,
    bold: Option<FontArc>,
    mono: Option<FontArc>,
}

impl FontSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn load(config: &OverlayConfig) -> Self {
        let fonts = Self {
            regular: load_font(&config.font_regular),
            semibold: load_font(&config.font_semibold),
            bold: load_font(&config.font_bold),
            mono: load_font(&config.font_mono),
        };
        if !fonts.has_text() {
            warn!("No overlay fonts could be loaded; recordings will carry progress bars only");
        }
        fonts
    }

    pub fn has_text(&self) -> bool {
        self.regular.is_some()
            || self.semibold.is_some()
            || self.bold.is_some()
            || self.mono.is_some()
    }

    fn face(&self, weight: FontWeight) -> Option<&FontArc> {
        let preferred = match weight {
            FontWeight::Regular => self.regular.as_ref(),
            FontWeight::Semibold => self.semibold.as_ref().or(self.bold.as_ref()),
            FontWeight::Bold => self.bold.as_ref(),
            FontWeight::Mono => self.mono.as_ref(),
        };
        preferred
            .or(self.regular.as_ref())
            .or(self.bold.as_ref())
            .or(self.mono.as_ref())
    }
}

fn load_font(path: &Path) -> Option<FontArc> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!("Font {:?} not readable: {}", path, e);
            return None;
        }
    };
    match FontArc::try_from_vec(bytes) {
        Ok(font) => Some(font),
        Err(e) => {
            warn!("Font {:?} could not be parsed: {}", path, e);
            None
        }
    }
}

/// `Surface` over an RGBA frame buffer.
pub struct RasterSurface<'a> {
    image: &'a mut RgbaImage,
    fonts: &'a FontSet,
}

impl<'a> RasterSurface<'a> {
    pub fn new(image: &'a mut RgbaImage, fonts: &'a FontSet) -> Self {
        Self { image, fonts }
    }
}

impl Surface for RasterSurface<'_> {
    fn fill_rect(&mut self, rect: Rect, color: Rgba<u8>) {
        let (width, height) = self.image.dimensions();
        let x0 = rect.x.max(0.0).round() as u32;
        let y0 = rect.y.max(0.0).round() as u32;
        let x1 = ((rect.x + rect.width).round().max(0.0) as u32).min(width);
        let y1 = ((rect.y + rect.height).round().max(0.0) as u32).min(height);

        for y in y0..y1 {
            for x in x0..x1 {
                if color[3] == u8::MAX {
                    self.image.put_pixel(x, y, color);
                } else {
                    self.image.get_pixel_mut(x, y).blend(&color);
                }
            }
        }
    }

    fn draw_text(&mut self, x: f32, y: f32, text: &str, style: &TextStyle) {
        let Some(font) = self.fonts.face(style.weight) else {
            return;
        };
        imageproc::drawing::draw_text_mut(
            &mut *self.image,
            style.color,
            x.round() as i32,
            y.round() as i32,
            PxScale::from(style.size),
            font,
            text,
        );
    }

    fn text_width(&self, text: &str, style: &TextStyle) -> f32 {
        match self.fonts.face(style.weight) {
            Some(font) => {
                imageproc::drawing::text_size(PxScale::from(style.size), font, text).0 as f32
            }
            None => text.chars().count() as f32 * style.size * 0.6,
        }
    }
}
