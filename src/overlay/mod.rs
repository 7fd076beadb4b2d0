//! Overlay compositing.
//!
//! `render_overlay` is pure: it only issues drawing calls against a `Surface`,
//! with every coordinate derived from the surface dimensions. The raster
//! implementation lives in `raster`.

mod raster;

pub use raster::{FontSet, RasterSurface};

use image::Rgba;
use serde::{Deserialize, Serialize};

use crate::timer::{TimerState, SLIDE_SECONDS, TOTAL_SLIDES};

/// Label shown next to the countdown: the fixed talk length.
pub const DURATION_LABEL: &str = "5:00";

pub const TEXT_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);
pub const SHADOW_COLOR: Rgba<u8> = Rgba([0, 0, 0, 170]);
pub const BAND_COLOR: Rgba<u8> = Rgba([0, 0, 0, 140]);
pub const COUNTDOWN_COLOR: Rgba<u8> = Rgba([255, 193, 7, 255]);
pub const LABEL_COLOR: Rgba<u8> = Rgba([255, 255, 255, 190]);
pub const SEGMENT_TRACK_COLOR: Rgba<u8> = Rgba([255, 255, 255, 70]);
pub const SEGMENT_FILL_COLOR: Rgba<u8> = Rgba([255, 193, 7, 255]);

/// Identifying strings for one talk. Any of them may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TalkInfo {
    pub event_title: String,
    pub story_name: String,
    pub speaker_name: String,
}

/// Everything the overlay needs for one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayInfo {
    pub event_title: String,
    pub story_name: String,
    pub speaker_name: String,
    pub current_slide: usize,
    pub total_slides: usize,
    pub slide_seconds_left: u32,
}

impl OverlayInfo {
    pub fn new(talk: &TalkInfo, state: &TimerState) -> Self {
        Self {
            event_title: talk.event_title.clone(),
            story_name: talk.story_name.clone(),
            speaker_name: talk.speaker_name.clone(),
            current_slide: state.current_slide,
            total_slides: TOTAL_SLIDES,
            slide_seconds_left: state.slide_seconds_left(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontWeight {
    Regular,
    Semibold,
    Bold,
    Mono,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub size: f32,
    pub weight: FontWeight,
    pub color: Rgba<u8>,
}

/// Drawing target for the overlay. `y` is the top of the text line.
pub trait Surface {
    fn fill_rect(&mut self, rect: Rect, color: Rgba<u8>);
    fn draw_text(&mut self, x: f32, y: f32, text: &str, style: &TextStyle);
    fn text_width(&self, text: &str, style: &TextStyle) -> f32;
}

/// Fill ratio of progress segment `index`.
pub fn segment_fill(index: usize, info: &OverlayInfo) -> f32 {
    if index < info.current_slide {
        1.0
    } else if index == info.current_slide {
        (1.0 - info.slide_seconds_left as f32 / SLIDE_SECONDS as f32).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

pub fn render_overlay(surface: &mut dyn Surface, width: u32, height: u32, info: &OverlayInfo) {
    let w = width as f32;
    let h = height as f32;
    let pad = h * 0.035;

    draw_header(surface, h, pad, info);
    draw_progress_band(surface, w, h, pad, info);
}

fn draw_header(surface: &mut dyn Surface, h: f32, pad: f32, info: &OverlayInfo) {
    let shadow = (h * 0.004).max(1.0);
    let lines = [
        (info.event_title.as_str(), 0.055, FontWeight::Bold),
        (info.story_name.as_str(), 0.042, FontWeight::Semibold),
        (info.speaker_name.as_str(), 0.036, FontWeight::Regular),
    ];

    let mut y = pad;
    for (text, size_ratio, weight) in lines {
        if text.trim().is_empty() {
            continue;
        }
        let size = h * size_ratio;
        let shadow_style = TextStyle {
            size,
            weight,
            color: SHADOW_COLOR,
        };
        let style = TextStyle {
            size,
            weight,
            color: TEXT_COLOR,
        };
        surface.draw_text(pad + shadow, y + shadow, text, &shadow_style);
        surface.draw_text(pad, y, text, &style);
        y += size * 1.25;
    }
}

fn draw_progress_band(surface: &mut dyn Surface, w: f32, h: f32, pad: f32, info: &OverlayInfo) {
    let band_height = h * 0.1;
    let band_y = h - band_height;
    surface.fill_rect(Rect::new(0.0, band_y, w, band_height), BAND_COLOR);

    let countdown = format!("{:>2}", info.slide_seconds_left);
    let countdown_style = TextStyle {
        size: band_height * 0.55,
        weight: FontWeight::Mono,
        color: COUNTDOWN_COLOR,
    };
    let countdown_y = band_y + (band_height - countdown_style.size) / 2.0;
    surface.draw_text(pad, countdown_y, &countdown, &countdown_style);

    let mut x = pad + surface.text_width(&countdown, &countdown_style) + pad * 0.5;

    let label_style = TextStyle {
        size: band_height * 0.3,
        weight: FontWeight::Regular,
        color: LABEL_COLOR,
    };
    let label_y = band_y + (band_height - label_style.size) / 2.0;
    surface.draw_text(x, label_y, DURATION_LABEL, &label_style);
    x += surface.text_width(DURATION_LABEL, &label_style) + pad;

    let segments = info.total_slides.max(1);
    let gap = w * 0.004;
    let track_width = (w - pad - x).max(0.0);
    let segment_width =
        ((track_width - gap * (segments - 1) as f32) / segments as f32).max(0.0);
    let segment_height = band_height * 0.18;
    let segment_y = band_y + (band_height - segment_height) / 2.0;

    for index in 0..segments {
        let segment_x = x + index as f32 * (segment_width + gap);
        surface.fill_rect(
            Rect::new(segment_x, segment_y, segment_width, segment_height),
            SEGMENT_TRACK_COLOR,
        );
        let fill = segment_fill(index, info);
        if fill > 0.0 {
            surface.fill_rect(
                Rect::new(segment_x, segment_y, segment_width * fill, segment_height),
                SEGMENT_FILL_COLOR,
            );
        }
    }
}
