/// Size of the compositing surface for a source of `width`×`height`.
///
/// Never upscales, keeps the aspect ratio when shrinking to fit the cap, and
/// rounds down to even dimensions for yuv420p encoders.
pub fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    let width = width.max(1);
    let height = height.max(1);

    let scale = (max_width as f64 / width as f64)
        .min(max_height as f64 / height as f64)
        .min(1.0);
    let scaled_width = (width as f64 * scale).round() as u32;
    let scaled_height = (height as f64 * scale).round() as u32;

    (even(scaled_width), even(scaled_height))
}

fn even(value: u32) -> u32 {
    (value & !1).max(2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_source_is_not_upscaled() {
        assert_eq!(fit_within(800, 600, 1280, 720), (800, 600));
    }

    #[test]
    fn test_large_16_9_is_capped() {
        assert_eq!(fit_within(3840, 2160, 1280, 720), (1280, 720));
    }

    #[test]
    fn test_4_3_keeps_aspect() {
        assert_eq!(fit_within(2048, 1536, 1280, 720), (960, 720));
    }

    #[test]
    fn test_tall_source() {
        let (w, h) = fit_within(1000, 3000, 1280, 720);
        assert_eq!(h, 720);
        assert_eq!(w, 240);
    }

    #[test]
    fn test_odd_dimensions_become_even() {
        assert_eq!(fit_within(641, 361, 1280, 720), (640, 360));
        assert_eq!(fit_within(1, 1, 1280, 720), (2, 2));
    }
}
