/// Normalized plane dimensions for presenting the source image.
///
/// A component of `1.0` means the image fills that axis of the viewport
/// exactly. The final pass scales its quad by these factors, so the image
/// is letterboxed rather than stretched.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneSize {
    pub width: f32,
    pub height: f32,
}

/// Computes contain-fit geometry for an image inside a viewport.
///
/// The viewport aspect only selects which axis binds: a wider-than-viewport
/// image takes the full width and shrinks its height to `1 / aspect`, and a
/// taller one takes the full height with `width = aspect`. Called on every
/// viewport resize and on image load; it never influences render-target
/// sizes, which always track the image's native pixels.
pub fn fit_contain(image_width: u32, image_height: u32, viewport_width: u32, viewport_height: u32) -> PlaneSize {
    let image_aspect = image_width.max(1) as f32 / image_height.max(1) as f32;
    let viewport_aspect = viewport_width.max(1) as f32 / viewport_height.max(1) as f32;

    if image_aspect > viewport_aspect {
        PlaneSize {
            width: 1.0,
            height: 1.0 / image_aspect,
        }
    } else {
        PlaneSize {
            width: image_aspect,
            height: 1.0,
        }
    }
}
