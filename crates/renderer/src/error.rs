use thiserror::Error;

/// Failures surfaced by the effect pipeline's external boundary.
///
/// Everything here is synchronous and immediately observable by the caller;
/// nothing retries. A failed image decode leaves the previously displayed
/// image (if any) rendering, and an unknown effect kind is only reachable
/// from name parsing at the boundary; lookups over the closed [`EffectKind`]
/// set are total.
///
/// [`EffectKind`]: crate::catalog::EffectKind
#[derive(Debug, Error)]
pub enum EffectError {
    /// The uploaded bytes could not be decoded as a supported image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// An effect name did not match any catalog entry.
    #[error("unknown effect kind '{name}'")]
    UnknownEffectKind { name: String },
}
