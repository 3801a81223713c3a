//! Static effect catalog.
//!
//! The catalog is a closed set: every [`EffectKind`] maps to exactly one
//! [`EffectTemplate`] carrying the fragment-stage GLSL body, the parameter
//! schema, and whether the effect consumes the frame clock. Parameter
//! `min`/`max`/`step` document the intended control range for a boundary
//! UI; nothing in the pipeline clamps to them.

use std::fmt;

use crate::error::EffectError;
use crate::shaders;

/// Per-pass compositing functions, in uniform-index order.
///
/// The index of a mode in this ordering is the value written to the
/// `blend_mode` uniform; names outside the list parse as [`BlendMode::Normal`].
pub const BLEND_MODE_NAMES: [&str; 6] = ["normal", "multiply", "screen", "overlay", "darken", "lighten"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BlendMode {
    #[default]
    Normal,
    Multiply,
    Screen,
    Overlay,
    Darken,
    Lighten,
}

impl BlendMode {
    /// Index into the fixed blend ordering, as consumed by the shaders.
    pub fn index(self) -> u32 {
        match self {
            BlendMode::Normal => 0,
            BlendMode::Multiply => 1,
            BlendMode::Screen => 2,
            BlendMode::Overlay => 3,
            BlendMode::Darken => 4,
            BlendMode::Lighten => 5,
        }
    }

    pub fn name(self) -> &'static str {
        BLEND_MODE_NAMES[self.index() as usize]
    }

    /// Resolves a blend-mode name; unrecognized names fall back to `Normal`.
    pub fn from_name(name: &str) -> Self {
        match name {
            "multiply" => BlendMode::Multiply,
            "screen" => BlendMode::Screen,
            "overlay" => BlendMode::Overlay,
            "darken" => BlendMode::Darken,
            "lighten" => BlendMode::Lighten,
            _ => BlendMode::Normal,
        }
    }
}

/// The closed set of chainable effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectKind {
    Default,
    Pixelate,
    Wave,
    RgbShift,
    Kaleidoscope,
    Vignette,
    Blur,
    Glitch,
    Noise,
    Mirror,
}

impl EffectKind {
    /// Catalog order; also the order effects are offered to the user.
    pub const ALL: [EffectKind; 10] = [
        EffectKind::Default,
        EffectKind::Pixelate,
        EffectKind::Wave,
        EffectKind::RgbShift,
        EffectKind::Kaleidoscope,
        EffectKind::Vignette,
        EffectKind::Blur,
        EffectKind::Glitch,
        EffectKind::Noise,
        EffectKind::Mirror,
    ];

    pub fn name(self) -> &'static str {
        template(self).name
    }

    /// Parses a catalog name. Unknown names fail with
    /// [`EffectError::UnknownEffectKind`]; the documented policy at the
    /// pipeline level is to substitute the identity template rather than
    /// abort, so callers that cannot propagate may map the error to
    /// [`identity_template`].
    pub fn parse(name: &str) -> Result<Self, EffectError> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == name)
            .ok_or_else(|| EffectError::UnknownEffectKind { name: name.to_owned() })
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Schema entry for one tunable effect parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub default: f32,
    pub min: f32,
    pub max: f32,
    pub step: f32,
}

const fn param(name: &'static str, default: f32, min: f32, max: f32, step: f32) -> ParamSpec {
    ParamSpec {
        name,
        default,
        min,
        max,
        step,
    }
}

/// Everything the pass compiler needs to realise one effect.
#[derive(Debug)]
pub struct EffectTemplate {
    pub name: &'static str,
    /// Fragment-stage GLSL body; wrapped by [`shaders::fragment_source`].
    pub fragment_body: &'static str,
    /// Tunable parameters in UBO slot order. `time`, `resolution`, and
    /// `blend_mode` are not listed here; they are bound by the executor.
    pub params: &'static [ParamSpec],
    /// Whether the per-frame clock feeds this effect's `time` uniform.
    pub time_dependent: bool,
}

static DEFAULT: EffectTemplate = EffectTemplate {
    name: "default",
    fragment_body: shaders::DEFAULT_BODY,
    params: &[
        param("brightness", 1.0, 0.0, 2.0, 0.1),
        param("contrast", 1.0, 0.0, 2.0, 0.1),
        param("saturation", 1.0, 0.0, 2.0, 0.1),
        param("hue", 0.0, 0.0, 360.0, 1.0),
    ],
    time_dependent: false,
};

static PIXELATE: EffectTemplate = EffectTemplate {
    name: "pixelate",
    fragment_body: shaders::PIXELATE_BODY,
    params: &[param("pixelate", 1.0, 1.0, 100.0, 1.0)],
    time_dependent: false,
};

static WAVE: EffectTemplate = EffectTemplate {
    name: "wave",
    fragment_body: shaders::WAVE_BODY,
    params: &[],
    time_dependent: true,
};

static RGB_SHIFT: EffectTemplate = EffectTemplate {
    name: "rgb-shift",
    fragment_body: shaders::RGB_SHIFT_BODY,
    params: &[param("amount", 0.5, 0.0, 1.0, 0.01)],
    time_dependent: false,
};

static KALEIDOSCOPE: EffectTemplate = EffectTemplate {
    name: "kaleidoscope",
    fragment_body: shaders::KALEIDOSCOPE_BODY,
    params: &[param("segments", 8.0, 2.0, 32.0, 1.0)],
    time_dependent: false,
};

static VIGNETTE: EffectTemplate = EffectTemplate {
    name: "vignette",
    fragment_body: shaders::VIGNETTE_BODY,
    params: &[
        param("intensity", 1.0, 0.0, 2.0, 0.1),
        param("roundness", 1.0, 0.0, 2.0, 0.1),
    ],
    time_dependent: false,
};

static BLUR: EffectTemplate = EffectTemplate {
    name: "blur",
    fragment_body: shaders::BLUR_BODY,
    params: &[param("radius", 5.0, 0.0, 20.0, 0.5)],
    time_dependent: false,
};

static GLITCH: EffectTemplate = EffectTemplate {
    name: "glitch",
    fragment_body: shaders::GLITCH_BODY,
    params: &[param("intensity", 1.0, 0.0, 1.0, 0.01)],
    time_dependent: true,
};

static NOISE: EffectTemplate = EffectTemplate {
    name: "noise",
    fragment_body: shaders::NOISE_BODY,
    params: &[param("amount", 0.5, 0.0, 1.0, 0.01)],
    time_dependent: true,
};

static MIRROR: EffectTemplate = EffectTemplate {
    name: "mirror",
    fragment_body: shaders::MIRROR_BODY,
    params: &[
        param("offset", 0.0, -0.5, 0.5, 0.01),
        param("axis", 0.0, 0.0, 1.0, 1.0),
    ],
    time_dependent: false,
};

static IDENTITY: EffectTemplate = EffectTemplate {
    name: "identity",
    fragment_body: shaders::IDENTITY_BODY,
    params: &[],
    time_dependent: false,
};

/// Looks up the template for a kind. Total over the closed set.
pub fn template(kind: EffectKind) -> &'static EffectTemplate {
    match kind {
        EffectKind::Default => &DEFAULT,
        EffectKind::Pixelate => &PIXELATE,
        EffectKind::Wave => &WAVE,
        EffectKind::RgbShift => &RGB_SHIFT,
        EffectKind::Kaleidoscope => &KALEIDOSCOPE,
        EffectKind::Vignette => &VIGNETTE,
        EffectKind::Blur => &BLUR,
        EffectKind::Glitch => &GLITCH,
        EffectKind::Noise => &NOISE,
        EffectKind::Mirror => &MIRROR,
    }
}

/// The pass-through template backing the N==0 fallback and failed-compile
/// substitution.
pub fn identity_template() -> &'static EffectTemplate {
    &IDENTITY
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_resolves_a_template() {
        for kind in EffectKind::ALL {
            let template = template(kind);
            assert!(!template.fragment_body.is_empty());
            assert!(template.params.len() <= crate::plan::MAX_PARAMS);
        }
    }

    #[test]
    fn kind_names_round_trip() {
        for kind in EffectKind::ALL {
            assert_eq!(EffectKind::parse(kind.name()).unwrap(), kind);
        }
    }

    #[test]
    fn unknown_kind_name_is_rejected() {
        let err = EffectKind::parse("sepia").unwrap_err();
        assert!(matches!(err, EffectError::UnknownEffectKind { ref name } if name == "sepia"));
    }

    #[test]
    fn time_dependence_is_limited_to_wave_glitch_noise() {
        for kind in EffectKind::ALL {
            let expected = matches!(kind, EffectKind::Wave | EffectKind::Glitch | EffectKind::Noise);
            assert_eq!(template(kind).time_dependent, expected, "{kind}");
        }
    }

    #[test]
    fn blend_indices_follow_the_fixed_ordering() {
        for (index, name) in BLEND_MODE_NAMES.iter().enumerate() {
            let mode = BlendMode::from_name(name);
            assert_eq!(mode.index() as usize, index);
            assert_eq!(mode.name(), *name);
        }
    }

    #[test]
    fn unrecognized_blend_name_defaults_to_normal() {
        assert_eq!(BlendMode::from_name("subtract"), BlendMode::Normal);
        assert_eq!(BlendMode::from_name(""), BlendMode::Normal);
    }

    #[test]
    fn default_grade_is_neutral() {
        let params = template(EffectKind::Default).params;
        let defaults: Vec<(&str, f32)> = params.iter().map(|p| (p.name, p.default)).collect();
        assert_eq!(
            defaults,
            vec![("brightness", 1.0), ("contrast", 1.0), ("saturation", 1.0), ("hue", 0.0)]
        );
    }
}
