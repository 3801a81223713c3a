use std::path::PathBuf;

use clap::Parser;
use renderer::{BlendMode, EffectChain, EffectKind};

#[derive(Parser, Debug)]
#[command(
    name = "glaze",
    author,
    version,
    about = "Chained GPU image effects over a source image"
)]
pub struct Cli {
    /// Image to display (png, jpeg, gif, webp).
    #[arg(value_name = "IMAGE")]
    pub image: PathBuf,

    /// Append an effect: `KIND` or `KIND:name=value,...`. Use `blend=MODE`
    /// to pick the compositing mode (normal, multiply, screen, overlay,
    /// darken, lighten). Repeatable; order is pass order.
    #[arg(long = "effect", value_name = "SPEC", value_parser = parse_effect_spec)]
    pub effects: Vec<EffectSpec>,

    /// Load the effect chain from a TOML recipe instead of --effect flags.
    #[arg(long, value_name = "FILE", conflicts_with = "effects")]
    pub chain: Option<PathBuf>,

    /// Window size (e.g. `1280x720`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    pub size: Option<(u32, u32)>,

    /// Optional FPS cap; omit to render every refresh.
    #[arg(long, value_name = "FPS")]
    pub fps: Option<f32>,
}

pub fn parse() -> Cli {
    Cli::parse()
}

/// One `--effect` occurrence, parsed but not yet applied to a chain.
#[derive(Debug, Clone)]
pub struct EffectSpec {
    pub kind: EffectKind,
    pub params: Vec<(String, f32)>,
    pub blend: BlendMode,
}

/// Builds the starting chain from the parsed specs. No specs means the
/// stock single-entry chain.
pub fn chain_from_specs(specs: &[EffectSpec]) -> EffectChain {
    if specs.is_empty() {
        return EffectChain::new();
    }

    let mut chain = EffectChain::empty();
    for spec in specs {
        let index = chain.len();
        chain.add(spec.kind);
        for (name, value) in &spec.params {
            chain.set_parameter(index, name, *value);
        }
        chain.set_blend(index, spec.blend);
    }
    chain
}

fn parse_effect_spec(value: &str) -> Result<EffectSpec, String> {
    let (kind_name, rest) = match value.split_once(':') {
        Some((kind, rest)) => (kind, Some(rest)),
        None => (value, None),
    };
    let kind = EffectKind::parse(kind_name.trim()).map_err(|err| err.to_string())?;

    let mut params = Vec::new();
    let mut blend = BlendMode::Normal;
    if let Some(rest) = rest {
        for piece in rest.split(',').filter(|piece| !piece.trim().is_empty()) {
            let (name, raw) = piece
                .split_once('=')
                .ok_or_else(|| format!("expected name=value, got '{piece}'"))?;
            let name = name.trim();
            let raw = raw.trim();
            if name == "blend" {
                blend = BlendMode::from_name(raw);
            } else {
                let parsed: f32 = raw
                    .parse()
                    .map_err(|_| format!("invalid number '{raw}' for parameter '{name}'"))?;
                params.push((name.to_owned(), parsed));
            }
        }
    }

    Ok(EffectSpec { kind, params, blend })
}

fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let (width, height) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{value}'"))?;
    let width: u32 = width.trim().parse().map_err(|_| format!("invalid width '{width}'"))?;
    let height: u32 = height.trim().parse().map_err(|_| format!("invalid height '{height}'"))?;
    if width == 0 || height == 0 {
        return Err("window dimensions must be non-zero".into());
    }
    Ok((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_kind_parses_with_defaults() {
        let spec = parse_effect_spec("blur").unwrap();
        assert_eq!(spec.kind, EffectKind::Blur);
        assert!(spec.params.is_empty());
        assert_eq!(spec.blend, BlendMode::Normal);
    }

    #[test]
    fn kind_with_params_and_blend_parses() {
        let spec = parse_effect_spec("pixelate:pixelate=10,blend=multiply").unwrap();
        assert_eq!(spec.kind, EffectKind::Pixelate);
        assert_eq!(spec.params, vec![("pixelate".to_owned(), 10.0)]);
        assert_eq!(spec.blend, BlendMode::Multiply);
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let err = parse_effect_spec("sepia").unwrap_err();
        assert!(err.contains("sepia"));
    }

    #[test]
    fn non_numeric_parameter_is_rejected() {
        let err = parse_effect_spec("blur:radius=soft").unwrap_err();
        assert!(err.contains("invalid number"));
    }

    #[test]
    fn unknown_blend_name_falls_back_to_normal() {
        let spec = parse_effect_spec("default:blend=subtract").unwrap();
        assert_eq!(spec.blend, BlendMode::Normal);
    }

    #[test]
    fn specs_build_the_chain_in_order() {
        let specs = vec![
            parse_effect_spec("pixelate:pixelate=8").unwrap(),
            parse_effect_spec("vignette:intensity=1.5,blend=darken").unwrap(),
        ];
        let chain = chain_from_specs(&specs);
        assert_eq!(chain.len(), 2);
        assert_eq!(chain.get(0).unwrap().kind, EffectKind::Pixelate);
        assert_eq!(chain.get(0).unwrap().params.get("pixelate"), Some(&8.0));
        assert_eq!(chain.get(1).unwrap().blend, BlendMode::Darken);
    }

    #[test]
    fn no_specs_yield_the_stock_chain() {
        let chain = chain_from_specs(&[]);
        assert_eq!(chain.len(), 1);
        assert_eq!(chain.get(0).unwrap().kind, EffectKind::Default);
    }

    #[test]
    fn size_parses_and_rejects_zero() {
        assert_eq!(parse_size("1280x720").unwrap(), (1280, 720));
        assert_eq!(parse_size("640X480").unwrap(), (640, 480));
        assert!(parse_size("1280").is_err());
        assert!(parse_size("0x720").is_err());
    }
}
