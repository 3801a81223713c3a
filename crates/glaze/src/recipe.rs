//! TOML chain recipes.
//!
//! A recipe is an ordered list of `[[effect]]` tables:
//!
//! ```toml
//! [[effect]]
//! kind = "pixelate"
//! blend = "multiply"
//!
//! [effect.params]
//! pixelate = 12.0
//!
//! [[effect]]
//! kind = "vignette"
//! ```
//!
//! Unknown effect kinds are surfaced as errors at load time; unknown blend
//! names fall back to `normal`, matching the blend-index contract.

use std::collections::BTreeMap;
use std::path::Path;

use renderer::{BlendMode, EffectChain, EffectKind};
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum RecipeError {
    #[error("failed to read recipe: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse recipe: {0}")]
    Parse(#[from] toml::de::Error),
    #[error(transparent)]
    UnknownEffect(#[from] renderer::EffectError),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainRecipe {
    #[serde(default, rename = "effect")]
    pub effects: Vec<EffectEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EffectEntry {
    pub kind: String,
    #[serde(default)]
    pub blend: Option<String>,
    #[serde(default)]
    pub params: BTreeMap<String, f32>,
}

impl ChainRecipe {
    pub fn parse(text: &str) -> Result<Self, RecipeError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, RecipeError> {
        Self::parse(&std::fs::read_to_string(path)?)
    }

    /// Resolves the recipe into a chain. An empty recipe yields an empty
    /// chain, which renders the bare source image.
    pub fn into_chain(self) -> Result<EffectChain, RecipeError> {
        let mut chain = EffectChain::empty();
        for entry in self.effects {
            let kind = EffectKind::parse(&entry.kind)?;
            let index = chain.len();
            chain.add(kind);
            for (name, value) in &entry.params {
                chain.set_parameter(index, name, *value);
            }
            if let Some(blend) = entry.blend.as_deref() {
                chain.set_blend(index, BlendMode::from_name(blend));
            }
        }
        Ok(chain)
    }
}
