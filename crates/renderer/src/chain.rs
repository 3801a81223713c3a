//! The user-facing effect chain.
//!
//! The chain is plain data consumed by the surrounding control surface:
//! ordered descriptors whose position decides pass order. Structural edits
//! (add/remove/reorder) require a pipeline recompile; parameter and blend
//! edits do not. Index arguments are caller contract violations when out of
//! range and panic rather than clamping; the boundary UI owns its indices.

use std::collections::BTreeMap;

use crate::catalog::{BlendMode, EffectKind};

/// One chain entry: the effect kind, its explicit parameter overrides, and
/// the compositing mode.
///
/// `params` holds only values the caller has set; catalog defaults are
/// merged in at planning time so there is exactly one fallback point.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectDescriptor {
    pub kind: EffectKind,
    pub params: BTreeMap<String, f32>,
    pub blend: BlendMode,
}

impl EffectDescriptor {
    /// A fresh entry on catalog defaults with normal blending.
    pub fn new(kind: EffectKind) -> Self {
        Self {
            kind,
            params: BTreeMap::new(),
            blend: BlendMode::Normal,
        }
    }
}

/// Ordered effect chain. Starts as a single `default`-kind entry.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectChain {
    effects: Vec<EffectDescriptor>,
}

impl EffectChain {
    /// The initial chain: one default color-grade entry.
    pub fn new() -> Self {
        Self {
            effects: vec![EffectDescriptor::new(EffectKind::Default)],
        }
    }

    /// A chain with no entries; the pipeline renders the bare source.
    pub fn empty() -> Self {
        Self { effects: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&EffectDescriptor> {
        self.effects.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &EffectDescriptor> {
        self.effects.iter()
    }

    /// Appends an entry with catalog defaults and normal blending.
    pub fn add(&mut self, kind: EffectKind) -> &mut EffectDescriptor {
        self.effects.push(EffectDescriptor::new(kind));
        self.effects.last_mut().expect("chain cannot be empty after a push")
    }

    /// Removes the entry at `index`.
    ///
    /// # Panics
    /// If `index >= len()`.
    pub fn remove(&mut self, index: usize) -> EffectDescriptor {
        assert!(
            index < self.effects.len(),
            "effect index {index} out of range for chain of length {}",
            self.effects.len()
        );
        self.effects.remove(index)
    }

    /// Moves the entry at `from` so it sits at `to`, shifting the entries
    /// in between.
    ///
    /// # Panics
    /// If either index is `>= len()`.
    pub fn reorder(&mut self, from: usize, to: usize) {
        let len = self.effects.len();
        assert!(from < len, "source index {from} out of range for chain of length {len}");
        assert!(to < len, "destination index {to} out of range for chain of length {len}");
        let moved = self.effects.remove(from);
        self.effects.insert(to, moved);
    }

    /// Stores a raw parameter value on the entry at `index`. The value is
    /// not validated against the catalog schema; the documented ranges are
    /// advice for boundary controls.
    ///
    /// # Panics
    /// If `index >= len()`.
    pub fn set_parameter(&mut self, index: usize, name: &str, value: f32) {
        assert!(
            index < self.effects.len(),
            "effect index {index} out of range for chain of length {}",
            self.effects.len()
        );
        self.effects[index].params.insert(name.to_owned(), value);
    }

    /// Changes the blend mode on the entry at `index`.
    ///
    /// # Panics
    /// If `index >= len()`.
    pub fn set_blend(&mut self, index: usize, blend: BlendMode) {
        assert!(
            index < self.effects.len(),
            "effect index {index} out of range for chain of length {}",
            self.effects.len()
        );
        self.effects[index].blend = blend;
    }

    /// Restores the initial single-entry chain on catalog defaults.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for EffectChain {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_with_a_single_default_entry() {
        let chain = EffectChain::new();
        assert_eq!(chain.len(), 1);
        let entry = chain.get(0).unwrap();
        assert_eq!(entry.kind, EffectKind::Default);
        assert!(entry.params.is_empty());
        assert_eq!(entry.blend, BlendMode::Normal);
    }

    #[test]
    fn add_appends_with_defaults() {
        let mut chain = EffectChain::new();
        chain.add(EffectKind::Blur);
        assert_eq!(chain.len(), 2);
        assert_eq!(chain.get(1).unwrap().kind, EffectKind::Blur);
        assert_eq!(chain.get(1).unwrap().blend, BlendMode::Normal);
    }

    #[test]
    fn remove_sole_entry_leaves_an_empty_chain() {
        let mut chain = EffectChain::new();
        chain.remove(0);
        assert!(chain.is_empty());
    }

    #[test]
    fn reorder_moves_an_entry_between_positions() {
        let mut chain = EffectChain::empty();
        chain.add(EffectKind::Pixelate);
        chain.add(EffectKind::Blur);
        chain.add(EffectKind::Noise);

        chain.reorder(0, 2);
        let kinds: Vec<_> = chain.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EffectKind::Blur, EffectKind::Noise, EffectKind::Pixelate]);

        chain.reorder(2, 0);
        let kinds: Vec<_> = chain.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EffectKind::Pixelate, EffectKind::Blur, EffectKind::Noise]);
    }

    #[test]
    fn set_parameter_stores_raw_values() {
        let mut chain = EffectChain::new();
        chain.set_parameter(0, "brightness", 12.5);
        assert_eq!(chain.get(0).unwrap().params.get("brightness"), Some(&12.5));
    }

    #[test]
    fn add_then_remove_restores_the_previous_chain() {
        let mut chain = EffectChain::new();
        chain.set_parameter(0, "hue", 180.0);
        let before = chain.clone();

        chain.add(EffectKind::Kaleidoscope);
        chain.remove(1);
        assert_eq!(chain, before);
    }

    #[test]
    fn reset_restores_the_initial_chain() {
        let mut chain = EffectChain::new();
        chain.add(EffectKind::Glitch);
        chain.set_parameter(0, "saturation", 0.0);
        chain.reset();
        assert_eq!(chain, EffectChain::new());
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn remove_out_of_range_panics() {
        let mut chain = EffectChain::new();
        chain.remove(1);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn reorder_out_of_range_panics() {
        let mut chain = EffectChain::new();
        chain.reorder(0, 1);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn set_parameter_out_of_range_panics() {
        let mut chain = EffectChain::empty();
        chain.set_parameter(0, "brightness", 1.0);
    }
}
