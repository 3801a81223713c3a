//! Pure pass planning.
//!
//! [`plan_chain`] turns the effect chain into an ordered list of
//! [`PassPlan`] records without touching the GPU, which keeps the chain →
//! pipeline mapping testable on machines with no adapter. The GPU layer
//! realises each plan one-to-one, so every structural invariant (length,
//! input wiring, target sizing) is decided here and only here.

use bytemuck::{Pod, Zeroable};

use crate::catalog::{self, BlendMode, EffectKind, EffectTemplate};
use crate::chain::EffectChain;
use crate::viewport::PlaneSize;

/// Capacity of the per-pass parameter slots. The largest catalog entry
/// (the default grade) uses four; the headroom keeps the uniform block
/// layout stable if an effect grows a parameter.
pub const MAX_PARAMS: usize = 8;

/// Where a pass reads its pixels from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassInput {
    /// The uploaded source image; always and only pass 0.
    Source,
    /// The render target written by the named earlier pass.
    PriorPass(usize),
}

/// CPU mirror of the shader's `PassParams` std140 block.
///
/// Field order and types must match the header emitted by
/// `shaders::fragment_source`; the layout test below pins the offsets.
/// Parameter values live in `values` in schema order and are written
/// through by name, raw and unclamped; range checking belongs to
/// whatever boundary control edits them.
#[repr(C, align(16))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PassUniforms {
    resolution: [f32; 2],
    plane_scale: [f32; 2],
    time: f32,
    blend_mode: f32,
    values: [f32; MAX_PARAMS],
    _padding: [f32; 2],
}

// 16 floats, no implicit padding; safe to hand to the GPU byte-for-byte.
unsafe impl Zeroable for PassUniforms {}
unsafe impl Pod for PassUniforms {}

impl PassUniforms {
    /// Builds the effective uniform values for one pass: catalog defaults
    /// overlaid by the descriptor's explicit overrides. This is the single
    /// authoritative merge point; nothing downstream re-applies defaults.
    pub fn merged(
        template: &EffectTemplate,
        overrides: impl Fn(&str) -> Option<f32>,
        width: u32,
        height: u32,
        blend: BlendMode,
    ) -> Self {
        let mut values = [0.0; MAX_PARAMS];
        for (slot, spec) in template.params.iter().enumerate() {
            values[slot] = overrides(spec.name).unwrap_or(spec.default);
        }
        Self {
            resolution: [width as f32, height as f32],
            plane_scale: [1.0, 1.0],
            time: 0.0,
            blend_mode: blend.index() as f32,
            values,
            _padding: [0.0; 2],
        }
    }

    /// Writes one named parameter in place. Returns `false` (and changes
    /// nothing) when the name is not part of this pass's schema.
    pub fn set_param(&mut self, template: &EffectTemplate, name: &str, value: f32) -> bool {
        match template.params.iter().position(|spec| spec.name == name) {
            Some(slot) => {
                self.values[slot] = value;
                true
            }
            None => false,
        }
    }

    /// Reads one named parameter back, if the schema declares it.
    pub fn param(&self, template: &EffectTemplate, name: &str) -> Option<f32> {
        template
            .params
            .iter()
            .position(|spec| spec.name == name)
            .map(|slot| self.values[slot])
    }

    pub fn set_time(&mut self, seconds: f32) {
        self.time = seconds;
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn set_blend(&mut self, blend: BlendMode) {
        self.blend_mode = blend.index() as f32;
    }

    pub fn blend_index(&self) -> u32 {
        self.blend_mode as u32
    }

    pub fn set_plane_scale(&mut self, plane: PlaneSize) {
        self.plane_scale = [plane.width, plane.height];
    }

    pub fn resolution(&self) -> [f32; 2] {
        self.resolution
    }
}

/// One planned pass: everything the GPU layer needs except the device.
#[derive(Debug, Clone, PartialEq)]
pub struct PassPlan {
    pub kind: EffectKind,
    pub input: PassInput,
    /// Render-target size; always the source image's native pixels,
    /// never the viewport's.
    pub target_width: u32,
    pub target_height: u32,
    pub uniforms: PassUniforms,
    pub time_dependent: bool,
}

impl PassPlan {
    pub fn template(&self) -> &'static EffectTemplate {
        catalog::template(self.kind)
    }
}

/// Plans the whole chain against a source image of the given pixel size.
///
/// Position decides everything: plan `i` renders after plan `i-1` and reads
/// exactly its output (pass 0 reads the source), so the result is
/// feed-forward by construction.
pub fn plan_chain(chain: &EffectChain, source_width: u32, source_height: u32) -> Vec<PassPlan> {
    chain
        .iter()
        .enumerate()
        .map(|(index, descriptor)| {
            let template = catalog::template(descriptor.kind);
            let uniforms = PassUniforms::merged(
                template,
                |name| descriptor.params.get(name).copied(),
                source_width,
                source_height,
                descriptor.blend,
            );
            PassPlan {
                kind: descriptor.kind,
                input: if index == 0 {
                    PassInput::Source
                } else {
                    PassInput::PriorPass(index - 1)
                },
                target_width: source_width,
                target_height: source_height,
                uniforms,
                time_dependent: template.time_dependent,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::EffectKind;
    use std::mem::{align_of, size_of};

    fn template(kind: EffectKind) -> &'static EffectTemplate {
        catalog::template(kind)
    }

    /// The CPU mirror must match the std140 layout baked into the GLSL
    /// header: vec2 pairs at 0 and 8, scalars tightly packed from 16.
    #[test]
    fn pass_uniforms_follow_std140_layout() {
        let uniforms = PassUniforms::zeroed();
        let base = &uniforms as *const _ as usize;

        assert_eq!(align_of::<PassUniforms>(), 16);
        assert_eq!(size_of::<PassUniforms>(), 64);
        assert_eq!(&uniforms.resolution as *const _ as usize - base, 0);
        assert_eq!(&uniforms.plane_scale as *const _ as usize - base, 8);
        assert_eq!(&uniforms.time as *const _ as usize - base, 16);
        assert_eq!(&uniforms.blend_mode as *const _ as usize - base, 20);
        assert_eq!(&uniforms.values as *const _ as usize - base, 24);
    }

    #[test]
    fn plans_mirror_chain_length_and_wiring() {
        let mut chain = EffectChain::new();
        chain.add(EffectKind::Pixelate);
        chain.add(EffectKind::Blur);

        let plans = plan_chain(&chain, 640, 480);
        assert_eq!(plans.len(), 3);
        assert_eq!(plans[0].input, PassInput::Source);
        assert_eq!(plans[1].input, PassInput::PriorPass(0));
        assert_eq!(plans[2].input, PassInput::PriorPass(1));
        for plan in &plans {
            assert_eq!((plan.target_width, plan.target_height), (640, 480));
        }
    }

    #[test]
    fn plan_order_tracks_chain_order() {
        // pixelate-then-blur and blur-then-pixelate are different pipelines.
        let mut forward = EffectChain::empty();
        forward.add(EffectKind::Pixelate);
        forward.add(EffectKind::Blur);
        let mut reverse = EffectChain::empty();
        reverse.add(EffectKind::Blur);
        reverse.add(EffectKind::Pixelate);

        let forward_kinds: Vec<_> = plan_chain(&forward, 100, 100).iter().map(|p| p.kind).collect();
        let reverse_kinds: Vec<_> = plan_chain(&reverse, 100, 100).iter().map(|p| p.kind).collect();
        assert_eq!(forward_kinds, vec![EffectKind::Pixelate, EffectKind::Blur]);
        assert_eq!(reverse_kinds, vec![EffectKind::Blur, EffectKind::Pixelate]);
        assert_ne!(forward_kinds, reverse_kinds);
    }

    #[test]
    fn single_pixelate_chain_plans_one_source_sized_pass() {
        let mut chain = EffectChain::empty();
        chain.add(EffectKind::Pixelate);
        chain.set_parameter(0, "pixelate", 10.0);

        let plans = plan_chain(&chain, 100, 50);
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].input, PassInput::Source);
        assert_eq!((plans[0].target_width, plans[0].target_height), (100, 50));
        assert_eq!(plans[0].uniforms.param(template(EffectKind::Pixelate), "pixelate"), Some(10.0));
    }

    #[test]
    fn merge_prefers_present_values_and_falls_back_to_defaults() {
        let mut chain = EffectChain::empty();
        chain.add(EffectKind::Default);
        chain.set_parameter(0, "contrast", 1.7);

        let plans = plan_chain(&chain, 64, 64);
        let grade = template(EffectKind::Default);
        assert_eq!(plans[0].uniforms.param(grade, "contrast"), Some(1.7));
        assert_eq!(plans[0].uniforms.param(grade, "brightness"), Some(1.0));
        assert_eq!(plans[0].uniforms.param(grade, "hue"), Some(0.0));
    }

    #[test]
    fn values_pass_through_raw_even_outside_documented_ranges() {
        let grade = template(EffectKind::Default);
        let mut uniforms = PassUniforms::merged(grade, |_| None, 8, 8, BlendMode::Normal);
        assert!(uniforms.set_param(grade, "brightness", 900.0));
        assert_eq!(uniforms.param(grade, "brightness"), Some(900.0));
        assert!(uniforms.set_param(grade, "hue", -45.0));
        assert_eq!(uniforms.param(grade, "hue"), Some(-45.0));
    }

    #[test]
    fn unknown_parameter_name_is_a_silent_no_op() {
        let wave = template(EffectKind::Wave);
        let mut uniforms = PassUniforms::merged(wave, |_| None, 8, 8, BlendMode::Normal);
        let before = uniforms;
        assert!(!uniforms.set_param(wave, "radius", 3.0));
        assert_eq!(uniforms, before);
    }

    #[test]
    fn add_then_remove_restores_plans_bit_identical() {
        let mut chain = EffectChain::new();
        chain.add(EffectKind::Vignette);
        let before = plan_chain(&chain, 320, 200);

        chain.add(EffectKind::Glitch);
        chain.remove(2);
        let after = plan_chain(&chain, 320, 200);

        assert_eq!(before, after);
    }

    #[test]
    fn emptied_chain_plans_nothing() {
        let mut chain = EffectChain::new();
        chain.remove(0);
        assert!(plan_chain(&chain, 100, 100).is_empty());
    }

    #[test]
    fn blend_mode_lands_in_the_uniform_block() {
        let mut chain = EffectChain::empty();
        chain.add(EffectKind::Pixelate);
        chain.set_blend(0, BlendMode::Screen);

        let plans = plan_chain(&chain, 32, 32);
        assert_eq!(plans[0].uniforms.blend_index(), 2);
    }
}
