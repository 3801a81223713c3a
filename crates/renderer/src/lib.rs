//! Core rendering library for Glaze.
//!
//! Glaze composites a single source image through an ordered chain of GPU
//! effect passes and presents the result live. The flow per frame:
//!
//! ```text
//!   encoded bytes ──▶ decode ──▶ SourceTexture
//!                                     │
//!   EffectChain ──▶ plan_chain ──▶ Pipeline::compile ──▶ [CompiledPass; N]
//!                                     │
//!   GpuState::render ──▶ pass 0 .. N-2 into offscreen targets
//!                    └─▶ final pass onto the swapchain (aspect-fitted)
//! ```
//!
//! Structural chain edits (membership/order) and source replacement
//! recompile the pipeline wholesale; parameter and blend edits bind in
//! place on the live passes. The pure planning layer ([`plan`]) decides
//! every structural invariant without a GPU, so the chain → pipeline
//! mapping is testable anywhere.

pub mod catalog;
pub mod chain;
pub mod error;
pub mod plan;
pub mod source;
pub mod viewport;

mod gpu;
mod shaders;
mod window;

pub use catalog::{template, BlendMode, EffectKind, EffectTemplate, ParamSpec};
pub use chain::{EffectChain, EffectDescriptor};
pub use error::EffectError;
pub use plan::{plan_chain, PassInput, PassPlan, PassUniforms};
pub use source::{decode_image, ImageLoader, PixelSource};
pub use viewport::{fit_contain, PlaneSize};
pub use window::{run, ViewerConfig};
