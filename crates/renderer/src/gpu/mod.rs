//! GPU realisation of the planned pass chain.
//!
//! `context` owns the device/surface plumbing, `pipeline` turns pass plans
//! into compiled passes with their offscreen targets, and `state` drives
//! the per-frame execution loop and resource hand-over on structural edits.

mod context;
mod pipeline;
mod state;

pub(crate) use state::GpuState;
