//! Windowed viewer.
//!
//! Drives the winit event loop: keyboard edits mutate the [`EffectChain`]
//! and are applied to the GPU state between frames (structural edits
//! recompile, parameter/blend edits bind in place), decoded uploads are
//! polled off the loader, and redraws render one frame each. Everything
//! runs on the event-loop thread; the only other thread is the decode
//! worker.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context as AnyhowContext, Result};
use tracing::{error, info, warn};
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::WindowBuilder;

use crate::catalog::{self, BlendMode, EffectKind, BLEND_MODE_NAMES};
use crate::chain::EffectChain;
use crate::gpu::GpuState;
use crate::source::{decode_image, ImageLoader};

/// Start-up configuration handed over by the CLI layer.
#[derive(Debug, Clone)]
pub struct ViewerConfig {
    /// Image to load before the first frame.
    pub image_path: PathBuf,
    /// Initial effect chain.
    pub chain: EffectChain,
    /// Window size in physical pixels.
    pub window_size: (u32, u32),
    /// Optional FPS cap; `None` renders every refresh callback.
    pub target_fps: Option<f32>,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            image_path: PathBuf::new(),
            chain: EffectChain::new(),
            window_size: (1280, 720),
            target_fps: None,
        }
    }
}

/// Opens the viewer window and runs until closed.
pub fn run(config: ViewerConfig) -> Result<()> {
    let ViewerConfig {
        image_path,
        mut chain,
        window_size,
        target_fps,
    } = config;

    let bytes = std::fs::read(&image_path)
        .with_context(|| format!("failed to read image at {}", image_path.display()))?;
    let pixels = decode_image(&bytes)
        .with_context(|| format!("failed to decode image at {}", image_path.display()))?;

    let event_loop = EventLoop::new().map_err(|err| anyhow!("failed to create event loop: {err}"))?;
    let window = WindowBuilder::new()
        .with_title("glaze")
        .with_inner_size(PhysicalSize::new(window_size.0, window_size.1))
        .build(&event_loop)
        .map_err(|err| anyhow!("failed to create viewer window: {err}"))?;
    let window = Arc::new(window);

    let mut gpu = GpuState::new(window.as_ref(), window.inner_size(), &pixels, &chain)?;
    let mut loader = ImageLoader::spawn()?;
    let mut limiter = FrameLimiter::new(target_fps);

    info!(
        image = %image_path.display(),
        width = pixels.width,
        height = pixels.height,
        effects = chain.len(),
        "viewer ready"
    );

    event_loop
        .run(move |event, elwt| match event {
            Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
                WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                    elwt.exit();
                }
                WindowEvent::Resized(new_size) => {
                    gpu.resize(new_size);
                }
                WindowEvent::KeyboardInput { event, .. } => {
                    if event.state != ElementState::Pressed || event.repeat {
                        return;
                    }
                    let PhysicalKey::Code(code) = event.physical_key else {
                        return;
                    };
                    match code {
                        KeyCode::Escape => elwt.exit(),
                        KeyCode::Backspace => {
                            if !chain.is_empty() {
                                let removed = chain.remove(chain.len() - 1);
                                info!(effect = %removed.kind, "effect removed");
                                apply_chain(&mut gpu, &chain);
                            }
                        }
                        KeyCode::KeyR => {
                            chain.reset();
                            info!("chain reset");
                            apply_chain(&mut gpu, &chain);
                        }
                        KeyCode::KeyL => match std::fs::read(&image_path) {
                            Ok(bytes) => {
                                if let Err(err) = loader.request(bytes) {
                                    error!(error = %err, "image reload request failed");
                                }
                            }
                            Err(err) => {
                                error!(error = %err, path = %image_path.display(), "failed to re-read image");
                            }
                        },
                        KeyCode::ArrowUp => nudge_parameter(&mut chain, &mut gpu, 1.0),
                        KeyCode::ArrowDown => nudge_parameter(&mut chain, &mut gpu, -1.0),
                        KeyCode::KeyB => cycle_blend(&mut chain, &mut gpu),
                        KeyCode::BracketLeft => {
                            // Swap the last two passes; ordering is not
                            // commutative, so this visibly changes the result.
                            if chain.len() >= 2 {
                                chain.reorder(chain.len() - 1, chain.len() - 2);
                                info!("last two effects swapped");
                                apply_chain(&mut gpu, &chain);
                            }
                        }
                        other => {
                            if let Some(kind) = effect_for_key(other) {
                                chain.add(kind);
                                info!(effect = %kind, position = chain.len() - 1, "effect added");
                                apply_chain(&mut gpu, &chain);
                            }
                        }
                    }
                }
                WindowEvent::RedrawRequested => {
                    match gpu.render() {
                        Ok(()) => limiter.mark_rendered(Instant::now()),
                        Err(wgpu::SurfaceError::Lost) | Err(wgpu::SurfaceError::Outdated) => {
                            gpu.resize(gpu.size());
                        }
                        Err(wgpu::SurfaceError::OutOfMemory) => {
                            error!("surface out of memory; closing viewer");
                            elwt.exit();
                        }
                        Err(err) => {
                            warn!(error = ?err, "surface error; retrying next frame");
                        }
                    }
                }
                _ => {}
            },
            Event::AboutToWait => {
                match loader.poll() {
                    Some(Ok(pixels)) => {
                        if let Err(err) = gpu.replace_source(&pixels, &chain) {
                            error!(error = %err, "failed to install new image; keeping previous one");
                        }
                    }
                    Some(Err(err)) => {
                        warn!(error = %err, "image decode failed; previous image stays visible");
                    }
                    None => {}
                }

                let now = Instant::now();
                if limiter.ready(now) {
                    window.request_redraw();
                    elwt.set_control_flow(ControlFlow::Wait);
                } else if let Some(deadline) = limiter.deadline() {
                    elwt.set_control_flow(ControlFlow::WaitUntil(deadline));
                }
            }
            _ => {}
        })
        .map_err(|err| anyhow!("event loop error: {err}"))
}

/// Structural edits are serialized with rendering by construction: they run
/// in event handling, never inside a redraw. A failed recompile keeps the
/// previous pipeline on screen.
fn apply_chain(gpu: &mut GpuState, chain: &EffectChain) {
    if let Err(err) = gpu.set_chain(chain) {
        error!(error = %err, "chain recompile failed; previous pipeline keeps rendering");
    }
}

/// Steps the last effect's first parameter by one schema step. Binds in
/// place; no recompile.
fn nudge_parameter(chain: &mut EffectChain, gpu: &mut GpuState, direction: f32) {
    if chain.is_empty() {
        return;
    }
    let index = chain.len() - 1;
    let (kind, current) = {
        let descriptor = chain.get(index).expect("index is in range");
        let Some(spec) = catalog::template(descriptor.kind).params.first() else {
            return;
        };
        (
            descriptor.kind,
            descriptor.params.get(spec.name).copied().unwrap_or(spec.default),
        )
    };
    let spec = catalog::template(kind).params[0];
    let value = current + direction * spec.step;
    chain.set_parameter(index, spec.name, value);
    gpu.set_parameter(index, spec.name, value);
    info!(effect = %kind, param = spec.name, value, "parameter adjusted");
}

/// Cycles the last effect's blend mode through the fixed ordering. Binds
/// in place; no recompile.
fn cycle_blend(chain: &mut EffectChain, gpu: &mut GpuState) {
    if chain.is_empty() {
        return;
    }
    let index = chain.len() - 1;
    let current = chain.get(index).expect("index is in range").blend;
    let next_name = BLEND_MODE_NAMES[(current.index() as usize + 1) % BLEND_MODE_NAMES.len()];
    let next = BlendMode::from_name(next_name);
    chain.set_blend(index, next);
    gpu.set_blend(index, next);
    info!(blend = next.name(), "blend mode changed");
}

fn effect_for_key(code: KeyCode) -> Option<EffectKind> {
    let index = match code {
        KeyCode::Digit1 => 0,
        KeyCode::Digit2 => 1,
        KeyCode::Digit3 => 2,
        KeyCode::Digit4 => 3,
        KeyCode::Digit5 => 4,
        KeyCode::Digit6 => 5,
        KeyCode::Digit7 => 6,
        KeyCode::Digit8 => 7,
        KeyCode::Digit9 => 8,
        KeyCode::Digit0 => 9,
        _ => return None,
    };
    Some(EffectKind::ALL[index])
}

/// Caps redraws at the requested FPS; uncapped renders continuously so the
/// time-driven effects animate at refresh rate.
struct FrameLimiter {
    interval: Option<Duration>,
    next_frame: Instant,
}

impl FrameLimiter {
    fn new(target_fps: Option<f32>) -> Self {
        Self {
            interval: target_fps
                .filter(|fps| *fps > 0.0)
                .map(|fps| Duration::from_secs_f32(1.0 / fps)),
            next_frame: Instant::now(),
        }
    }

    fn ready(&self, now: Instant) -> bool {
        self.interval.is_none() || now >= self.next_frame
    }

    fn mark_rendered(&mut self, now: Instant) {
        if let Some(interval) = self.interval {
            self.next_frame = now + interval;
        }
    }

    fn deadline(&self) -> Option<Instant> {
        self.interval.map(|_| self.next_frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uncapped_limiter_is_always_ready() {
        let mut limiter = FrameLimiter::new(None);
        let now = Instant::now();
        assert!(limiter.ready(now));
        limiter.mark_rendered(now);
        assert!(limiter.ready(now));
        assert!(limiter.deadline().is_none());
    }

    #[test]
    fn capped_limiter_waits_out_the_interval() {
        // 8 fps = 125ms, exactly representable in f32 seconds.
        let mut limiter = FrameLimiter::new(Some(8.0));
        let now = Instant::now();
        assert!(limiter.ready(now));
        limiter.mark_rendered(now);
        assert!(!limiter.ready(now));
        assert!(limiter.ready(now + Duration::from_millis(150)));
        assert_eq!(limiter.deadline(), Some(now + Duration::from_millis(125)));
    }

    #[test]
    fn nonpositive_fps_is_treated_as_uncapped() {
        let limiter = FrameLimiter::new(Some(0.0));
        assert!(limiter.interval.is_none());
    }

    #[test]
    fn digit_keys_cover_the_whole_catalog_in_order() {
        assert_eq!(effect_for_key(KeyCode::Digit1), Some(EffectKind::Default));
        assert_eq!(effect_for_key(KeyCode::Digit0), Some(EffectKind::Mirror));
        assert_eq!(effect_for_key(KeyCode::KeyQ), None);
    }
}
