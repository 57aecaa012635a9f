//! The core → presentation callback interface.
//!
//! `FractalCanvas` calls these hooks around its render and parameter
//! lifecycle without depending on any particular UI toolkit. Implementers
//! must be safe to call from worker threads; this crate's own CLI
//! implementer satisfies that by only emitting `tracing` events.

use std::time::Duration;

/// A point-in-time snapshot of one render's progress, handed to the
/// observer instead of a live reference so hooks never race the render
/// they describe.
#[derive(Debug, Clone, Copy)]
pub struct RenderSnapshot {
    pub render_id: u64,
    pub guessed: usize,
    pub calculated: usize,
    pub elapsed: Duration,
    pub cancelled: bool,
}

/// The reason a resize was rejected, passed to `canvas_resize_failed`.
#[derive(Debug, Clone)]
pub struct ResizeFailure {
    pub requested_width: u32,
    pub requested_height: u32,
    pub reason: String,
}

/// Tags the origin of a parameter change, for observers that want to
/// distinguish e.g. an animation frame update from a user-driven edit.
pub type ParameterChangeSource = &'static str;

pub trait Observer: Send + Sync {
    fn render_started(&self, _snapshot: RenderSnapshot) {}
    fn render_finished(&self, _snapshot: RenderSnapshot) {}
    fn bitmap_render_started(&self, _bitmap_render_id: u64) {}
    fn bitmap_render_finished(&self, _bitmap_render_id: u64) {}
    fn parameters_changed(&self, _source: ParameterChangeSource) {}
    fn canvas_size_changed(&self, _width: u32, _height: u32) {}
    fn canvas_resize_failed(&self, _failure: ResizeFailure) {}
    fn draw_bitmap(&self) {}
    fn show_progress(&self, _snapshot: RenderSnapshot) {}
}

/// An observer that does nothing, for callers that don't need lifecycle
/// notifications (e.g. headless one-shot renders and tests).
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl Observer for NullObserver {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_observer_accepts_every_hook() {
        let obs = NullObserver;
        let snap = RenderSnapshot {
            render_id: 1,
            guessed: 0,
            calculated: 0,
            elapsed: Duration::from_millis(1),
            cancelled: false,
        };
        obs.render_started(snap);
        obs.render_finished(snap);
        obs.bitmap_render_started(1);
        obs.bitmap_render_finished(1);
        obs.parameters_changed("test");
        obs.canvas_size_changed(100, 100);
        obs.canvas_resize_failed(ResizeFailure {
            requested_width: 0,
            requested_height: 0,
            reason: "zero dimension".into(),
        });
        obs.draw_bitmap();
        obs.show_progress(snap);
    }
}
