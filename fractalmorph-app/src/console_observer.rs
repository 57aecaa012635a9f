//! The reference `Observer` implementation: a logging backend with no UI
//! to marshal onto, so every hook simply emits a `tracing` event.

use fractalmorph_render::{Observer, ParameterChangeSource, RenderSnapshot, ResizeFailure};
use tracing::{info, warn};

pub struct ConsoleObserver;

impl Observer for ConsoleObserver {
    fn render_started(&self, snapshot: RenderSnapshot) {
        info!(render_id = snapshot.render_id, "render started");
    }

    fn render_finished(&self, snapshot: RenderSnapshot) {
        info!(
            render_id = snapshot.render_id,
            guessed = snapshot.guessed,
            calculated = snapshot.calculated,
            elapsed_ms = snapshot.elapsed.as_millis(),
            cancelled = snapshot.cancelled,
            "render finished"
        );
    }

    fn bitmap_render_started(&self, bitmap_render_id: u64) {
        info!(bitmap_render_id, "bitmap render started");
    }

    fn bitmap_render_finished(&self, bitmap_render_id: u64) {
        info!(bitmap_render_id, "bitmap render finished");
    }

    fn parameters_changed(&self, source: ParameterChangeSource) {
        info!(source, "parameters changed");
    }

    fn canvas_size_changed(&self, width: u32, height: u32) {
        info!(width, height, "canvas resized");
    }

    fn canvas_resize_failed(&self, failure: ResizeFailure) {
        warn!(
            requested_width = failure.requested_width,
            requested_height = failure.requested_height,
            reason = %failure.reason,
            "canvas resize failed"
        );
    }

    fn draw_bitmap(&self) {
        info!("bitmap ready to present");
    }

    fn show_progress(&self, snapshot: RenderSnapshot) {
        info!(
            render_id = snapshot.render_id,
            guessed = snapshot.guessed,
            calculated = snapshot.calculated,
            elapsed_ms = snapshot.elapsed.as_millis(),
            "render progress"
        );
    }
}
