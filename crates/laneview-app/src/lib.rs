//! Shared plumbing for laneview host shells.

use std::sync::{Arc, Mutex, PoisonError};

use laneview_client::{RedrawRequest, SharedSession};
use laneview_core::Viewport;

pub type SharedViewport = Arc<Mutex<Viewport>>;

pub mod render {
    use laneview_core::{SessionState, ViewSnapshot};
    use tracing::info;

    /// Consumes the current transform and session snapshot to produce
    /// pixels. Implementations only read shared state; they are invoked
    /// through the redraw callback after every viewport or session mutation.
    pub trait RenderSink: Send + Sync {
        /// Stable identifier describing the sink implementation.
        fn name(&self) -> &'static str;

        fn render(&self, view: &ViewSnapshot, session: &SessionState);
    }

    /// Headless sink that reports frame state through tracing instead of
    /// rasterizing.
    #[derive(Debug, Default)]
    pub struct LogRenderSink;

    impl RenderSink for LogRenderSink {
        fn name(&self) -> &'static str {
            "log"
        }

        fn render(&self, view: &ViewSnapshot, session: &SessionState) {
            info!(
                step = session.step,
                agents = session.agent_count,
                zoom = view.zoom,
                offset_x = view.offset_x,
                offset_y = view.offset_y,
                status = %session.status.text,
                aggregates = %session.aggregate_summary(),
                "frame",
            );
        }
    }
}

pub use render::{LogRenderSink, RenderSink};

/// Build the redraw callback handed to the poll loop: snapshot the viewport,
/// lock the session, and hand both to the sink.
pub fn make_redraw(
    viewport: &SharedViewport,
    session: &SharedSession,
    sink: Arc<dyn RenderSink>,
) -> RedrawRequest {
    let viewport = Arc::clone(viewport);
    let session = Arc::clone(session);
    Arc::new(move || {
        let view = viewport
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .snapshot();
        let session = session.lock().unwrap_or_else(PoisonError::into_inner);
        sink.render(&view, &session);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use laneview_core::{SessionState, ViewSnapshot};

    #[derive(Default)]
    struct CountingSink {
        frames: AtomicUsize,
    }

    impl RenderSink for CountingSink {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn render(&self, _view: &ViewSnapshot, _session: &SessionState) {
            self.frames.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn redraw_invokes_sink_with_current_state() {
        let viewport: SharedViewport = Arc::new(Mutex::new(Viewport::default()));
        let session: SharedSession = Arc::new(Mutex::new(SessionState::new()));
        let sink = Arc::new(CountingSink::default());
        let redraw = make_redraw(&viewport, &session, Arc::clone(&sink) as Arc<dyn RenderSink>);
        redraw();
        redraw();
        assert_eq!(sink.frames.load(Ordering::SeqCst), 2);
    }
}
