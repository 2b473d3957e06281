use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;

use super::store::LoadMode;

/// Distance-to-bottom under which the view counts as following the tail.
pub const NEAR_BOTTOM_THRESHOLD: f32 = 80.0;
/// Distance from the top under which older history is requested.
pub const LOAD_OLDER_THRESHOLD: f32 = 40.0;

/// Viewport geometry reported by the host, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScrollMetrics {
    pub scroll_height: f32,
    pub scroll_top: f32,
    pub client_height: f32,
}

impl ScrollMetrics {
    pub fn new(scroll_height: f32, scroll_top: f32, client_height: f32) -> Self {
        Self {
            scroll_height,
            scroll_top,
            client_height,
        }
    }

    pub fn distance_to_bottom(&self) -> f32 {
        self.scroll_height - self.scroll_top - self.client_height
    }

    pub fn is_near_bottom(&self) -> bool {
        self.distance_to_bottom() < NEAR_BOTTOM_THRESHOLD
    }

    pub fn is_near_top(&self) -> bool {
        self.scroll_top < LOAD_OLDER_THRESHOLD
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollBehavior {
    Instant,
    Smooth,
}

/// Instruction for the host to apply after it has rendered the buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScrollCommand {
    ToBottom(ScrollBehavior),
    SetScrollTop(f32),
}

/// Result of observing one scroll event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollObservation {
    pub near_bottom: bool,
    pub show_scroll_to_bottom: bool,
    pub near_top: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PendingAdjustment {
    None,
    Reset,
    Prepend { scroll_height: f32, scroll_top: f32 },
    Append { was_near_bottom: bool },
}

/// Keeps the viewport coherent across buffer mutations independent from
/// message content.
#[derive(Debug)]
pub struct ScrollManager {
    last_metrics: Option<ScrollMetrics>,
    near_bottom: bool,
    show_scroll_to_bottom: bool,
    pending: PendingAdjustment,
    pending_scroll_to_bottom: bool,
}

impl ScrollManager {
    pub fn new() -> Self {
        Self {
            last_metrics: None,
            near_bottom: true,
            show_scroll_to_bottom: false,
            pending: PendingAdjustment::None,
            pending_scroll_to_bottom: false,
        }
    }

    pub fn is_near_bottom(&self) -> bool {
        self.near_bottom
    }

    pub fn shows_scroll_to_bottom(&self) -> bool {
        self.show_scroll_to_bottom
    }

    pub fn last_metrics(&self) -> Option<ScrollMetrics> {
        self.last_metrics
    }

    /// True between a reset and the render that lands it at the bottom. Scroll
    /// positions seen in that window describe the pre-jump layout.
    pub fn awaits_reset_render(&self) -> bool {
        self.pending == PendingAdjustment::Reset
    }

    /// Records a scroll event and recomputes follow state.
    pub fn observe(&mut self, metrics: ScrollMetrics) -> ScrollObservation {
        self.last_metrics = Some(metrics);
        self.near_bottom = metrics.is_near_bottom();
        self.show_scroll_to_bottom = !self.near_bottom;

        ScrollObservation {
            near_bottom: self.near_bottom,
            show_scroll_to_bottom: self.show_scroll_to_bottom,
            near_top: metrics.is_near_top(),
        }
    }

    /// Marks a buffer mutation; the matching adjustment is produced by the next
    /// [`ScrollManager::after_render`].
    pub fn note_mutation(&mut self, mode: LoadMode) {
        self.pending = match mode {
            LoadMode::Reset => PendingAdjustment::Reset,
            // Geometry is captured while the old content is still on screen.
            LoadMode::Prepend => match (self.pending, self.last_metrics) {
                // The reset jump has not landed; the next render goes to the bottom anyway.
                (PendingAdjustment::Reset, _) => PendingAdjustment::Reset,
                (_, Some(metrics)) => PendingAdjustment::Prepend {
                    scroll_height: metrics.scroll_height,
                    scroll_top: metrics.scroll_top,
                },
                (_, None) => {
                    tracing::debug!(
                        "prepend before any observed geometry; leaving scroll untouched"
                    );
                    PendingAdjustment::None
                }
            },
            LoadMode::Append => match self.pending {
                // An earlier reset or anchor in the same frame still has to land first.
                PendingAdjustment::Reset | PendingAdjustment::Prepend { .. } => self.pending,
                PendingAdjustment::None | PendingAdjustment::Append { .. } => {
                    PendingAdjustment::Append {
                        was_near_bottom: self.near_bottom,
                    }
                }
            },
        };
    }

    /// Forces a non-animated jump to the tail on the next render.
    pub fn request_scroll_to_bottom(&mut self) {
        self.pending_scroll_to_bottom = true;
    }

    pub fn reset(&mut self) {
        self.last_metrics = None;
        self.near_bottom = true;
        self.show_scroll_to_bottom = false;
        self.pending = PendingAdjustment::Reset;
        self.pending_scroll_to_bottom = false;
    }

    /// Consumes the pending adjustment once the host has laid out the new
    /// buffer and reports the resulting geometry.
    pub fn after_render(&mut self, metrics: ScrollMetrics) -> Option<ScrollCommand> {
        let pending = std::mem::replace(&mut self.pending, PendingAdjustment::None);

        let command = match pending {
            PendingAdjustment::Prepend {
                scroll_height,
                scroll_top,
            } => {
                // Keeps the rows the user was reading stationary; a forced jump
                // waits for the following render.
                let anchored_top = scroll_top + (metrics.scroll_height - scroll_height);
                self.record_position(ScrollMetrics {
                    scroll_top: anchored_top,
                    ..metrics
                });
                return Some(ScrollCommand::SetScrollTop(anchored_top));
            }
            PendingAdjustment::Reset => Some(ScrollCommand::ToBottom(ScrollBehavior::Instant)),
            PendingAdjustment::Append { was_near_bottom } if was_near_bottom => {
                Some(ScrollCommand::ToBottom(ScrollBehavior::Instant))
            }
            PendingAdjustment::Append { .. } | PendingAdjustment::None => None,
        };

        let command = if self.pending_scroll_to_bottom {
            Some(ScrollCommand::ToBottom(ScrollBehavior::Instant))
        } else {
            command
        };
        self.pending_scroll_to_bottom = false;

        match command {
            Some(ScrollCommand::ToBottom(_)) => self.record_position(ScrollMetrics {
                scroll_top: (metrics.scroll_height - metrics.client_height).max(0.0),
                ..metrics
            }),
            Some(ScrollCommand::SetScrollTop(_)) | None => self.record_position(metrics),
        }
        command
    }

    /// Command issued when the user activates the "scroll to bottom" affordance.
    pub fn scroll_to_bottom_clicked(&mut self) -> ScrollCommand {
        if let Some(metrics) = self.last_metrics {
            self.record_position(ScrollMetrics {
                scroll_top: (metrics.scroll_height - metrics.client_height).max(0.0),
                ..metrics
            });
        }
        ScrollCommand::ToBottom(ScrollBehavior::Smooth)
    }

    fn record_position(&mut self, metrics: ScrollMetrics) {
        self.last_metrics = Some(metrics);
        self.near_bottom = metrics.is_near_bottom();
        self.show_scroll_to_bottom = !self.near_bottom;
    }
}

impl Default for ScrollManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle of one registered scroll listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

pub type ScrollListener = Box<dyn Fn(ScrollMetrics) + Send + Sync>;

/// Host-side scroll container the chat view observes.
pub trait ScrollHost: Send + Sync {
    fn metrics(&self) -> ScrollMetrics;
    fn add_scroll_listener(&self, listener: ScrollListener) -> ListenerId;
    fn remove_scroll_listener(&self, id: ListenerId);
}

/// Registered scroll listener; removed from the host exactly once, either by
/// [`ScrollSubscription::unsubscribe`] or on drop.
pub struct ScrollSubscription {
    host: Arc<dyn ScrollHost>,
    id: Option<ListenerId>,
}

impl ScrollSubscription {
    pub fn subscribe(host: Arc<dyn ScrollHost>, listener: ScrollListener) -> Self {
        let id = host.add_scroll_listener(listener);
        Self { host, id: Some(id) }
    }

    pub fn is_active(&self) -> bool {
        self.id.is_some()
    }

    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(id) = self.id.take() {
            self.host.remove_scroll_listener(id);
        }
    }
}

impl Drop for ScrollSubscription {
    fn drop(&mut self) {
        self.release();
    }
}

/// Scroll events forwarded from a host listener into the view's task.
pub struct ScrollEvents {
    events: mpsc::UnboundedReceiver<ScrollMetrics>,
}

impl ScrollEvents {
    pub fn try_recv(&mut self) -> Option<ScrollMetrics> {
        self.events.try_recv().ok()
    }
}

impl Stream for ScrollEvents {
    type Item = ScrollMetrics;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.poll_recv(cx)
    }
}

/// Subscribes a channel-backed listener to `host`.
pub fn subscribe_channel(host: Arc<dyn ScrollHost>) -> (ScrollSubscription, ScrollEvents) {
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let listener: ScrollListener = Box::new(move |metrics| {
        let _ = event_tx.send(metrics);
    });
    (
        ScrollSubscription::subscribe(host, listener),
        ScrollEvents { events: event_rx },
    )
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    #[test]
    fn prepend_keeps_visible_content_stationary() {
        let mut scroll = ScrollManager::new();
        scroll.observe(ScrollMetrics::new(2000.0, 500.0, 600.0));
        scroll.note_mutation(LoadMode::Prepend);

        let command = scroll.after_render(ScrollMetrics::new(2300.0, 500.0, 600.0));
        assert_eq!(command, Some(ScrollCommand::SetScrollTop(800.0)));
        assert_eq!(
            scroll.last_metrics().map(|metrics| metrics.scroll_top),
            Some(800.0)
        );
    }

    #[test]
    fn reset_scrolls_to_bottom_once_without_animation() {
        let mut scroll = ScrollManager::new();
        scroll.reset();

        let metrics = ScrollMetrics::new(3000.0, 0.0, 600.0);
        assert_eq!(
            scroll.after_render(metrics),
            Some(ScrollCommand::ToBottom(ScrollBehavior::Instant))
        );
        assert_eq!(scroll.after_render(metrics), None);
    }

    #[test]
    fn prepend_cannot_displace_a_pending_reset() {
        let mut scroll = ScrollManager::new();
        scroll.reset();
        scroll.observe(ScrollMetrics::new(2000.0, 0.0, 600.0));
        assert!(scroll.awaits_reset_render());

        scroll.note_mutation(LoadMode::Prepend);
        assert_eq!(
            scroll.after_render(ScrollMetrics::new(4000.0, 0.0, 600.0)),
            Some(ScrollCommand::ToBottom(ScrollBehavior::Instant))
        );
        assert!(!scroll.awaits_reset_render());
        assert!(!scroll.shows_scroll_to_bottom());
    }

    #[test]
    fn prepend_without_geometry_leaves_position_alone() {
        let mut scroll = ScrollManager::new();
        scroll.note_mutation(LoadMode::Prepend);
        assert_eq!(
            scroll.after_render(ScrollMetrics::new(2300.0, 0.0, 600.0)),
            None
        );
    }

    #[test]
    fn append_follows_tail_only_when_near_bottom() {
        let mut following = ScrollManager::new();
        let observed = following.observe(ScrollMetrics::new(2000.0, 1321.0, 600.0));
        assert!(observed.near_bottom);
        following.note_mutation(LoadMode::Append);
        assert_eq!(
            following.after_render(ScrollMetrics::new(2100.0, 1321.0, 600.0)),
            Some(ScrollCommand::ToBottom(ScrollBehavior::Instant))
        );
        assert!(!following.shows_scroll_to_bottom());

        let mut reading = ScrollManager::new();
        let observed = reading.observe(ScrollMetrics::new(2000.0, 1320.0, 600.0));
        assert!(!observed.near_bottom);
        assert!(observed.show_scroll_to_bottom);
        reading.note_mutation(LoadMode::Append);
        assert_eq!(
            reading.after_render(ScrollMetrics::new(2100.0, 1320.0, 600.0)),
            None
        );
        assert!(reading.shows_scroll_to_bottom());
    }

    #[test]
    fn forced_scroll_overrides_reading_position() {
        let mut scroll = ScrollManager::new();
        scroll.observe(ScrollMetrics::new(2000.0, 100.0, 600.0));
        scroll.note_mutation(LoadMode::Append);
        scroll.request_scroll_to_bottom();

        assert_eq!(
            scroll.after_render(ScrollMetrics::new(2100.0, 100.0, 600.0)),
            Some(ScrollCommand::ToBottom(ScrollBehavior::Instant))
        );
        assert!(scroll.is_near_bottom());
    }

    #[test]
    fn forced_scroll_waits_for_a_pending_anchor() {
        let mut scroll = ScrollManager::new();
        scroll.observe(ScrollMetrics::new(1000.0, 10.0, 600.0));
        scroll.note_mutation(LoadMode::Prepend);
        scroll.request_scroll_to_bottom();

        assert_eq!(
            scroll.after_render(ScrollMetrics::new(1500.0, 10.0, 600.0)),
            Some(ScrollCommand::SetScrollTop(510.0))
        );
        assert_eq!(
            scroll.after_render(ScrollMetrics::new(1500.0, 510.0, 600.0)),
            Some(ScrollCommand::ToBottom(ScrollBehavior::Instant))
        );
    }

    #[test]
    fn observation_flags_top_of_history() {
        let mut scroll = ScrollManager::new();
        assert!(scroll.observe(ScrollMetrics::new(2000.0, 39.0, 600.0)).near_top);
        assert!(!scroll.observe(ScrollMetrics::new(2000.0, 40.0, 600.0)).near_top);
        assert_eq!(
            scroll.scroll_to_bottom_clicked(),
            ScrollCommand::ToBottom(ScrollBehavior::Smooth)
        );
    }

    #[derive(Default)]
    struct RecordingHost {
        listeners: Mutex<HashMap<ListenerId, ScrollListener>>,
        next_id: Mutex<u64>,
        removals: Mutex<Vec<ListenerId>>,
    }

    impl RecordingHost {
        fn scroll_to(&self, metrics: ScrollMetrics) {
            for listener in self.listeners.lock().unwrap().values() {
                listener(metrics);
            }
        }
    }

    impl ScrollHost for RecordingHost {
        fn metrics(&self) -> ScrollMetrics {
            ScrollMetrics::default()
        }

        fn add_scroll_listener(&self, listener: ScrollListener) -> ListenerId {
            let mut next_id = self.next_id.lock().unwrap();
            *next_id += 1;
            let id = ListenerId(*next_id);
            self.listeners.lock().unwrap().insert(id, listener);
            id
        }

        fn remove_scroll_listener(&self, id: ListenerId) {
            self.listeners.lock().unwrap().remove(&id);
            self.removals.lock().unwrap().push(id);
        }
    }

    #[test]
    fn subscription_is_released_exactly_once() {
        let host = Arc::new(RecordingHost::default());

        let (subscription, mut events) = subscribe_channel(host.clone());
        assert!(subscription.is_active());
        host.scroll_to(ScrollMetrics::new(100.0, 5.0, 50.0));
        assert_eq!(events.try_recv(), Some(ScrollMetrics::new(100.0, 5.0, 50.0)));

        subscription.unsubscribe();
        assert_eq!(host.removals.lock().unwrap().len(), 1);
        host.scroll_to(ScrollMetrics::new(100.0, 6.0, 50.0));
        assert_eq!(events.try_recv(), None);

        {
            let (_dropped, _events) = subscribe_channel(host.clone());
        }
        assert_eq!(host.removals.lock().unwrap().len(), 2);
        assert!(host.listeners.lock().unwrap().is_empty());
    }
}
