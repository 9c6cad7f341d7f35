use super::{MarkerId, Rect, Renderer, Tag};
use crate::core::input::Lane;
use log::trace;
use rustc_hash::FxHashMap;
use std::collections::VecDeque;

// Judgement popups are short-lived; only the most recent ones are kept.
pub const NOTIFICATION_CAPACITY: usize = 16;

#[derive(Clone, Debug, PartialEq)]
pub struct Marker {
    pub tag: Tag,
    pub lane: Option<Lane>,
    pub rect: Rect,
    pub color: [f32; 4],
}

/// Renderer that keeps the scene as plain data. Used by the terminal runner
/// and by tests that want to look at what gameplay drew.
#[derive(Debug, Default)]
pub struct HeadlessRenderer {
    markers: FxHashMap<MarkerId, Marker>,
    next_id: u64,
    /// Most recent notifications, oldest first.
    pub notifications: VecDeque<String>,
    pub score: u64,
    pub combo: u32,
}

impl HeadlessRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, tag: Tag) -> usize {
        self.markers.values().filter(|m| m.tag == tag).count()
    }

    pub fn marker(&self, id: MarkerId) -> Option<&Marker> {
        self.markers.get(&id)
    }

    pub fn live_markers(&self) -> usize {
        self.markers.len()
    }
}

impl Renderer for HeadlessRenderer {
    fn add_marker(&mut self, tag: Tag, lane: Option<Lane>, rect: Rect, color: [f32; 4]) -> MarkerId {
        let id = MarkerId(self.next_id);
        self.next_id += 1;
        self.markers.insert(
            id,
            Marker {
                tag,
                lane,
                rect,
                color,
            },
        );
        id
    }

    fn move_marker(&mut self, id: MarkerId, x: f32, y: f32) {
        if let Some(m) = self.markers.get_mut(&id) {
            m.rect.x = x;
            m.rect.y = y;
        }
    }

    fn destroy(&mut self, id: MarkerId) {
        self.markers.remove(&id);
    }

    fn destroy_tagged(&mut self, tag: Tag) -> usize {
        let before = self.markers.len();
        self.markers.retain(|_, m| m.tag != tag);
        before - self.markers.len()
    }

    fn notify(&mut self, text: &str, _color: [f32; 4]) {
        trace!("notify: {text}");
        if self.notifications.len() == NOTIFICATION_CAPACITY {
            self.notifications.pop_front();
        }
        self.notifications.push_back(text.to_string());
    }

    fn set_score(&mut self, score: u64, combo: u32) {
        self.score = score;
        self.combo = combo;
    }
}
