mod headless;

pub use headless::HeadlessRenderer;

use crate::core::input::Lane;

// --- Public Data Contract ---

/// Groups of stage visuals that are torn down together.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tag {
    Lane,
    HitLine,
    Note,
    Notification,
    Score,
}

impl Tag {
    /// Everything a stage may leave on screen.
    pub const STAGE: [Tag; 5] = [
        Tag::HitLine,
        Tag::Note,
        Tag::Lane,
        Tag::Notification,
        Tag::Score,
    ];
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MarkerId(pub u64);

/// What gameplay needs from whoever draws it. Positions are computed by the
/// stage; implementations only place, move and remove rectangles.
pub trait Renderer {
    fn add_marker(&mut self, tag: Tag, lane: Option<Lane>, rect: Rect, color: [f32; 4]) -> MarkerId;
    fn move_marker(&mut self, id: MarkerId, x: f32, y: f32);
    fn destroy(&mut self, id: MarkerId);
    /// Removes every marker carrying `tag`; returns how many went away.
    fn destroy_tagged(&mut self, tag: Tag) -> usize;
    fn notify(&mut self, text: &str, color: [f32; 4]);
    fn set_score(&mut self, score: u64, combo: u32);
}
