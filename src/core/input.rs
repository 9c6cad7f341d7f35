use crate::core::subscription::Subscription;
use std::fmt;
use std::str::FromStr;

pub const NUM_LANES: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Lane {
    Left = 0,
    Down = 1,
    Up = 2,
    Right = 3,
}

impl Lane {
    pub const ALL: [Lane; NUM_LANES] = [Lane::Left, Lane::Down, Lane::Up, Lane::Right];

    #[inline(always)]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[inline(always)]
    pub const fn from_index(i: usize) -> Option<Lane> {
        match i {
            0 => Some(Lane::Left),
            1 => Some(Lane::Down),
            2 => Some(Lane::Up),
            3 => Some(Lane::Right),
            _ => None,
        }
    }
}

/// A single letter/digit key bound to a lane. Stored upper-case.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LaneKey(char);

impl LaneKey {
    pub const fn new_unchecked(c: char) -> Self {
        Self(c)
    }

    pub fn from_char(c: char) -> Option<Self> {
        c.is_ascii_alphanumeric().then(|| Self(c.to_ascii_uppercase()))
    }

    #[inline(always)]
    pub const fn as_char(self) -> char {
        self.0
    }
}

impl fmt::Display for LaneKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for LaneKey {
    type Err = ();

    // Accepts "D" as well as the "KeyD" spelling used by keyboard APIs.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let s = s.strip_prefix("Key").unwrap_or(s);
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Self::from_char(c).ok_or(()),
            _ => Err(()),
        }
    }
}

pub const DEFAULT_LANE_KEYS: [LaneKey; NUM_LANES] = [
    LaneKey::new_unchecked('D'),
    LaneKey::new_unchecked('F'),
    LaneKey::new_unchecked('J'),
    LaneKey::new_unchecked('K'),
];

/// A key press that reached the stage, stamped with the playback time at
/// which it happened.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InputEdge {
    pub lane: Lane,
    pub event_music_time_ms: f64,
}

pub type KeyHandler = Box<dyn FnMut(f64)>;

pub trait KeyInput {
    /// Registers `handler` for presses of `key`. The handler stops firing as
    /// soon as the returned subscription is cancelled.
    fn subscribe(&mut self, key: LaneKey, handler: KeyHandler) -> Subscription;
}

struct Listener {
    key: LaneKey,
    sub: Subscription,
    handler: KeyHandler,
}

/// In-process key dispatcher. The host feeds raw presses in with `press`.
#[derive(Default)]
pub struct KeyBus {
    listeners: Vec<Listener>,
}

impl KeyBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.iter().filter(|l| l.sub.is_active()).count()
    }

    /// Delivers a press to every live listener of `key`; returns how many
    /// handlers ran.
    pub fn press(&mut self, key: LaneKey, time_ms: f64) -> usize {
        self.listeners.retain(|l| l.sub.is_active());
        let mut fired = 0;
        for l in self.listeners.iter_mut().filter(|l| l.key == key) {
            (l.handler)(time_ms);
            fired += 1;
        }
        fired
    }
}

impl KeyInput for KeyBus {
    fn subscribe(&mut self, key: LaneKey, handler: KeyHandler) -> Subscription {
        let sub = Subscription::new("key");
        self.listeners.push(Listener {
            key,
            sub: sub.clone(),
            handler,
        });
        sub
    }
}

#[cfg(test)]
mod tests {
    use super::{KeyBus, KeyInput, Lane, LaneKey};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn lane_key_parses_both_spellings() {
        assert_eq!("d".parse::<LaneKey>(), Ok(LaneKey::new_unchecked('D')));
        assert_eq!("KeyJ".parse::<LaneKey>(), Ok(LaneKey::new_unchecked('J')));
        assert!("Enter".parse::<LaneKey>().is_err());
        assert!("".parse::<LaneKey>().is_err());
    }

    #[test]
    fn lanes_round_trip_through_their_index() {
        for lane in Lane::ALL {
            assert_eq!(Lane::from_index(lane.index()), Some(lane));
        }
        assert_eq!(Lane::from_index(4), None);
    }

    #[test]
    fn cancelled_listener_never_fires_again() {
        let hits = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&hits);
        let mut bus = KeyBus::new();
        let d = LaneKey::new_unchecked('D');
        let sub = bus.subscribe(d, Box::new(move |t| sink.borrow_mut().push(t)));

        assert_eq!(bus.press(d, 10.0), 1);
        assert_eq!(bus.press(LaneKey::new_unchecked('F'), 11.0), 0);
        assert!(sub.cancel());
        assert!(!sub.cancel(), "repeated cancel is tolerated");
        assert_eq!(bus.press(d, 12.0), 0);
        assert_eq!(bus.listener_count(), 0);
        assert_eq!(*hits.borrow(), vec![10.0]);
    }
}
