//! Per-tick input samples.
//!
//! An [`InputSample`] is the only thing that moves the simulation forward, and
//! it travels over the wire next to every checksum. Key sets are `BTreeSet`s
//! so that their serialized form is identical on every machine.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// A keyboard key the simulation understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Key {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    I,
    J,
    K,
    L,
    M,
    N,
    O,
    P,
    Q,
    R,
    S,
    T,
    U,
    V,
    W,
    X,
    Y,
    Z,
    Digit0,
    Digit1,
    Digit2,
    Digit3,
    Digit4,
    Digit5,
    Digit6,
    Digit7,
    Digit8,
    Digit9,
    Space,
    Comma,
    Period,
    Slash,
    Minus,
    Equal,
    Enter,
    Escape,
    Backspace,
    Shift,
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
}

impl Key {
    /// Every key, in sort order.
    pub const ALL: [Key; 50] = [
        Key::A,
        Key::B,
        Key::C,
        Key::D,
        Key::E,
        Key::F,
        Key::G,
        Key::H,
        Key::I,
        Key::J,
        Key::K,
        Key::L,
        Key::M,
        Key::N,
        Key::O,
        Key::P,
        Key::Q,
        Key::R,
        Key::S,
        Key::T,
        Key::U,
        Key::V,
        Key::W,
        Key::X,
        Key::Y,
        Key::Z,
        Key::Digit0,
        Key::Digit1,
        Key::Digit2,
        Key::Digit3,
        Key::Digit4,
        Key::Digit5,
        Key::Digit6,
        Key::Digit7,
        Key::Digit8,
        Key::Digit9,
        Key::Space,
        Key::Comma,
        Key::Period,
        Key::Slash,
        Key::Minus,
        Key::Equal,
        Key::Enter,
        Key::Escape,
        Key::Backspace,
        Key::Shift,
        Key::ArrowUp,
        Key::ArrowDown,
        Key::ArrowLeft,
        Key::ArrowRight,
    ];

    /// The character this key types, if any. Letters are lowercase.
    pub fn to_char(self) -> Option<char> {
        let index = Key::ALL.iter().position(|k| *k == self)?;
        match self {
            Key::A | Key::B | Key::C | Key::D | Key::E | Key::F | Key::G | Key::H | Key::I
            | Key::J | Key::K | Key::L | Key::M | Key::N | Key::O | Key::P | Key::Q | Key::R
            | Key::S | Key::T | Key::U | Key::V | Key::W | Key::X | Key::Y | Key::Z => {
                char::from_u32('a' as u32 + index as u32)
            }
            Key::Digit0
            | Key::Digit1
            | Key::Digit2
            | Key::Digit3
            | Key::Digit4
            | Key::Digit5
            | Key::Digit6
            | Key::Digit7
            | Key::Digit8
            | Key::Digit9 => char::from_digit(index as u32 - 26, 10),
            Key::Space => Some(' '),
            Key::Comma => Some(','),
            Key::Period => Some('.'),
            Key::Slash => Some('/'),
            Key::Minus => Some('-'),
            Key::Equal => Some('='),
            _ => None,
        }
    }
}

/// Key state for one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSample {
    /// Keys held down during this tick.
    #[serde(default)]
    pub pressed: BTreeSet<Key>,
    /// Keys that went down this tick (a subset of `pressed`).
    #[serde(default)]
    pub newly_pressed: BTreeSet<Key>,
}

impl InputSample {
    /// Sample with the given keys held, none of them newly pressed.
    pub fn held(keys: impl IntoIterator<Item = Key>) -> Self {
        Self {
            pressed: keys.into_iter().collect(),
            newly_pressed: BTreeSet::new(),
        }
    }

    /// Sample where every key in `keys` goes down this tick.
    pub fn tapped(keys: impl IntoIterator<Item = Key>) -> Self {
        let pressed: BTreeSet<Key> = keys.into_iter().collect();
        Self {
            newly_pressed: pressed.clone(),
            pressed,
        }
    }

    /// Sample for `held`, given the keys held on the previous tick.
    pub fn transition(previous: &BTreeSet<Key>, held: BTreeSet<Key>) -> Self {
        let newly_pressed = held.difference(previous).copied().collect();
        Self {
            pressed: held,
            newly_pressed,
        }
    }

    pub fn is_pressed(&self, key: Key) -> bool {
        self.pressed.contains(&key)
    }

    pub fn is_newly_pressed(&self, key: Key) -> bool {
        self.newly_pressed.contains(&key)
    }

    pub fn is_empty(&self) -> bool {
        self.pressed.is_empty() && self.newly_pressed.is_empty()
    }
}
