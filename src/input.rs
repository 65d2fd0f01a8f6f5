use std::collections::BTreeSet;

use tesselbox_physics::MoveInput;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    A,
    D,
    W,
    S,
    Space,
    F,
    Escape,
    /// Hotbar keys `1` to `9`.
    Digit(u8),
}

impl Key {
    pub const ALL: [Key; 16] = [
        Key::A,
        Key::D,
        Key::W,
        Key::S,
        Key::Space,
        Key::F,
        Key::Escape,
        Key::Digit(1),
        Key::Digit(2),
        Key::Digit(3),
        Key::Digit(4),
        Key::Digit(5),
        Key::Digit(6),
        Key::Digit(7),
        Key::Digit(8),
        Key::Digit(9),
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        let key = match name.to_ascii_lowercase().as_str() {
            "a" | "left" => Key::A,
            "d" | "right" => Key::D,
            "w" | "up" => Key::W,
            "s" | "down" => Key::S,
            "space" => Key::Space,
            "f" => Key::F,
            "escape" | "esc" => Key::Escape,
            other => {
                let digit: u8 = other.parse().ok()?;
                if !(1..=9).contains(&digit) {
                    return None;
                }
                Key::Digit(digit)
            }
        };
        Some(key)
    }

    /// Zero-based hotbar slot selected by this key.
    pub fn hotbar_slot(self) -> Option<usize> {
        match self {
            Key::Digit(n) => Some(n as usize - 1),
            _ => None,
        }
    }
}

/// Anything the session loop can poll for held keys.
pub trait InputSource {
    fn is_pressed(&self, key: Key) -> bool;

    fn movement(&self) -> MoveInput {
        MoveInput {
            left: self.is_pressed(Key::A),
            right: self.is_pressed(Key::D),
            up: self.is_pressed(Key::W),
            down: self.is_pressed(Key::S),
        }
    }

    fn pressed(&self) -> BTreeSet<Key> {
        Key::ALL
            .into_iter()
            .filter(|key| self.is_pressed(*key))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoInput;

impl InputSource for NoInput {
    fn is_pressed(&self, _key: Key) -> bool {
        false
    }
}

/// Keys held during one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySnapshot {
    held: BTreeSet<Key>,
}

impl KeySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: Key) -> Self {
        self.held.insert(key);
        self
    }

    pub fn set(&mut self, key: Key, pressed: bool) {
        if pressed {
            self.held.insert(key);
        } else {
            self.held.remove(&key);
        }
    }

    /// Build from `(name, pressed)` pairs, rejecting unknown key names.
    pub fn from_named<'a, I>(entries: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = (&'a str, bool)>,
    {
        let mut snapshot = Self::new();
        for (name, pressed) in entries {
            let key = Key::from_name(name).ok_or_else(|| format!("unknown key `{name}`"))?;
            snapshot.set(key, pressed);
        }
        Ok(snapshot)
    }
}

impl InputSource for KeySnapshot {
    fn is_pressed(&self, key: Key) -> bool {
        self.held.contains(&key)
    }
}
