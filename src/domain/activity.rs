use serde::{Deserialize, Serialize};
use std::fmt;

/// Interaction events that count as operator activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityEvent {
    PointerDown,
    KeyDown,
    Scroll,
    TouchStart,
    MouseMove,
}

impl ActivityEvent {
    pub const ALL: [Self; 5] = [Self::PointerDown, Self::KeyDown, Self::Scroll, Self::TouchStart, Self::MouseMove];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PointerDown => "pointerdown",
            Self::KeyDown => "keydown",
            Self::Scroll => "scroll",
            Self::TouchStart => "touchstart",
            Self::MouseMove => "mousemove",
        }
    }
}

impl fmt::Display for ActivityEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
