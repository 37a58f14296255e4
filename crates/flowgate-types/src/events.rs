use serde::{Deserialize, Serialize};

/// Input events routed from a host towards remote clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum InputEvent {
    /// A key press or release
    Key(KeyEvent),

    /// Mouse or touch pointer activity
    Pointer(PointerEvent),

    /// Wheel or trackpad scroll
    Scroll(ScrollEvent),
}

impl InputEvent {
    /// Key events are the only class held back while another event is in flight.
    pub fn is_key_event(&self) -> bool {
        matches!(self, Self::Key(_))
    }

    /// Short name used in log lines.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Key(k) => match k.kind {
                KeyEventKind::Pressed => "key_pressed",
                KeyEventKind::Released => "key_released",
            },
            Self::Pointer(p) => match p.kind {
                PointerEventKind::Pressed => "pointer_pressed",
                PointerEventKind::Released => "pointer_released",
                PointerEventKind::Moved => "pointer_moved",
            },
            Self::Scroll(_) => "scroll",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyEventKind {
    Pressed,
    Released,
}

/// Modifier keys held while the event was generated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    pub shift: bool,
    pub control: bool,
    pub alt: bool,
    pub meta: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    pub kind: KeyEventKind,
    pub key_code: u32,
    #[serde(default)]
    pub modifiers: Modifiers,
    /// Whether this press was generated by key repeat.
    #[serde(default)]
    pub is_repeat: bool,
}

impl KeyEvent {
    pub fn pressed(key_code: u32) -> Self {
        Self {
            kind: KeyEventKind::Pressed,
            key_code,
            modifiers: Modifiers::default(),
            is_repeat: false,
        }
    }

    pub fn released(key_code: u32) -> Self {
        Self {
            kind: KeyEventKind::Released,
            key_code,
            modifiers: Modifiers::default(),
            is_repeat: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointerEventKind {
    Pressed,
    Released,
    Moved,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointerEvent {
    pub kind: PointerEventKind,
    pub x: f32,
    pub y: f32,
    /// Pointer id; 0 for the mouse, touch points start at 1.
    #[serde(default)]
    pub pointer_id: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrollEvent {
    pub x: f32,
    pub y: f32,
    pub delta_x: f32,
    pub delta_y: f32,
}
