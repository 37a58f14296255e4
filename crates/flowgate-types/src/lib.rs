pub mod error;
pub mod events;
pub mod models;
pub mod range;

pub use error::{Completion, NetError};
pub use events::{InputEvent, KeyEvent, KeyEventKind, Modifiers, PointerEvent, PointerEventKind, ScrollEvent};
pub use models::{ClientId, EventId, HostId, TargetId};
pub use range::{ByteRange, ReadWindow};
