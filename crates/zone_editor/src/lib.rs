//! Interactive editing of detection zones over a reference image.
//!
//! Zones are stored and mutated in the image's natural pixel space. Pointer
//! input arrives in rendered (on-screen) space and goes through
//! [`CoordinateMapper`] before it touches geometry.

mod editor;
mod gesture;
mod mapper;
pub mod palette;

pub use editor::{EditorError, EditorEvent, PressOutcome, ZoneEditor, HANDLE_HIT_RADIUS};
pub use gesture::{GestureKind, GestureSnapshot, NoopPointerCapture, PointerCapture};
pub use mapper::{CoordinateMapper, Point, RenderedRect, Size};
