//! Per-user session: working state and event dispatch.

pub mod events;
pub mod state;

pub use events::{ChatSession, SessionEvent, SessionSnapshot, SidebarEntry, SidebarGroup};
pub use state::{SessionPhase, SessionState};
