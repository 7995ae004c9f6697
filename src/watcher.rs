//! Filesystem change notifications.
//!
//! This module defines the change-event model shared by every notification
//! source, the [`NotificationSource`] capability trait the registry and the
//! content browser consume, and two implementations:
//! - `FsNotificationSource` - OS-backed watching via `notify`
//! - `ChannelNotificationSource` - in-process events for embedding hosts
//!   that marshal their own notifications, and for tests

mod events;
mod pump;
mod source;

pub use events::{parent_is, ChangeEvent, ChangeKind};
pub use source::{ChannelNotificationSource, FsNotificationSource, NotificationSource};

pub(crate) use pump::EventPump;
