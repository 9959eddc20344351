pub mod metrics;
pub mod notifier;

pub use metrics::{EventCounter, EventSnapshot};
pub use notifier::{Notifier, NullNotifier, SoundNotifier};
