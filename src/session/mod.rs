//! In-memory session state: spatial cache, action journal, and the on-disk control channel
//! (spec §4.9). Each piece is its own lock, matching spec §5's "each protected by their own
//! lock" shared-resource policy.

mod cache;
mod control;
mod journal;
mod pending_failures;
mod recording;

pub use cache::SpatialCache;
pub use control::{ControlChannel, ControlState};
pub use journal::ActionJournal;
pub use pending_failures::PendingFailures;
pub use recording::RecordingState;
