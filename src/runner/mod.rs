//! # Peer runner seam and the in-tree simulated peer.
//!
//! - [`PeerRunner`] - trait implemented by anything that can play the remote side
//! - [`PeerIdentity`], [`Fields`] - the values that cross the seam
//! - [`DummyRunner`] - in-memory simulated peer used by the server binary and tests
//! - [`encode_features`] - feature bitfield encoding shared by runners

mod dummy;
mod features;
mod peer;

pub use dummy::{DummyRunner, DummyRunnerConfig};
pub use features::encode_features;
pub use peer::{Fields, PeerIdentity, PeerRunner};
