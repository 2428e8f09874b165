//! Federated client role
//!
//! When this node must prove its identity to a peer vault node (backup and
//! restore), it replays the sign-in / auth protocol as the holder: post its
//! own DID document, answer the peer's challenge with a presentation of a
//! user-issued credential, and receive a token scoped by the peer.

pub mod client;
pub mod handshake;
pub mod transport;

pub use client::{BackupCredentialInfo, FederatedClient, PeerChallenge, PeerSession};
pub use handshake::{Handshake, HandshakeState};
pub use transport::{HttpPeerTransport, PeerTransport};
