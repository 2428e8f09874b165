//! Client-side handshake state machine
//!
//! ```text
//! INIT -> SIGN_IN_SENT -> CHALLENGE_RECEIVED -> PRESENTATION_BUILT
//!      -> RESPONSE_SENT -> TOKEN_RECEIVED
//! ```
//!
//! Any non-terminal state may move to `FAILED`, which is absorbing. There is
//! no retry: a failed handshake starts over from `INIT`.

use tracing::{debug, warn};

use crate::types::{Result, VaultError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Init,
    SignInSent,
    ChallengeReceived,
    PresentationBuilt,
    ResponseSent,
    TokenReceived,
    Failed,
}

impl HandshakeState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::TokenReceived | Self::Failed)
    }

    pub fn can_advance_to(self, next: HandshakeState) -> bool {
        use HandshakeState::*;
        match (self, next) {
            (Init, SignInSent)
            | (SignInSent, ChallengeReceived)
            | (ChallengeReceived, PresentationBuilt)
            | (PresentationBuilt, ResponseSent)
            | (ResponseSent, TokenReceived) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

/// One handshake against one peer
#[derive(Debug, Clone)]
pub struct Handshake {
    host: String,
    state: HandshakeState,
}

impl Handshake {
    pub fn new(host: impl Into<String>) -> Self {
        Self::resume(host, HandshakeState::Init)
    }

    /// Continue a handshake whose earlier steps were driven elsewhere
    pub fn resume(host: impl Into<String>, state: HandshakeState) -> Self {
        Self {
            host: host.into(),
            state,
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    pub fn advance(&mut self, next: HandshakeState) -> Result<()> {
        if !self.state.can_advance_to(next) {
            return Err(VaultError::Internal(format!(
                "invalid handshake transition {:?} -> {:?}",
                self.state, next
            )));
        }
        debug!(host = %self.host, from = ?self.state, to = ?next, "Handshake step");
        self.state = next;
        Ok(())
    }

    /// Mark the handshake failed and pass the error through
    pub fn fail(&mut self, err: VaultError) -> VaultError {
        if !self.state.is_terminal() {
            warn!(host = %self.host, at = ?self.state, error = %err, "Peer handshake failed");
            self.state = HandshakeState::Failed;
        }
        err
    }
}
