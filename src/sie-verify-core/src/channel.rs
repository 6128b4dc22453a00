//! Channel separation guard.
//!
//! A signed envelope on the data channel must never authorize instructions.
//! The channel is part of the signed canonical form, so it cannot be
//! relabelled after signing.

use tracing::warn;

use crate::envelope::{Envelope, CHANNEL_INSTRUCTION};
use crate::error::VerifyError;

/// Rejects envelopes not explicitly declared as instruction-channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChannelGuard;

impl ChannelGuard {
    /// Fail with `ChannelMismatch` unless `channel == "instruction"`.
    pub fn require_instruction_channel(envelope: &Envelope) -> Result<(), VerifyError> {
        match envelope.channel.as_deref() {
            Some(CHANNEL_INSTRUCTION) => Ok(()),
            other => {
                warn!(
                    envelope_id = %envelope.id,
                    channel = ?other,
                    "Envelope is not on the instruction channel"
                );
                Err(VerifyError::ChannelMismatch {
                    actual: other.map(str::to_string),
                })
            },
        }
    }
}
