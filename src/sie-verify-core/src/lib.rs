//! # sie-verify-core
//!
//! Verification and enforcement for signed instruction envelopes (SIE).
//!
//! Instruction text is only trusted when it arrives inside an envelope that
//! is signed by a known issuer, declared for the instruction channel, and
//! not revoked in a signed trust registry. Everything else is data.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  EnforcementEngine                           │
//! │           (warn / strict skill admission)                    │
//! │                           │                                  │
//! │                           ▼                                  │
//! │  ┌──────────────────────────────────────────────────┐      │
//! │  │              EnvelopeVerifier                     │      │
//! │  └──────────────────────────────────────────────────┘      │
//! │        │              │               │          │          │
//! │        ▼              ▼               ▼          ▼          │
//! │  ┌────────────┐ ┌────────────┐ ┌────────────┐ ┌────────┐   │
//! │  │ChannelGuard│ │ Trusted    │ │ Registry   │ │ codec  │   │
//! │  │            │ │ IssuerStore│ │ Client     │ │(Ed25519│   │
//! │  └────────────┘ └────────────┘ └────────────┘ └────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Security Properties
//!
//! - **Fail-closed**: every error rejects the envelope
//! - **Channel separation**: data-channel envelopes never authorize instructions
//! - **Revocation wins**: a revoked key is rejected even if the issuer is present
//! - **Tamper binding**: the covered file must hash to the signed digest

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::pedantic)] // Too strict for production code
#![allow(clippy::missing_errors_doc)] // Error documentation not required
#![allow(clippy::module_name_repetitions)] // Allow Type in module::Type
#![allow(clippy::must_use_candidate)] // Not all functions need must_use

pub mod channel;
pub mod codec;
pub mod config;
pub mod enforcement;
pub mod envelope;
pub mod error;
pub mod hook;
pub mod keyring;
pub mod registry;
pub mod verifier;

pub use channel::ChannelGuard;
pub use config::{RegistryConfig, SieConfig};
pub use enforcement::{DecisionReason, EnforcementDecision, EnforcementEngine, EnforcementMode};
pub use envelope::{Envelope, Payload, CHANNEL_INSTRUCTION, DEFAULT_ENVELOPE_SUFFIX};
pub use error::VerifyError;
pub use hook::{enforce_skill, enforce_skill_with_config};
pub use keyring::{TrustedIssuerStore, DEFAULT_KEYRING_FILE};
pub use registry::{Record, RegistryClient, RegistrySnapshot};
pub use verifier::{EnvelopeVerifier, LoadedInstruction};
