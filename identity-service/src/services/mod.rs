//! Services layer for identity-service.
//!
//! Business logic for credentials, sessions, two-factor challenges, and
//! authorization, plus the collaborator interfaces this core consumes.

mod auth;
mod authz;
mod challenge;
pub mod catalog;
pub mod error;
mod notify;
mod policy;
mod security_events;
mod token;

pub use auth::AuthService;
pub use authz::PolicyEngine;
pub use challenge::{ChallengeCoordinator, ChallengeDelivery, ChallengeKind};
pub use catalog::{MessageCatalog, StaticCatalog};
pub use error::ServiceError;
pub use notify::{
    AuthEmail, AuthTextMsg, DispatchedMessage, MockDispatcher, NotificationDispatcher, TfaTextMsg,
    VerificationEmail,
};
pub use policy::{PasswordPolicy, PolicyError};
pub use security_events::{
    RecordingEventSink, SecurityEvent, SecurityEventSink, TracingEventSink,
};
pub use token::{TokenClaims, TokenError, TokenPurpose, TokenService};
