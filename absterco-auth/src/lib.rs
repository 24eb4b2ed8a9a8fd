//! # absterco-auth
//!
//! Admin session gate. A client id token is verified with the
//! [`IdentityProvider`], checked against the [`AdminAllowList`] and exchanged
//! for a signed session cookie. In development the gate can run in bypass
//! mode, which hands out a fixed mock administrator instead.

pub mod allowlist;
pub mod cookie;
pub mod gate;
pub mod options;
pub mod provider;
pub mod session;
pub mod strategy;

pub use allowlist::{AdminAllowList, StaticAllowList};
pub use cookie::{parse_cookie, read_cookie, SessionCookie};
pub use gate::{SessionGate, VerifiedSession, ADMINISTRATORS_ONLY};
pub use options::{AuthOptions, CookieOptions, Environment, IdTokenOptions, SameSite, SessionOptions};
pub use provider::{IdentityProvider, JwtIdentityProvider, VerifiedIdentity};
pub use session::{RejectReason, SessionContext, SessionState, TransitionError, UserSnapshot, VerificationResult};
pub use strategy::{AuthStrategy, BypassStrategy, VerifiedStrategy};
