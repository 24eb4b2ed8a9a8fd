//! Admin session state as seen by the console.
//!
//! `Unauthenticated -> Verifying -> Authenticated | Rejected`. Any 401 from
//! the admin surface drops the context back to `Unauthenticated` and yields
//! the login path to redirect to.
//!
//! [`SessionGate::sign_in`](crate::SessionGate::sign_in) and
//! [`SessionGate::refresh`](crate::SessionGate::refresh) drive a context per
//! request; a console client can hold one across requests the same way.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// User shape returned by verification and status checks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSnapshot {
    pub uid: String,
    pub email: String,
    pub name: String,
    pub is_admin: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "camelCase")]
pub enum RejectReason {
    /// The token failed verification.
    Invalid { message: String },
    /// A valid identity that is not an administrator.
    NotAdministrator { email: String },
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Unauthenticated,
    Verifying,
    Authenticated(UserSnapshot),
    Rejected(RejectReason),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("verification already in progress")]
    AlreadyVerifying,
    #[error("no verification in progress")]
    NotVerifying,
}

/// Outcome of one verification attempt, fed into [`SessionContext::resolve`].
pub type VerificationResult = Result<UserSnapshot, RejectReason>;

#[derive(Clone, Debug)]
pub struct SessionContext {
    state: SessionState,
    login_path: String,
}

impl SessionContext {
    pub fn new(login_path: impl Into<String>) -> Self {
        Self {
            state: SessionState::Unauthenticated,
            login_path: login_path.into(),
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn begin_verification(&mut self) -> Result<(), TransitionError> {
        if self.state == SessionState::Verifying {
            return Err(TransitionError::AlreadyVerifying);
        }
        self.state = SessionState::Verifying;
        Ok(())
    }

    pub fn resolve(&mut self, result: VerificationResult) -> Result<&SessionState, TransitionError> {
        if self.state != SessionState::Verifying {
            return Err(TransitionError::NotVerifying);
        }
        self.state = match result {
            Ok(user) => SessionState::Authenticated(user),
            Err(reason) => SessionState::Rejected(reason),
        };
        Ok(&self.state)
    }

    /// Apply a status check made on page load.
    pub fn apply_status(&mut self, user: Option<UserSnapshot>) {
        self.state = match user {
            Some(user) => SessionState::Authenticated(user),
            None => SessionState::Unauthenticated,
        };
    }

    pub fn sign_out(&mut self) -> &str {
        self.state = SessionState::Unauthenticated;
        &self.login_path
    }

    /// A 401 anywhere in the admin surface: forget the user and return where
    /// to send them.
    pub fn on_unauthorized(&mut self) -> &str {
        self.state = SessionState::Unauthenticated;
        &self.login_path
    }

    pub fn user(&self) -> Option<&UserSnapshot> {
        match &self.state {
            SessionState::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin() -> UserSnapshot {
        UserSnapshot {
            uid: "u1".into(),
            email: "owner@absterco.com".into(),
            name: "Owner".into(),
            is_admin: true,
        }
    }

    #[test]
    fn verification_transitions() {
        let mut ctx = SessionContext::new("/admin/login");
        assert_eq!(ctx.resolve(Ok(admin())), Err(TransitionError::NotVerifying));

        ctx.begin_verification().unwrap();
        assert_eq!(ctx.begin_verification(), Err(TransitionError::AlreadyVerifying));

        ctx.resolve(Ok(admin())).unwrap();
        assert!(ctx.is_authenticated());
        assert_eq!(ctx.user().map(|u| u.uid.as_str()), Some("u1"));

        assert_eq!(ctx.on_unauthorized(), "/admin/login");
        assert_eq!(ctx.state(), &SessionState::Unauthenticated);
    }

    #[test]
    fn rejection_is_distinct_from_invalid_token() {
        let mut ctx = SessionContext::new("/admin/login");
        ctx.begin_verification().unwrap();
        let state = ctx
            .resolve(Err(RejectReason::NotAdministrator {
                email: "visitor@gmail.com".into(),
            }))
            .unwrap();
        assert!(matches!(state, SessionState::Rejected(RejectReason::NotAdministrator { .. })));

        ctx.begin_verification().unwrap();
        let state = ctx
            .resolve(Err(RejectReason::Invalid {
                message: "expired".into(),
            }))
            .unwrap();
        assert!(matches!(state, SessionState::Rejected(RejectReason::Invalid { .. })));
        assert!(!ctx.is_authenticated());
    }

    #[test]
    fn status_and_sign_out() {
        let mut ctx = SessionContext::new("/admin/login");
        ctx.apply_status(Some(admin()));
        assert!(ctx.is_authenticated());
        assert_eq!(ctx.sign_out(), "/admin/login");
        assert!(!ctx.is_authenticated());
    }

    #[test]
    fn snapshot_uses_camel_case() {
        let json = serde_json::to_value(admin()).unwrap();
        assert_eq!(json["isAdmin"], true);
    }
}
