use tokio_util::sync::CancellationToken;

use super::UserIdentifier;
use crate::error::{AppError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    pub id: UserIdentifier,
    pub is_admin: bool,
}

/// Caller identity and cancellation signal, passed to every operation.
#[derive(Debug, Clone)]
pub struct RequestContext {
    user: Option<UserInfo>,
    cancel: CancellationToken,
}

impl RequestContext {
    pub fn new(user: UserInfo) -> Self {
        Self {
            user: Some(user),
            cancel: CancellationToken::new(),
        }
    }

    /// Context used by startup tasks and event handlers, runs with admin rights.
    pub fn system() -> Self {
        Self::new(UserInfo {
            id: UserIdentifier::from("_system"),
            is_admin: true,
        })
    }

    /// Context without any user, every access check fails.
    pub fn anonymous() -> Self {
        Self {
            user: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        Ok(())
    }

    pub fn validate_admin_access(&self) -> Result<()> {
        match &self.user {
            Some(user) if user.is_admin => Ok(()),
            Some(user) => Err(AppError::Unauthorized(format!("user {} is not an administrator", user.id))),
            None => Err(AppError::Unauthorized("missing user information".to_string())),
        }
    }

    /// Admins may access everything, other users only what they own.
    pub fn validate_user_access(&self, owner: &UserIdentifier) -> Result<()> {
        match &self.user {
            Some(user) if user.is_admin || &user.id == owner => Ok(()),
            Some(user) => Err(AppError::Unauthorized(format!("user {} may not access data of {}", user.id, owner))),
            None => Err(AppError::Unauthorized("missing user information".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str, is_admin: bool) -> RequestContext {
        RequestContext::new(UserInfo {
            id: UserIdentifier::from(id),
            is_admin,
        })
    }

    #[test]
    fn test_admin_access() {
        assert!(RequestContext::system().validate_admin_access().is_ok());
        assert!(user("alice", false).validate_admin_access().unwrap_err().is_unauthorized());
        assert!(RequestContext::anonymous().validate_admin_access().is_err());
    }

    #[test]
    fn test_user_access() {
        let owner = UserIdentifier::from("alice");
        assert!(user("alice", false).validate_user_access(&owner).is_ok());
        assert!(user("root", true).validate_user_access(&owner).is_ok());
        assert!(user("bob", false).validate_user_access(&owner).is_err());
        assert!(RequestContext::anonymous().validate_user_access(&owner).is_err());
    }

    #[test]
    fn test_cancellation() {
        let token = CancellationToken::new();
        let ctx = RequestContext::system().with_cancellation(token.clone());
        assert!(ctx.check_cancelled().is_ok());

        token.cancel();
        assert!(ctx.check_cancelled().unwrap_err().is_cancelled());
    }
}
