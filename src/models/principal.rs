//! Authenticated principals and the resources they act on

use super::{action::ActionOwner, service_account::ServiceAccount, user::User};
use crate::auth::token::TokenKind;
use serde::Serialize;
use uuid::Uuid;

/// An authenticated actor
#[derive(Debug, Clone)]
pub enum Principal {
    User(User),
    Service(ServiceAccount),
}

impl Principal {
    pub fn id(&self) -> Uuid {
        match self {
            Principal::User(user) => user.id,
            Principal::Service(account) => account.id,
        }
    }

    pub fn kind(&self) -> TokenKind {
        match self {
            Principal::User(_) => TokenKind::User,
            Principal::Service(_) => TokenKind::Service,
        }
    }

    pub fn owner(&self) -> ActionOwner {
        match self {
            Principal::User(user) => ActionOwner::User(user.id),
            Principal::Service(account) => ActionOwner::ServiceAccount(account.id),
        }
    }

    pub fn as_user(&self) -> Option<&User> {
        match self {
            Principal::User(user) => Some(user),
            Principal::Service(_) => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.as_user().is_some_and(User::is_admin)
    }
}

/// A resource that belongs to at most one team
pub trait TeamOwned {
    fn owning_team(&self) -> Option<Uuid>;
}

/// Boundary team entity
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Team {
    pub id: Uuid,
    pub name: String,
}

impl TeamOwned for Team {
    fn owning_team(&self) -> Option<Uuid> {
        Some(self.id)
    }
}

/// Reference to a team-scoped resource known only by its team
#[derive(Debug, Clone, Copy)]
pub struct TeamRef(pub Option<Uuid>);

impl TeamOwned for TeamRef {
    fn owning_team(&self) -> Option<Uuid> {
        self.0
    }
}

/// Principal summary returned by `/auth/me`
#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PrincipalResponse {
    User(super::user::UserResponse),
    Service(super::service_account::ServiceAccountResponse),
}

impl From<Principal> for PrincipalResponse {
    fn from(principal: Principal) -> Self {
        match principal {
            Principal::User(user) => PrincipalResponse::User(user.into()),
            Principal::Service(account) => PrincipalResponse::Service(account.into()),
        }
    }
}
