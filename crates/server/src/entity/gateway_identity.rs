//! External identity linked to a gateway user.
//!
//! `(provider, subject)` is unique. The subject is the provider's immutable
//! account id; login and the other profile fields are refreshed on every
//! sign-in.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Identity providers the gateway can federate with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdentityProvider {
    GitHub,
}

impl IdentityProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityProvider::GitHub => "github",
        }
    }

    /// Parse the `{provider}` path segment. Unknown providers are rejected.
    pub fn from_path(segment: &str) -> Option<Self> {
        match segment {
            "github" => Some(IdentityProvider::GitHub),
            _ => None,
        }
    }
}

impl std::fmt::Display for IdentityProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "gateway_identity")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: String,
    pub provider: String,
    /// Provider-side immutable account id
    pub subject: String,
    pub login: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub profile_url: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::gateway_user::Entity",
        from = "Column::UserId",
        to = "super::gateway_user::Column::Id"
    )]
    User,
}

impl Related<super::gateway_user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
