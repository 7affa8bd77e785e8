//! External login entity - links users to external identity providers.
//!
//! Supports multiple providers per user (Google, Apple, ...). A provider
//! account can be linked to at most one user.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "user_logins")]
pub struct Model {
    /// Identity provider name (e.g., "Google", "Apple")
    #[sea_orm(primary_key, auto_increment = false)]
    pub login_provider: String,
    /// Provider-specific user identifier (subject claim in OIDC)
    #[sea_orm(primary_key, auto_increment = false)]
    pub provider_key: String,
    pub provider_display_name: Option<String>,
    /// Reference to users.id
    pub user_id: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
