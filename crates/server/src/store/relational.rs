//! Relational user store on SeaORM.

use super::{DataSourceType, UserStore};
use crate::entity::{role, user, user_login, user_role};
use crate::error::StoreError;
use crate::models::{Role, User, UserLoginInfo, normalize_role_name};
use crate::outcome::{IdentityError, IdentityResult};
use async_trait::async_trait;
use migration::MigratorTrait;
use sea_orm::{
    ActiveModelTrait,
    ActiveValue::{Set, Unchanged},
    ColumnTrait, ConnectionTrait, Database, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    SqlErr, TransactionTrait,
};
use std::sync::Arc;

pub struct RelationalUserStore {
    db: Arc<DatabaseConnection>,
}

impl RelationalUserStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Connect to a SQL database. Postgres and SQLite URLs are supported.
    pub async fn connect(connection_string: &str) -> Result<Self, StoreError> {
        let db = Database::connect(connection_string).await?;
        Ok(Self::new(Arc::new(db)))
    }
}

fn to_user(model: user::Model) -> User {
    User {
        id: model.id,
        user_name: Some(model.user_name),
        email: model.email,
        password_hash: model.password_hash,
        culture: model.culture,
    }
}

fn to_role(model: role::Model) -> Role {
    Role {
        id: model.id,
        name: model.name,
        description: model.description,
    }
}

fn new_user_row(user: &User) -> user::ActiveModel {
    user::ActiveModel {
        id: Set(user.id.clone()),
        user_name: Set(user.user_name.clone().unwrap_or_default()),
        email: Set(user.email.clone()),
        normalized_email: Set(user.normalized_email()),
        password_hash: Set(user.password_hash.clone()),
        culture: Set(user.culture.clone()),
    }
}

fn new_login_row(user: &User, login: &UserLoginInfo) -> user_login::ActiveModel {
    user_login::ActiveModel {
        login_provider: Set(login.provider.clone()),
        provider_key: Set(login.provider_key.clone()),
        provider_display_name: Set(login.provider_display_name.clone()),
        user_id: Set(user.id.clone()),
    }
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

/// A row referencing a user id that does not exist.
fn is_missing_reference(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::ForeignKeyConstraintViolation(_)))
}

async fn login_exists<C: ConnectionTrait>(
    db: &C,
    provider: &str,
    provider_key: &str,
) -> Result<bool, DbErr> {
    Ok(
        user_login::Entity::find_by_id((provider.to_string(), provider_key.to_string()))
            .one(db)
            .await?
            .is_some(),
    )
}

impl RelationalUserStore {
    async fn find_role_row(&self, name: &str) -> Result<Option<role::Model>, DbErr> {
        role::Entity::find()
            .filter(role::Column::NormalizedName.eq(normalize_role_name(name)))
            .one(self.db.as_ref())
            .await
    }
}

#[async_trait]
impl UserStore for RelationalUserStore {
    fn backend(&self) -> DataSourceType {
        DataSourceType::Relational
    }

    #[tracing::instrument(skip(self))]
    async fn initialize(&self) -> Result<(), StoreError> {
        migration::Migrator::up(self.db.as_ref(), None).await?;
        Ok(())
    }

    #[tracing::instrument(skip(self, user), fields(user_id = %user.id))]
    async fn create(&self, user: &User) -> Result<IdentityResult, StoreError> {
        match user::Entity::insert(new_user_row(user))
            .exec_without_returning(self.db.as_ref())
            .await
        {
            Ok(_) => Ok(IdentityResult::success()),
            Err(e) if is_unique_violation(&e) => Ok(IdentityResult::failed([
                IdentityError::duplicate_email(&user.email),
            ])),
            Err(e) => Err(e.into()),
        }
    }

    #[tracing::instrument(skip(self, user, login), fields(user_id = %user.id, provider = %login.provider))]
    async fn create_with_login(
        &self,
        user: &User,
        login: &UserLoginInfo,
    ) -> Result<IdentityResult, StoreError> {
        let txn = self.db.begin().await?;

        if login_exists(&txn, &login.provider, &login.provider_key).await? {
            txn.rollback().await?;
            return Ok(IdentityResult::failed([
                IdentityError::login_already_associated(),
            ]));
        }

        if let Err(e) = user::Entity::insert(new_user_row(user))
            .exec_without_returning(&txn)
            .await
        {
            txn.rollback().await?;
            return if is_unique_violation(&e) {
                Ok(IdentityResult::failed([IdentityError::duplicate_email(
                    &user.email,
                )]))
            } else {
                Err(e.into())
            };
        }

        // A concurrent writer may have linked the same key since the check above.
        if let Err(e) = user_login::Entity::insert(new_login_row(user, login))
            .exec_without_returning(&txn)
            .await
        {
            txn.rollback().await?;
            return if is_unique_violation(&e) {
                Ok(IdentityResult::failed([
                    IdentityError::login_already_associated(),
                ]))
            } else {
                Err(e.into())
            };
        }

        txn.commit().await?;
        Ok(IdentityResult::success())
    }

    #[tracing::instrument(skip(self, user), fields(user_id = %user.id))]
    async fn update(&self, user: &User) -> Result<IdentityResult, StoreError> {
        let active = user::ActiveModel {
            id: Unchanged(user.id.clone()),
            user_name: Set(user.user_name.clone().unwrap_or_default()),
            email: Set(user.email.clone()),
            normalized_email: Set(user.normalized_email()),
            password_hash: Set(user.password_hash.clone()),
            culture: Set(user.culture.clone()),
        };
        match active.update(self.db.as_ref()).await {
            Ok(_) => Ok(IdentityResult::success()),
            Err(DbErr::RecordNotUpdated) => {
                Ok(IdentityResult::failed([IdentityError::user_not_found()]))
            }
            Err(e) if is_unique_violation(&e) => Ok(IdentityResult::failed([
                IdentityError::duplicate_email(&user.email),
            ])),
            Err(e) => Err(e.into()),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn find_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        Ok(user::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .map(to_user))
    }

    #[tracing::instrument(skip(self))]
    async fn find_by_email(&self, normalized_email: &str) -> Result<Option<User>, StoreError> {
        Ok(user::Entity::find()
            .filter(user::Column::NormalizedEmail.eq(normalized_email))
            .one(self.db.as_ref())
            .await?
            .map(to_user))
    }

    #[tracing::instrument(skip(self))]
    async fn find_by_login(
        &self,
        provider: &str,
        provider_key: &str,
    ) -> Result<Option<User>, StoreError> {
        let login =
            user_login::Entity::find_by_id((provider.to_string(), provider_key.to_string()))
                .one(self.db.as_ref())
                .await?;

        match login {
            Some(login) => Ok(user::Entity::find_by_id(login.user_id)
                .one(self.db.as_ref())
                .await?
                .map(to_user)),
            None => Ok(None),
        }
    }

    #[tracing::instrument(skip(self, user, login), fields(user_id = %user.id, provider = %login.provider))]
    async fn add_login(
        &self,
        user: &User,
        login: &UserLoginInfo,
    ) -> Result<IdentityResult, StoreError> {
        if login_exists(self.db.as_ref(), &login.provider, &login.provider_key).await? {
            return Ok(IdentityResult::failed([
                IdentityError::login_already_associated(),
            ]));
        }

        match user_login::Entity::insert(new_login_row(user, login))
            .exec_without_returning(self.db.as_ref())
            .await
        {
            Ok(_) => Ok(IdentityResult::success()),
            Err(e) if is_unique_violation(&e) => Ok(IdentityResult::failed([
                IdentityError::login_already_associated(),
            ])),
            Err(e) if is_missing_reference(&e) => {
                Ok(IdentityResult::failed([IdentityError::user_not_found()]))
            }
            Err(e) => Err(e.into()),
        }
    }

    #[tracing::instrument(skip(self, user), fields(user_id = %user.id))]
    async fn add_to_role(&self, user: &User, role: &str) -> Result<IdentityResult, StoreError> {
        let Some(role_row) = self.find_role_row(role).await? else {
            return Ok(IdentityResult::failed([IdentityError::role_not_found(role)]));
        };

        let existing = user_role::Entity::find_by_id((user.id.clone(), role_row.id.clone()))
            .one(self.db.as_ref())
            .await?;
        if existing.is_some() {
            return Ok(IdentityResult::failed([
                IdentityError::user_already_in_role(&role_row.name),
            ]));
        }

        let membership = user_role::ActiveModel {
            user_id: Set(user.id.clone()),
            role_id: Set(role_row.id),
        };
        match user_role::Entity::insert(membership)
            .exec_without_returning(self.db.as_ref())
            .await
        {
            Ok(_) => Ok(IdentityResult::success()),
            Err(e) if is_unique_violation(&e) => Ok(IdentityResult::failed([
                IdentityError::user_already_in_role(&role_row.name),
            ])),
            Err(e) if is_missing_reference(&e) => {
                Ok(IdentityResult::failed([IdentityError::user_not_found()]))
            }
            Err(e) => Err(e.into()),
        }
    }

    #[tracing::instrument(skip(self, user), fields(user_id = %user.id))]
    async fn is_in_role(&self, user: &User, role: &str) -> Result<bool, StoreError> {
        let Some(role_row) = self.find_role_row(role).await? else {
            return Ok(false);
        };

        Ok(user_role::Entity::find_by_id((user.id.clone(), role_row.id))
            .one(self.db.as_ref())
            .await?
            .is_some())
    }

    #[tracing::instrument(skip(self, user), fields(user_id = %user.id))]
    async fn roles(&self, user: &User) -> Result<Vec<String>, StoreError> {
        let memberships = user_role::Entity::find()
            .filter(user_role::Column::UserId.eq(user.id.as_str()))
            .find_also_related(role::Entity)
            .all(self.db.as_ref())
            .await?;

        Ok(memberships
            .into_iter()
            .filter_map(|(_, role)| role.map(|r| r.name))
            .collect())
    }

    #[tracing::instrument(skip(self, role), fields(role = %role.name))]
    async fn create_role(&self, role: &Role) -> Result<IdentityResult, StoreError> {
        let row = role::ActiveModel {
            id: Set(role.id.clone()),
            name: Set(role.name.clone()),
            normalized_name: Set(normalize_role_name(&role.name)),
            description: Set(role.description.clone()),
        };
        match role::Entity::insert(row)
            .exec_without_returning(self.db.as_ref())
            .await
        {
            Ok(_) => Ok(IdentityResult::success()),
            Err(e) if is_unique_violation(&e) => Ok(IdentityResult::failed([
                IdentityError::duplicate_role_name(&role.name),
            ])),
            Err(e) => Err(e.into()),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn find_role(&self, name: &str) -> Result<Option<Role>, StoreError> {
        Ok(self.find_role_row(name).await?.map(to_role))
    }
}
