//! Storage backend selection.
//!
//! A [`UserStore`] persists users, roles, role memberships and external login
//! links. [`create_store`] picks the backend from a [`DataSourceType`]:
//!
//! - `Relational` - SeaORM over a SQL connection string (Postgres, SQLite)
//! - `Document` - MongoDB, with the data source name selecting the database
//!
//! Construction is one-shot and fails fast; nothing is retried or cached.

pub mod document;
pub mod relational;

use crate::error::StoreError;
use crate::models::{Role, User, UserLoginInfo};
use crate::outcome::IdentityResult;
use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

pub use document::DocumentUserStore;
pub use relational::RelationalUserStore;

/// Kinds of storage backend a user store can be built on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum DataSourceType {
    Relational,
    Document,
}

const DATA_SOURCE_NAMES: [(&str, DataSourceType); 9] = [
    ("relational", DataSourceType::Relational),
    ("sql", DataSourceType::Relational),
    ("sqlserver", DataSourceType::Relational),
    ("postgres", DataSourceType::Relational),
    ("postgresql", DataSourceType::Relational),
    ("sqlite", DataSourceType::Relational),
    ("document", DataSourceType::Document),
    ("mongodb", DataSourceType::Document),
    ("mongo", DataSourceType::Document),
];

impl DataSourceType {
    pub const fn as_str(self) -> &'static str {
        match self {
            DataSourceType::Relational => "relational",
            DataSourceType::Document => "document",
        }
    }
}

impl fmt::Display for DataSourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataSourceType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        DATA_SOURCE_NAMES
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(wanted))
            .map(|(_, kind)| *kind)
            .ok_or_else(|| StoreError::UnsupportedBackend {
                parameter: "data_source_type",
                value: s.to_string(),
            })
    }
}

impl TryFrom<String> for DataSourceType {
    type Error = StoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Persistence operations over users and roles.
///
/// Infrastructure failures surface as [`StoreError`]; constraint violations
/// (unknown role, duplicate membership, login already linked) come back as a
/// failed [`IdentityResult`].
#[async_trait]
pub trait UserStore: Send + Sync {
    fn backend(&self) -> DataSourceType;

    /// Prepare the backing schema: run migrations or create indexes.
    async fn initialize(&self) -> Result<(), StoreError>;

    async fn create(&self, user: &User) -> Result<IdentityResult, StoreError>;

    /// Create a user together with its first external login, atomically.
    async fn create_with_login(
        &self,
        user: &User,
        login: &UserLoginInfo,
    ) -> Result<IdentityResult, StoreError>;

    async fn update(&self, user: &User) -> Result<IdentityResult, StoreError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, StoreError>;

    /// Look a user up by already-normalized email.
    async fn find_by_email(&self, normalized_email: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_login(
        &self,
        provider: &str,
        provider_key: &str,
    ) -> Result<Option<User>, StoreError>;

    async fn add_login(
        &self,
        user: &User,
        login: &UserLoginInfo,
    ) -> Result<IdentityResult, StoreError>;

    async fn add_to_role(&self, user: &User, role: &str) -> Result<IdentityResult, StoreError>;

    async fn is_in_role(&self, user: &User, role: &str) -> Result<bool, StoreError>;

    /// Role names of a user, in whatever order the backend enumerates them.
    async fn roles(&self, user: &User) -> Result<Vec<String>, StoreError>;

    async fn create_role(&self, role: &Role) -> Result<IdentityResult, StoreError>;

    async fn find_role(&self, name: &str) -> Result<Option<Role>, StoreError>;
}

/// Builds user stores; the injection seam for backend selection.
#[async_trait]
pub trait UserStoreFactory: Send + Sync {
    async fn create_user_store(
        &self,
        data_source_type: DataSourceType,
        data_source_name: &str,
        connection_string: Option<&str>,
    ) -> Result<Arc<dyn UserStore>, StoreError>;
}

/// Factory dispatching to the SeaORM and MongoDB stores.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultUserStoreFactory;

#[async_trait]
impl UserStoreFactory for DefaultUserStoreFactory {
    async fn create_user_store(
        &self,
        data_source_type: DataSourceType,
        data_source_name: &str,
        connection_string: Option<&str>,
    ) -> Result<Arc<dyn UserStore>, StoreError> {
        create_store(data_source_type, data_source_name, connection_string).await
    }
}

/// Build a user store for the given backend.
///
/// The connection string is trimmed first; `None` is rejected with
/// [`StoreError::InvalidArgument`].
#[tracing::instrument(skip(connection_string))]
pub async fn create_store(
    data_source_type: DataSourceType,
    data_source_name: &str,
    connection_string: Option<&str>,
) -> Result<Arc<dyn UserStore>, StoreError> {
    let connection_string = normalize_connection_string(connection_string)?;

    let store: Arc<dyn UserStore> = match data_source_type {
        DataSourceType::Relational => {
            Arc::new(RelationalUserStore::connect(&connection_string).await?)
        }
        DataSourceType::Document => {
            Arc::new(DocumentUserStore::connect(&connection_string, data_source_name).await?)
        }
    };

    tracing::info!(backend = %data_source_type, "User store created");
    Ok(store)
}

/// Trim leading and trailing whitespace from a connection string.
///
/// Internal whitespace is preserved. `None` is an [`StoreError::InvalidArgument`].
pub fn normalize_connection_string(connection_string: Option<&str>) -> Result<String, StoreError> {
    connection_string
        .map(|s| s.trim().to_string())
        .ok_or(StoreError::InvalidArgument {
            parameter: "connection_string",
        })
}
