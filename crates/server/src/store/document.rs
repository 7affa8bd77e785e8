//! Document user store on MongoDB.
//!
//! Users live in a `Users` collection with their role names and external
//! logins embedded, so creating a user together with its first login is a
//! single insert. Roles live in a `Roles` collection.

use super::{DataSourceType, UserStore};
use crate::error::StoreError;
use crate::models::{Role, User, UserLoginInfo, normalize_role_name};
use crate::outcome::{IdentityError, IdentityResult};
use async_trait::async_trait;
use mongodb::{
    Client, Collection, IndexModel,
    bson::doc,
    error::{ErrorKind, WriteFailure},
    options::IndexOptions,
};
use serde::{Deserialize, Serialize};

const USERS_COLLECTION: &str = "Users";
const ROLES_COLLECTION: &str = "Roles";
const DUPLICATE_KEY: i32 = 11000;

/// Provider and key of an external login, stored as one value so that a
/// single-field unique index covers the pair. A compound index over two
/// paths of the same array would key every provider against every key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct LoginKey {
    pub login_provider: String,
    pub provider_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct LoginDocument {
    pub key: LoginKey,
    pub provider_display_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct UserDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_name: Option<String>,
    pub email: String,
    pub normalized_email: String,
    pub password_hash: Option<String>,
    pub culture: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub logins: Vec<LoginDocument>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct RoleDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub normalized_name: String,
    pub description: Option<String>,
}

impl From<&UserLoginInfo> for LoginDocument {
    fn from(login: &UserLoginInfo) -> Self {
        Self {
            key: LoginKey {
                login_provider: login.provider.clone(),
                provider_key: login.provider_key.clone(),
            },
            provider_display_name: login.provider_display_name.clone(),
        }
    }
}

impl UserDocument {
    fn from_user(user: &User, logins: Vec<LoginDocument>) -> Self {
        Self {
            id: user.id.clone(),
            user_name: user.user_name.clone(),
            email: user.email.clone(),
            normalized_email: user.normalized_email(),
            password_hash: user.password_hash.clone(),
            culture: user.culture.clone(),
            roles: Vec::new(),
            logins,
        }
    }

    fn into_user(self) -> User {
        User {
            id: self.id,
            user_name: self.user_name,
            email: self.email,
            password_hash: self.password_hash,
            culture: self.culture,
        }
    }
}

impl From<&Role> for RoleDocument {
    fn from(role: &Role) -> Self {
        Self {
            id: role.id.clone(),
            name: role.name.clone(),
            normalized_name: normalize_role_name(&role.name),
            description: role.description.clone(),
        }
    }
}

impl From<RoleDocument> for Role {
    fn from(doc: RoleDocument) -> Self {
        Role {
            id: doc.id,
            name: doc.name,
            description: doc.description,
        }
    }
}

/// Exact-match filter on an embedded [`LoginKey`]; field order follows the struct.
fn login_key_filter(provider: &str, provider_key: &str) -> mongodb::bson::Document {
    doc! {
        "logins.key": { "login_provider": provider, "provider_key": provider_key }
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(e)) if e.code == DUPLICATE_KEY
    )
}

pub struct DocumentUserStore {
    users: Collection<UserDocument>,
    roles: Collection<RoleDocument>,
}

impl DocumentUserStore {
    /// Build a store against `database_name` on the given deployment.
    ///
    /// The driver connects lazily; the first operation is what reaches the server.
    pub async fn connect(connection_string: &str, database_name: &str) -> Result<Self, StoreError> {
        if database_name.trim().is_empty() {
            return Err(StoreError::InvalidArgument {
                parameter: "data_source_name",
            });
        }

        let client = Client::with_uri_str(connection_string).await?;
        let database = client.database(database_name.trim());
        Ok(Self {
            users: database.collection(USERS_COLLECTION),
            roles: database.collection(ROLES_COLLECTION),
        })
    }

    async fn find_role_document(&self, name: &str) -> Result<Option<RoleDocument>, StoreError> {
        Ok(self
            .roles
            .find_one(doc! { "normalized_name": normalize_role_name(name) })
            .await?)
    }

    async fn login_taken(&self, login: &UserLoginInfo) -> Result<bool, StoreError> {
        Ok(self
            .find_by_login(&login.provider, &login.provider_key)
            .await?
            .is_some())
    }
}

#[async_trait]
impl UserStore for DocumentUserStore {
    fn backend(&self) -> DataSourceType {
        DataSourceType::Document
    }

    #[tracing::instrument(skip(self))]
    async fn initialize(&self) -> Result<(), StoreError> {
        let unique = || IndexOptions::builder().unique(true).build();

        self.users
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "normalized_email": 1 })
                    .options(unique())
                    .build(),
            )
            .await?;

        // Users without logins have an empty array; keep them out of the unique index.
        self.users
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "logins.key": 1 })
                    .options(
                        IndexOptions::builder()
                            .unique(true)
                            .partial_filter_expression(doc! { "logins.key": { "$exists": true } })
                            .build(),
                    )
                    .build(),
            )
            .await?;

        self.roles
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "normalized_name": 1 })
                    .options(unique())
                    .build(),
            )
            .await?;

        tracing::info!("Document store indexes ensured");
        Ok(())
    }

    #[tracing::instrument(skip(self, user), fields(user_id = %user.id))]
    async fn create(&self, user: &User) -> Result<IdentityResult, StoreError> {
        match self
            .users
            .insert_one(UserDocument::from_user(user, Vec::new()))
            .await
        {
            Ok(_) => Ok(IdentityResult::success()),
            Err(e) if is_duplicate_key(&e) => Ok(IdentityResult::failed([
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
        if self.login_taken(login).await? {
            return Ok(IdentityResult::failed([
                IdentityError::login_already_associated(),
            ]));
        }

        let document = UserDocument::from_user(user, vec![LoginDocument::from(login)]);
        match self.users.insert_one(document).await {
            Ok(_) => Ok(IdentityResult::success()),
            Err(e) if is_duplicate_key(&e) => {
                // Lost a race: find out which unique key collided.
                let error = if self.login_taken(login).await? {
                    IdentityError::login_already_associated()
                } else {
                    IdentityError::duplicate_email(&user.email)
                };
                Ok(IdentityResult::failed([error]))
            }
            Err(e) => Err(e.into()),
        }
    }

    #[tracing::instrument(skip(self, user), fields(user_id = %user.id))]
    async fn update(&self, user: &User) -> Result<IdentityResult, StoreError> {
        let update = doc! {
            "$set": {
                "user_name": user.user_name.clone(),
                "email": user.email.as_str(),
                "normalized_email": user.normalized_email(),
                "password_hash": user.password_hash.clone(),
                "culture": user.culture.as_str(),
            }
        };

        let outcome = self
            .users
            .update_one(doc! { "_id": user.id.as_str() }, update)
            .await?;
        if outcome.matched_count == 0 {
            return Ok(IdentityResult::failed([IdentityError::user_not_found()]));
        }
        Ok(IdentityResult::success())
    }

    #[tracing::instrument(skip(self))]
    async fn find_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .find_one(doc! { "_id": id })
            .await?
            .map(UserDocument::into_user))
    }

    #[tracing::instrument(skip(self))]
    async fn find_by_email(&self, normalized_email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .find_one(doc! { "normalized_email": normalized_email })
            .await?
            .map(UserDocument::into_user))
    }

    #[tracing::instrument(skip(self))]
    async fn find_by_login(
        &self,
        provider: &str,
        provider_key: &str,
    ) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .find_one(login_key_filter(provider, provider_key))
            .await?
            .map(UserDocument::into_user))
    }

    #[tracing::instrument(skip(self, user, login), fields(user_id = %user.id, provider = %login.provider))]
    async fn add_login(
        &self,
        user: &User,
        login: &UserLoginInfo,
    ) -> Result<IdentityResult, StoreError> {
        if self.login_taken(login).await? {
            return Ok(IdentityResult::failed([
                IdentityError::login_already_associated(),
            ]));
        }

        let entry = doc! {
            "key": {
                "login_provider": login.provider.as_str(),
                "provider_key": login.provider_key.as_str(),
            },
            "provider_display_name": login.provider_display_name.clone(),
        };
        match self
            .users
            .update_one(
                doc! { "_id": user.id.as_str() },
                doc! { "$push": { "logins": entry } },
            )
            .await
        {
            Ok(outcome) if outcome.matched_count == 0 => {
                Ok(IdentityResult::failed([IdentityError::user_not_found()]))
            }
            Ok(_) => Ok(IdentityResult::success()),
            Err(e) if is_duplicate_key(&e) => Ok(IdentityResult::failed([
                IdentityError::login_already_associated(),
            ])),
            Err(e) => Err(e.into()),
        }
    }

    #[tracing::instrument(skip(self, user), fields(user_id = %user.id))]
    async fn add_to_role(&self, user: &User, role: &str) -> Result<IdentityResult, StoreError> {
        let Some(role_doc) = self.find_role_document(role).await? else {
            return Ok(IdentityResult::failed([IdentityError::role_not_found(role)]));
        };

        let outcome = self
            .users
            .update_one(
                doc! { "_id": user.id.as_str() },
                doc! { "$addToSet": { "roles": role_doc.name.as_str() } },
            )
            .await?;

        if outcome.matched_count == 0 {
            return Ok(IdentityResult::failed([IdentityError::user_not_found()]));
        }
        if outcome.modified_count == 0 {
            return Ok(IdentityResult::failed([
                IdentityError::user_already_in_role(&role_doc.name),
            ]));
        }
        Ok(IdentityResult::success())
    }

    #[tracing::instrument(skip(self, user), fields(user_id = %user.id))]
    async fn is_in_role(&self, user: &User, role: &str) -> Result<bool, StoreError> {
        let Some(role_doc) = self.find_role_document(role).await? else {
            return Ok(false);
        };

        Ok(self
            .users
            .find_one(doc! { "_id": user.id.as_str(), "roles": role_doc.name.as_str() })
            .await?
            .is_some())
    }

    #[tracing::instrument(skip(self, user), fields(user_id = %user.id))]
    async fn roles(&self, user: &User) -> Result<Vec<String>, StoreError> {
        Ok(self
            .users
            .find_one(doc! { "_id": user.id.as_str() })
            .await?
            .map(|doc| doc.roles)
            .unwrap_or_default())
    }

    #[tracing::instrument(skip(self, role), fields(role = %role.name))]
    async fn create_role(&self, role: &Role) -> Result<IdentityResult, StoreError> {
        match self.roles.insert_one(RoleDocument::from(role)).await {
            Ok(_) => Ok(IdentityResult::success()),
            Err(e) if is_duplicate_key(&e) => Ok(IdentityResult::failed([
                IdentityError::duplicate_role_name(&role.name),
            ])),
            Err(e) => Err(e.into()),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn find_role(&self, name: &str) -> Result<Option<Role>, StoreError> {
        Ok(self.find_role_document(name).await?.map(Role::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::IdentityErrorCode;

    #[tokio::test]
    async fn test_connect_rejects_empty_database_name() {
        let result = DocumentUserStore::connect("mongodb://localhost:27017", "  ").await;
        assert!(matches!(
            result,
            Err(StoreError::InvalidArgument {
                parameter: "data_source_name"
            })
        ));
    }

    #[tokio::test]
    async fn test_connect_rejects_malformed_uri() {
        let result = DocumentUserStore::connect("not a mongodb uri", "identity").await;
        assert!(matches!(result, Err(StoreError::Document(_))));
    }

    #[test]
    fn test_user_document_round_trip_keeps_fields() {
        let mut user = User::new("Carol@Example.com", Some("en-US"));
        user.password_hash = Some("$argon2id$hash".to_string());
        let login = UserLoginInfo::new("Google", "g-42", Some("Google"));

        let document = UserDocument::from_user(&user, vec![LoginDocument::from(&login)]);
        assert_eq!(document.normalized_email, "carol@example.com");
        assert_eq!(document.logins.len(), 1);
        assert_eq!(document.logins[0].key.provider_key, "g-42");
        assert!(document.roles.is_empty());

        assert_eq!(document.into_user(), user);
    }

    #[test]
    fn test_user_document_serializes_id_as_underscore_id() {
        let user = User::new("dave@example.com", None);
        let bson = mongodb::bson::to_document(&UserDocument::from_user(&user, Vec::new()))
            .expect("serialize");
        assert_eq!(bson.get_str("_id").unwrap(), user.id);
        assert!(bson.get_array("logins").unwrap().is_empty());
    }

    #[test]
    fn test_login_filter_matches_serialized_key() {
        let login = UserLoginInfo::new("Google", "g-42", None);
        let stored = mongodb::bson::to_document(&LoginDocument::from(&login)).expect("serialize");
        let filter = login_key_filter("Google", "g-42");
        assert_eq!(
            stored.get_document("key").unwrap(),
            filter.get_document("logins.key").unwrap()
        );
    }

    #[test]
    fn test_role_document_normalizes_name() {
        let role = Role::new("Admin", Some("Administrators"));
        let document = RoleDocument::from(&role);
        assert_eq!(document.normalized_name, "ADMIN");
        assert_eq!(Role::from(document), role);
    }

    // Tests below need a MongoDB deployment (MONGODB_URI) and are skipped without one.
    // Each runs against its own throwaway database.

    async fn live_store() -> Option<(DocumentUserStore, mongodb::Database)> {
        let uri = std::env::var("MONGODB_URI").ok()?;
        let name = format!("identity_test_{}", uuid::Uuid::new_v4().simple());
        let store = DocumentUserStore::connect(&uri, &name)
            .await
            .expect("connect");
        store.initialize().await.expect("create indexes");
        let database = Client::with_uri_str(&uri)
            .await
            .expect("client")
            .database(&name);
        Some((store, database))
    }

    fn user(email: &str) -> User {
        User::new(email, Some("en-US"))
    }

    #[tokio::test]
    async fn test_live_create_find_and_update() {
        let Some((store, database)) = live_store().await else {
            return;
        };
        let mut alice = user("alice@example.com");
        assert!(store.create(&alice).await.unwrap().succeeded);
        assert_eq!(
            store.find_by_email("alice@example.com").await.unwrap(),
            Some(alice.clone())
        );

        alice.culture = "en-GB".to_string();
        assert!(store.update(&alice).await.unwrap().succeeded);
        let found = store.find_by_id(&alice.id).await.unwrap().unwrap();
        assert_eq!(found.culture, "en-GB");

        let again = store.create(&user("ALICE@example.com")).await.unwrap();
        assert!(again.has_error(IdentityErrorCode::DuplicateEmail));

        let ghost = store.update(&user("ghost@example.com")).await.unwrap();
        assert!(ghost.has_error(IdentityErrorCode::UserNotFound));

        database.drop().await.unwrap();
    }

    #[tokio::test]
    async fn test_live_roles_membership() {
        let Some((store, database)) = live_store().await else {
            return;
        };
        let alice = user("alice@example.com");
        store.create(&alice).await.unwrap();
        store.create_role(&Role::new("Admin", None)).await.unwrap();

        let dup = store.create_role(&Role::new("admin", None)).await.unwrap();
        assert!(dup.has_error(IdentityErrorCode::DuplicateRoleName));
        assert_eq!(store.find_role("ADMIN").await.unwrap().unwrap().name, "Admin");

        assert!(!store.is_in_role(&alice, "Admin").await.unwrap());
        assert!(store.add_to_role(&alice, "admin").await.unwrap().succeeded);
        assert!(store.is_in_role(&alice, "ADMIN").await.unwrap());
        assert_eq!(store.roles(&alice).await.unwrap(), vec!["Admin".to_string()]);

        let again = store.add_to_role(&alice, "Admin").await.unwrap();
        assert!(again.has_error(IdentityErrorCode::UserAlreadyInRole));

        let missing = store.add_to_role(&alice, "Ghost").await.unwrap();
        assert!(missing.has_error(IdentityErrorCode::RoleNotFound));

        let ghost = store
            .add_to_role(&user("ghost@example.com"), "Admin")
            .await
            .unwrap();
        assert!(ghost.has_error(IdentityErrorCode::UserNotFound));

        database.drop().await.unwrap();
    }

    #[tokio::test]
    async fn test_live_logins() {
        let Some((store, database)) = live_store().await else {
            return;
        };
        let alice = user("alice@example.com");
        let login = UserLoginInfo::new("Google", "g-1", Some("Google"));
        assert!(store.create_with_login(&alice, &login).await.unwrap().succeeded);
        assert_eq!(
            store.find_by_login("Google", "g-1").await.unwrap().map(|u| u.id),
            Some(alice.id.clone())
        );
        assert!(store.find_by_login("Google", "g-2").await.unwrap().is_none());
        assert!(store.find_by_login("Apple", "g-1").await.unwrap().is_none());

        let bob = user("bob@example.com");
        let taken = store.create_with_login(&bob, &login).await.unwrap();
        assert!(taken.has_error(IdentityErrorCode::LoginAlreadyAssociated));
        assert!(store.find_by_id(&bob.id).await.unwrap().is_none());

        store.create(&bob).await.unwrap();
        let taken = store.add_login(&bob, &login).await.unwrap();
        assert!(taken.has_error(IdentityErrorCode::LoginAlreadyAssociated));

        database.drop().await.unwrap();
    }

    #[tokio::test]
    async fn test_live_login_pairs_do_not_cross_match() {
        let Some((store, database)) = live_store().await else {
            return;
        };
        // Alice holds (Google, k1) and (Apple, k2); (Google, k2) is still free.
        let alice = user("alice@example.com");
        store
            .create_with_login(&alice, &UserLoginInfo::new("Google", "k1", None))
            .await
            .unwrap();
        let result = store
            .add_login(&alice, &UserLoginInfo::new("Apple", "k2", None))
            .await
            .unwrap();
        assert!(result.succeeded);

        let bob = user("bob@example.com");
        store.create(&bob).await.unwrap();
        let result = store
            .add_login(&bob, &UserLoginInfo::new("Google", "k2", None))
            .await
            .unwrap();
        assert!(result.succeeded);
        assert_eq!(
            store.find_by_login("Google", "k2").await.unwrap().map(|u| u.id),
            Some(bob.id.clone())
        );

        let carol = user("carol@example.com");
        let result = store
            .create_with_login(&carol, &UserLoginInfo::new("Apple", "k1", None))
            .await
            .unwrap();
        assert!(result.succeeded);

        database.drop().await.unwrap();
    }
}
