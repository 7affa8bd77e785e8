//! User management: registration, sign-in and session token issuance over a
//! pluggable relational or document user store.
//!
//! [`bootstrap::UserManagement`] turns an [`config::AppConfig`] into a ready
//! [`service::UserManagementService`] factory; [`api`] exposes it over HTTP.

use std::sync::Arc;

use crate::bootstrap::UserManagement;
use crate::config::AppConfig;
use crate::session::SessionRegistry;

pub mod api;
pub mod bootstrap;
pub mod config;
pub mod entity;
pub mod error;
pub mod manager;
pub mod models;
pub mod outcome;
pub mod password;
pub mod service;
pub mod session;
pub mod store;
pub mod token;

#[derive(Clone)]
pub struct AppResources {
    pub management: Arc<UserManagement>,
    pub config: Arc<AppConfig>,
    pub sessions: Arc<SessionRegistry>,
}

impl AppResources {
    pub fn new(management: Arc<UserManagement>, config: Arc<AppConfig>) -> Self {
        Self {
            management,
            config,
            sessions: Arc::new(SessionRegistry::new()),
        }
    }
}
