//! SeaORM entities backing the relational user store.

pub mod role;
pub mod user;
pub mod user_login;
pub mod user_role;
