use crate::error::Result;
use crate::models::{Property, PropertyDraft, PropertyId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Row access to the `properties` table of the hosted backend
#[async_trait]
pub trait PropertyStore: Send + Sync {
    /// Rows matching `query`, in the order it asks for
    async fn select(&self, query: &Query) -> Result<Vec<Property>>;

    /// A single row by id, `None` when it does not exist
    async fn fetch(&self, id: &PropertyId) -> Result<Option<Property>>;

    /// Insert a row and return it as stored (with id and timestamps)
    async fn insert(&self, draft: &PropertyDraft) -> Result<Property>;

    async fn update(&self, id: &PropertyId, draft: &PropertyDraft) -> Result<Property>;

    async fn delete(&self, id: &PropertyId) -> Result<()>;
}

/// Key-based object storage with public URLs
#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<()>;

    fn public_url(&self, path: &str) -> String;

    async fn remove(&self, paths: &[String]) -> Result<()>;
}

/// Session-based authentication of site administrators
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session>;

    /// Register an account; `metadata` is stored alongside the user
    async fn sign_up(&self, email: &str, password: &str, metadata: Value) -> Result<()>;

    async fn reset_password_for_email(&self, email: &str, redirect_to: &str) -> Result<()>;

    /// User of the current session, if any
    async fn current_user(&self) -> Result<Option<AuthUser>>;

    async fn sign_out(&self) -> Result<()>;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    pub user: AuthUser,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(String, Value),
    Neq(String, Value),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

/// Equality filters, ordering and limit for a row selection
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub conditions: Vec<Condition>,
    pub order: Option<Order>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition::Eq(column.to_string(), value.into()));
        self
    }

    pub fn neq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition::Neq(column.to_string(), value.into()));
        self
    }

    pub fn order_by(mut self, column: &str, ascending: bool) -> Self {
        self.order = Some(Order {
            column: column.to_string(),
            ascending,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Newest listings first
    pub fn newest_first(self) -> Self {
        self.order_by("created_at", false)
    }
}
