use crate::backend::traits::{
    AuthProvider, AuthUser, Condition, ImageStore, PropertyStore, Query, Session,
};
use crate::config::Config;
use crate::error::{Result, ServiceError};
use crate::models::{Property, PropertyDraft, PropertyId};
use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Client for a Supabase-compatible project: PostgREST rows, Storage
/// objects and GoTrue auth behind one base URL.
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
    table: String,
    bucket: String,
    session: RwLock<Option<Session>>,
}

impl SupabaseClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("terraventos/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: config.backend_url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
            table: config.table.clone(),
            bucket: config.bucket.clone(),
            session: RwLock::new(None),
        })
    }

    /// Current session, if signed in
    pub async fn session(&self) -> Option<Session> {
        self.session.read().await.clone()
    }

    fn rows_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, self.table)
    }

    fn object_url(&self, path: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.base_url, self.bucket, path)
    }

    fn auth_url(&self, endpoint: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, endpoint)
    }

    /// Request carrying the project key and the session token (or the
    /// anon key when signed out).
    async fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let bearer = match self.session.read().await.as_ref() {
            Some(session) => session.access_token.clone(),
            None => self.anon_key.clone(),
        };

        self.client
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn single_row(response: Response) -> Result<Property> {
        let status = response.status().as_u16();
        let rows: Vec<Property> = Self::decode(response).await?;
        rows.into_iter().next().ok_or(ServiceError::Service {
            status,
            message: "Nenhuma linha retornada".to_string(),
        })
    }
}

/// Turn a non-success response into `ServiceError::Service`, keeping the
/// message the service reported.
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("Erro desconhecido")
            .to_string()
    });
    warn!("Backend returned {}: {}", status, message);

    Err(ServiceError::Service {
        status: status.as_u16(),
        message,
    })
}

fn error_message(body: &str) -> Option<String> {
    let parsed: Value = serde_json::from_str(body).ok()?;
    ["message", "msg", "error_description", "error"]
        .iter()
        .find_map(|key| parsed.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

fn filter_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// PostgREST query string parameters for `query`
pub fn postgrest_params(query: &Query) -> Vec<(String, String)> {
    let mut params = vec![("select".to_string(), "*".to_string())];

    for condition in &query.conditions {
        let (column, operator, value) = match condition {
            Condition::Eq(column, Value::Null) => (column, "is", &Value::Null),
            Condition::Eq(column, value) => (column, "eq", value),
            Condition::Neq(column, value) => (column, "neq", value),
        };
        params.push((column.clone(), format!("{}.{}", operator, filter_value(value))));
    }

    if let Some(order) = &query.order {
        let direction = if order.ascending { "asc" } else { "desc" };
        params.push(("order".to_string(), format!("{}.{}", order.column, direction)));
    }

    if let Some(limit) = query.limit {
        params.push(("limit".to_string(), limit.to_string()));
    }

    params
}

fn id_filter(id: &PropertyId) -> [(&'static str, String); 1] {
    [("id", format!("eq.{}", id))]
}

#[async_trait]
impl PropertyStore for SupabaseClient {
    async fn select(&self, query: &Query) -> Result<Vec<Property>> {
        let params = postgrest_params(query);
        debug!("Selecting {} with {:?}", self.table, params);

        let response = self
            .request(Method::GET, &self.rows_url())
            .await
            .query(&params)
            .send()
            .await?;
        Self::decode(check(response).await?).await
    }

    async fn fetch(&self, id: &PropertyId) -> Result<Option<Property>> {
        let rows = self
            .select(&Query::new().eq("id", id.as_str()).limit(1))
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn insert(&self, draft: &PropertyDraft) -> Result<Property> {
        let response = self
            .request(Method::POST, &self.rows_url())
            .await
            .header("Prefer", "return=representation")
            .json(&[draft])
            .send()
            .await?;

        let row = Self::single_row(check(response).await?).await?;
        info!("Inserted property {}", row.id);
        Ok(row)
    }

    async fn update(&self, id: &PropertyId, draft: &PropertyDraft) -> Result<Property> {
        let response = self
            .request(Method::PATCH, &self.rows_url())
            .await
            .query(&id_filter(id))
            .header("Prefer", "return=representation")
            .json(draft)
            .send()
            .await?;

        let rows: Vec<Property> = Self::decode(check(response).await?).await?;
        let row = rows.into_iter().next().ok_or(ServiceError::NotFound)?;
        info!("Updated property {}", row.id);
        Ok(row)
    }

    async fn delete(&self, id: &PropertyId) -> Result<()> {
        let response = self
            .request(Method::DELETE, &self.rows_url())
            .await
            .query(&id_filter(id))
            .send()
            .await?;
        check(response).await?;
        info!("Deleted property {}", id);
        Ok(())
    }
}

#[async_trait]
impl ImageStore for SupabaseClient {
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        debug!("Uploading {} ({} bytes)", path, bytes.len());
        let response = self
            .request(Method::POST, &self.object_url(path))
            .await
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header("x-upsert", "false")
            .body(bytes)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, self.bucket, path
        )
    }

    async fn remove(&self, paths: &[String]) -> Result<()> {
        let url = format!("{}/storage/v1/object/{}", self.base_url, self.bucket);
        let response = self
            .request(Method::DELETE, &url)
            .await
            .json(&json!({ "prefixes": paths }))
            .send()
            .await?;
        check(response).await?;
        debug!("Removed {} stored objects", paths.len());
        Ok(())
    }
}

#[async_trait]
impl AuthProvider for SupabaseClient {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session> {
        let response = self
            .request(Method::POST, &self.auth_url("token"))
            .await
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        let session: Session = Self::decode(check(response).await?).await?;
        *self.session.write().await = Some(session.clone());
        info!("Signed in as {}", email);
        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str, metadata: Value) -> Result<()> {
        let response = self
            .request(Method::POST, &self.auth_url("signup"))
            .await
            .json(&json!({ "email": email, "password": password, "data": metadata }))
            .send()
            .await?;
        check(response).await?;
        info!("Registered {}", email);
        Ok(())
    }

    async fn reset_password_for_email(&self, email: &str, redirect_to: &str) -> Result<()> {
        let response = self
            .request(Method::POST, &self.auth_url("recover"))
            .await
            .query(&[("redirect_to", redirect_to)])
            .json(&json!({ "email": email }))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn current_user(&self) -> Result<Option<AuthUser>> {
        if self.session.read().await.is_none() {
            return Ok(None);
        }

        let response = self
            .request(Method::GET, &self.auth_url("user"))
            .await
            .send()
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            warn!("Session expired, discarding it");
            *self.session.write().await = None;
            return Ok(None);
        }

        let user: AuthUser = Self::decode(check(response).await?).await?;
        Ok(Some(user))
    }

    async fn sign_out(&self) -> Result<()> {
        if self.session.read().await.is_none() {
            return Ok(());
        }

        let response = self
            .request(Method::POST, &self.auth_url("logout"))
            .await
            .send()
            .await?;
        check(response).await?;
        *self.session.write().await = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> SupabaseClient {
        SupabaseClient::new(&Config::new(server.uri(), "anon")).unwrap()
    }

    fn session_body() -> Value {
        json!({
            "access_token": "tok-1",
            "token_type": "bearer",
            "expires_in": 3600,
            "refresh_token": "ref-1",
            "user": {
                "id": "u1",
                "email": "ana@terraventos.com",
                "user_metadata": { "full_name": "Ana" }
            }
        })
    }

    async fn signed_in(server: &MockServer) -> SupabaseClient {
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "password"))
            .and(header("apikey", "anon"))
            .respond_with(ResponseTemplate::new(200).set_body_json(session_body()))
            .mount(server)
            .await;

        let client = client_for(server);
        client
            .sign_in_with_password("ana@terraventos.com", "segredo1")
            .await
            .unwrap();
        client
    }

    fn pairs(params: &[(String, String)]) -> Vec<(&str, &str)> {
        params.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect()
    }

    #[test]
    fn featured_query_maps_to_postgrest_syntax() {
        let query = Query::new().eq("featured", true).newest_first().limit(1);
        assert_eq!(
            pairs(&postgrest_params(&query)),
            vec![
                ("select", "*"),
                ("featured", "eq.true"),
                ("order", "created_at.desc"),
                ("limit", "1"),
            ]
        );
    }

    #[test]
    fn inequality_and_null_conditions() {
        let query = Query::new().neq("id", "17").eq("youtube_video", Value::Null);
        assert_eq!(
            pairs(&postgrest_params(&query)),
            vec![("select", "*"), ("id", "neq.17"), ("youtube_video", "is.null")]
        );
    }

    #[test]
    fn error_message_prefers_known_keys() {
        let grant = r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#;
        assert_eq!(
            error_message(grant).as_deref(),
            Some("Invalid login credentials")
        );
        assert_eq!(
            error_message(r#"{"msg":"User already registered"}"#).as_deref(),
            Some("User already registered")
        );
        assert_eq!(error_message("<html>bad gateway</html>"), None);
    }

    #[test]
    fn urls_are_built_from_config() {
        let config = Config::new("https://proj.supabase.co/", "anon");
        let client = SupabaseClient::new(&config).unwrap();
        assert_eq!(client.rows_url(), "https://proj.supabase.co/rest/v1/properties");
        assert_eq!(
            client.public_url("properties/1-a.jpg"),
            "https://proj.supabase.co/storage/v1/object/public/property-images/properties/1-a.jpg"
        );
        assert_eq!(client.auth_url("token"), "https://proj.supabase.co/auth/v1/token");
    }

    #[tokio::test]
    async fn sign_in_keeps_session_and_sends_its_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .and(header("authorization", "Bearer tok-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(session_body()["user"].clone()))
            .mount(&server)
            .await;

        let client = signed_in(&server).await;
        let session = client.session().await.unwrap();
        assert_eq!(session.access_token, "tok-1");
        assert_eq!(session.refresh_token.as_deref(), Some("ref-1"));
        assert_eq!(session.user.email.as_deref(), Some("ana@terraventos.com"));

        let user = client.current_user().await.unwrap().unwrap();
        assert_eq!(user.id, "u1");
        assert_eq!(user.user_metadata["full_name"], "Ana");
    }

    #[tokio::test]
    async fn rejected_credentials_keep_service_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "Invalid login credentials"
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .sign_in_with_password("ana@terraventos.com", "errada99")
            .await
            .unwrap_err();
        assert_eq!(err.service_message(), Some("Invalid login credentials"));
        assert!(client.session().await.is_none());
        assert!(client.current_user().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_session_is_discarded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "msg": "JWT expired" })))
            .mount(&server)
            .await;

        let client = signed_in(&server).await;
        assert!(client.session().await.is_some());

        assert!(client.current_user().await.unwrap().is_none());
        assert!(client.session().await.is_none());
    }

    #[tokio::test]
    async fn update_of_missing_row_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/rest/v1/properties"))
            .and(query_param("id", "eq.9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let result = client
            .update(&PropertyId::new("9"), &PropertyDraft::default())
            .await;
        assert!(matches!(result, Err(ServiceError::NotFound)));
    }

    #[tokio::test]
    async fn select_sends_filters_and_decodes_rows() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/properties"))
            .and(query_param("featured", "eq.true"))
            .and(query_param("order", "created_at.desc"))
            .and(header("authorization", "Bearer anon"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "id": 4, "title": "Casa", "price": 450000, "images": ["https://cdn/a.jpg"] }
            ])))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let rows = client
            .select(&Query::new().eq("featured", true).newest_first())
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, PropertyId::new("4"));
        assert_eq!(rows[0].price.as_deref(), Some("450000"));
        assert_eq!(rows[0].images, vec!["https://cdn/a.jpg"]);
    }
}
