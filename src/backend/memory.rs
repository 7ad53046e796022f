//! In-process stand-in for the hosted backend.
//!
//! Used by the CLI's demo mode and by tests. Rows, stored objects and
//! accounts live in memory; failures can be switched on to exercise the
//! error paths of the pages.

use crate::backend::traits::{
    AuthProvider, AuthUser, Condition, ImageStore, PropertyStore, Query, Session,
};
use crate::config::DEFAULT_BUCKET;
use crate::error::{Result, ServiceError};
use crate::models::{Property, PropertyDraft, PropertyId};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

const LOCAL_URL: &str = "http://localhost:54321";

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Account {
    password: String,
    user: AuthUser,
}

/// Rows, objects and accounts kept in memory
pub struct MemoryBackend {
    base_url: String,
    bucket: String,
    rows: Mutex<Vec<Property>>,
    next_id: AtomicU64,
    last_timestamp: Mutex<Option<DateTime<Utc>>>,
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    accounts: Mutex<HashMap<String, Account>>,
    session: Mutex<Option<Session>>,
    password_resets: Mutex<Vec<(String, String)>>,
    fail_uploads: AtomicBool,
    uploads_attempted: AtomicUsize,
    fail_upload_at: Mutex<Option<usize>>,
    fail_removals: AtomicBool,
    fail_selects: AtomicBool,
    fail_deletes: AtomicBool,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            base_url: LOCAL_URL.to_string(),
            bucket: DEFAULT_BUCKET.to_string(),
            rows: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            last_timestamp: Mutex::new(None),
            objects: Mutex::new(BTreeMap::new()),
            accounts: Mutex::new(HashMap::new()),
            session: Mutex::new(None),
            password_resets: Mutex::new(Vec::new()),
            fail_uploads: AtomicBool::new(false),
            uploads_attempted: AtomicUsize::new(0),
            fail_upload_at: Mutex::new(None),
            fail_removals: AtomicBool::new(false),
            fail_selects: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
        }
    }

    /// Backend preloaded with the demo listings
    pub fn seeded() -> Self {
        let backend = Self::new();
        let now = Utc::now();
        let seeds = demo_listings();
        info!("📋 Seeding {} demo listings", seeds.len());

        let mut rows = locked(&backend.rows);
        for (age_days, draft) in seeds {
            let id = backend.next_id.fetch_add(1, AtomicOrdering::SeqCst);
            let created_at = now - Duration::days(age_days);
            rows.push(row_from_draft(PropertyId::new(id.to_string()), &draft, created_at));
        }
        drop(rows);
        backend
    }

    /// Register an account directly, bypassing sign-up validation
    pub fn with_account(self, email: &str, password: &str, full_name: &str) -> Self {
        let user = AuthUser {
            id: uuid::Uuid::new_v4().to_string(),
            email: Some(email.to_string()),
            user_metadata: json!({ "full_name": full_name }),
        };
        locked(&self.accounts).insert(
            email.to_lowercase(),
            Account {
                password: password.to_string(),
                user,
            },
        );
        self
    }

    pub fn fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, AtomicOrdering::SeqCst);
    }

    /// Fail only the `nth` upload from now on (1-based), letting the others through
    pub fn fail_nth_upload(&self, nth: usize) {
        self.uploads_attempted.store(0, AtomicOrdering::SeqCst);
        *locked(&self.fail_upload_at) = Some(nth);
    }

    pub fn fail_removals(&self, fail: bool) {
        self.fail_removals.store(fail, AtomicOrdering::SeqCst);
    }

    pub fn fail_selects(&self, fail: bool) {
        self.fail_selects.store(fail, AtomicOrdering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, AtomicOrdering::SeqCst);
    }

    pub fn rows(&self) -> Vec<Property> {
        locked(&self.rows).clone()
    }

    pub fn object_keys(&self) -> Vec<String> {
        locked(&self.objects).keys().cloned().collect()
    }

    /// `(email, redirect_to)` of every reset link requested so far
    pub fn password_resets(&self) -> Vec<(String, String)> {
        locked(&self.password_resets).clone()
    }

    /// Strictly increasing creation timestamps, so newest-first order is stable
    fn next_timestamp(&self) -> DateTime<Utc> {
        let mut last = locked(&self.last_timestamp);
        let now = Utc::now();
        let stamp = match *last {
            Some(previous) if previous >= now => previous + Duration::microseconds(1),
            _ => now,
        };
        *last = Some(stamp);
        stamp
    }
}

fn unavailable(what: &str) -> ServiceError {
    ServiceError::Service {
        status: 503,
        message: format!("{} indisponível", what),
    }
}

fn row_from_draft(id: PropertyId, draft: &PropertyDraft, created_at: DateTime<Utc>) -> Property {
    Property {
        id,
        title: Some(draft.title.clone()),
        location: Some(draft.location.clone()),
        price: Some(draft.price.clone()),
        description: Some(draft.description.clone()),
        bedrooms: Some(draft.bedrooms),
        bathrooms: Some(draft.bathrooms),
        area: Some(draft.area),
        images: draft.images.clone(),
        featured: Some(draft.featured),
        property_type: draft.property_type.clone(),
        youtube_video: draft.youtube_video.clone(),
        created_at: Some(created_at),
        updated_at: Some(created_at),
    }
}

fn loosely_equal(field: &Value, wanted: &Value) -> bool {
    match (field, wanted) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Value::String(text), Value::Number(number))
        | (Value::Number(number), Value::String(text)) => *text == number.to_string(),
        _ => field == wanted,
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::Number(a), Value::Number(b)) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(a), Value::String(b)) => {
            match (
                DateTime::parse_from_rfc3339(a),
                DateTime::parse_from_rfc3339(b),
            ) {
                (Ok(a), Ok(b)) => a.cmp(&b),
                _ => a.cmp(b),
            }
        }
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        _ => Ordering::Equal,
    }
}

fn column(row: &Value, name: &str) -> Value {
    row.get(name).cloned().unwrap_or(Value::Null)
}

#[async_trait]
impl PropertyStore for MemoryBackend {
    async fn select(&self, query: &Query) -> Result<Vec<Property>> {
        if self.fail_selects.load(AtomicOrdering::SeqCst) {
            return Err(unavailable("Banco de dados"));
        }

        let rows = locked(&self.rows).clone();
        let mut matched: Vec<(Value, Property)> = Vec::with_capacity(rows.len());
        for property in rows {
            let row = serde_json::to_value(&property)?;
            let keep = query.conditions.iter().all(|condition| match condition {
                Condition::Eq(name, wanted) => loosely_equal(&column(&row, name), wanted),
                Condition::Neq(name, wanted) => !loosely_equal(&column(&row, name), wanted),
            });
            if keep {
                matched.push((row, property));
            }
        }

        if let Some(order) = &query.order {
            matched.sort_by(|(a, _), (b, _)| {
                let ordering = compare_values(&column(a, &order.column), &column(b, &order.column));
                if order.ascending {
                    ordering
                } else {
                    ordering.reverse()
                }
            });
        }

        let limit = query.limit.unwrap_or(usize::MAX);
        let found: Vec<Property> = matched.into_iter().take(limit).map(|(_, p)| p).collect();
        debug!("memory select returned {} rows", found.len());
        Ok(found)
    }

    async fn fetch(&self, id: &PropertyId) -> Result<Option<Property>> {
        let found = self
            .select(&Query::new().eq("id", id.as_str()).limit(1))
            .await?;
        Ok(found.into_iter().next())
    }

    async fn insert(&self, draft: &PropertyDraft) -> Result<Property> {
        let id = self.next_id.fetch_add(1, AtomicOrdering::SeqCst);
        let row = row_from_draft(PropertyId::new(id.to_string()), draft, self.next_timestamp());
        locked(&self.rows).push(row.clone());
        Ok(row)
    }

    async fn update(&self, id: &PropertyId, draft: &PropertyDraft) -> Result<Property> {
        let updated_at = self.next_timestamp();
        let mut rows = locked(&self.rows);
        let row = rows
            .iter_mut()
            .find(|row| &row.id == id)
            .ok_or(ServiceError::NotFound)?;

        let created_at = row.created_at.unwrap_or(updated_at);
        *row = Property {
            updated_at: Some(updated_at),
            ..row_from_draft(id.clone(), draft, created_at)
        };
        Ok(row.clone())
    }

    async fn delete(&self, id: &PropertyId) -> Result<()> {
        if self.fail_deletes.load(AtomicOrdering::SeqCst) {
            return Err(unavailable("Banco de dados"));
        }
        locked(&self.rows).retain(|row| &row.id != id);
        Ok(())
    }
}

#[async_trait]
impl ImageStore for MemoryBackend {
    async fn upload(&self, path: &str, bytes: Vec<u8>, _content_type: &str) -> Result<()> {
        let attempt = self.uploads_attempted.fetch_add(1, AtomicOrdering::SeqCst) + 1;
        if self.fail_uploads.load(AtomicOrdering::SeqCst)
            || *locked(&self.fail_upload_at) == Some(attempt)
        {
            return Err(unavailable("Armazenamento"));
        }
        let mut objects = locked(&self.objects);
        if objects.contains_key(path) {
            return Err(ServiceError::Service {
                status: 409,
                message: "The resource already exists".to_string(),
            });
        }
        objects.insert(path.to_string(), bytes);
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, self.bucket, path
        )
    }

    async fn remove(&self, paths: &[String]) -> Result<()> {
        if self.fail_removals.load(AtomicOrdering::SeqCst) {
            return Err(unavailable("Armazenamento"));
        }
        let mut objects = locked(&self.objects);
        for path in paths {
            objects.remove(path);
        }
        Ok(())
    }
}

#[async_trait]
impl AuthProvider for MemoryBackend {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session> {
        let accounts = locked(&self.accounts);
        let account = accounts
            .get(&email.to_lowercase())
            .filter(|account| account.password == password)
            .ok_or_else(|| ServiceError::Service {
                status: 400,
                message: "Invalid login credentials".to_string(),
            })?;

        let session = Session {
            access_token: uuid::Uuid::new_v4().simple().to_string(),
            refresh_token: None,
            expires_in: Some(3600),
            user: account.user.clone(),
        };
        *locked(&self.session) = Some(session.clone());
        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str, metadata: Value) -> Result<()> {
        if password.len() < 6 {
            return Err(ServiceError::Service {
                status: 422,
                message: "Password should be at least 6 characters".to_string(),
            });
        }

        let mut accounts = locked(&self.accounts);
        let key = email.to_lowercase();
        if accounts.contains_key(&key) {
            return Err(ServiceError::Service {
                status: 422,
                message: "User already registered".to_string(),
            });
        }
        accounts.insert(
            key,
            Account {
                password: password.to_string(),
                user: AuthUser {
                    id: uuid::Uuid::new_v4().to_string(),
                    email: Some(email.to_string()),
                    user_metadata: metadata,
                },
            },
        );
        Ok(())
    }

    async fn reset_password_for_email(&self, email: &str, redirect_to: &str) -> Result<()> {
        locked(&self.password_resets).push((email.to_string(), redirect_to.to_string()));
        Ok(())
    }

    async fn current_user(&self) -> Result<Option<AuthUser>> {
        Ok(locked(&self.session).as_ref().map(|session| session.user.clone()))
    }

    async fn sign_out(&self) -> Result<()> {
        *locked(&self.session) = None;
        Ok(())
    }
}

/// Demo listings as `(age in days, draft)`
fn demo_listings() -> Vec<(i64, PropertyDraft)> {
    let image = |name: &str| {
        format!(
            "{}/storage/v1/object/public/{}/properties/{}",
            LOCAL_URL, DEFAULT_BUCKET, name
        )
    };

    vec![
        (
            2,
            PropertyDraft {
                title: "Casa pé na areia na Praia da Velha".to_string(),
                location: "Praia da Velha, Camocim".to_string(),
                price: "R$ 850000".to_string(),
                bedrooms: 4,
                bathrooms: 3,
                area: 220.0,
                images: vec![image("praia-velha-1.jpg"), image("praia-velha-2.jpg")],
                featured: true,
                description: "Casa de frente para o mar com varanda ampla e área gourmet."
                    .to_string(),
                property_type: Some("Casa".to_string()),
                youtube_video: Some("https://youtu.be/terraventos01".to_string()),
            },
        ),
        (
            9,
            PropertyDraft {
                title: "Apartamento no Centro".to_string(),
                location: "Centro, Camocim".to_string(),
                price: "320000".to_string(),
                bedrooms: 2,
                bathrooms: 1,
                area: 75.0,
                images: vec![image("centro-1.jpg")],
                featured: false,
                description: "Apartamento reformado perto da orla, vista para o rio.".to_string(),
                property_type: Some("Apartamento".to_string()),
                youtube_video: None,
            },
        ),
        (
            20,
            PropertyDraft {
                title: "Pousada em Tatajuba".to_string(),
                location: "Tatajuba".to_string(),
                price: "930000".to_string(),
                bedrooms: 8,
                bathrooms: 8,
                area: 600.0,
                images: vec![],
                featured: false,
                description: "Pousada em funcionamento entre as dunas e a lagoa.".to_string(),
                property_type: Some("Comercial".to_string()),
                youtube_video: None,
            },
        ),
        (
            40,
            PropertyDraft {
                title: "Lote na Vila São Francisco".to_string(),
                location: "Vila São Francisco, Camocim".to_string(),
                price: "Sob consulta".to_string(),
                bedrooms: 0,
                bathrooms: 0,
                area: 360.0,
                images: vec![image("vila-sao-francisco-1.jpg")],
                featured: false,
                description: "Lote plano com escritura, pronto para construir.".to_string(),
                property_type: Some("Lote Urbano".to_string()),
                youtube_video: None,
            },
        ),
        (
            65,
            PropertyDraft {
                title: "Sítio com coqueiral".to_string(),
                location: "Zona Rural, Camocim".to_string(),
                price: "780000".to_string(),
                bedrooms: 3,
                bathrooms: 2,
                area: 12000.0,
                images: vec![image("sitio-1.jpg"), image("sitio-2.jpg")],
                featured: true,
                description: "Sítio com casa sede, poço artesiano e coqueiral produtivo."
                    .to_string(),
                property_type: Some("Rural".to_string()),
                youtube_video: None,
            },
        ),
    ]
}
