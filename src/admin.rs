//! Admin dashboard: listing CRUD and the listing images in object storage.

use crate::backend::{ImageStore, PropertyStore, Query};
use crate::error::{Result, ServiceError};
use crate::models::{ImageUpload, Property, PropertyDraft, PropertyId};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Storage folder holding every listing image
pub const IMAGE_FOLDER: &str = "properties";

/// Collision-resistant storage key: `properties/<unix millis>-<random>.<ext>`
pub fn storage_key(upload: &ImageUpload, now: DateTime<Utc>) -> String {
    let nonce = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "{}/{}-{}.{}",
        IMAGE_FOLDER,
        now.timestamp_millis(),
        &nonce[..12],
        upload.extension()
    )
}

/// Storage key of an image from its public URL (the last path segment).
pub fn storage_path_from_url(url: &str) -> Option<String> {
    let without_query = url.split(|c| c == '?' || c == '#').next()?;
    let name = without_query.rsplit('/').next()?;
    if name.is_empty() {
        return None;
    }
    Some(format!("{}/{}", IMAGE_FOLDER, name))
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormMode {
    Create,
    Edit {
        id: PropertyId,
        original_images: Vec<String>,
    },
}

/// The create/edit modal: the draft plus the images it will end up with
#[derive(Debug, Clone)]
pub struct PropertyForm {
    mode: FormMode,
    pub draft: PropertyDraft,
    existing_images: Vec<String>,
    pending_uploads: Vec<ImageUpload>,
}

impl PropertyForm {
    pub fn create() -> Self {
        Self {
            mode: FormMode::Create,
            draft: PropertyDraft::default(),
            existing_images: Vec::new(),
            pending_uploads: Vec::new(),
        }
    }

    pub fn edit(property: &Property) -> Self {
        Self {
            mode: FormMode::Edit {
                id: property.id.clone(),
                original_images: property.images.clone(),
            },
            draft: PropertyDraft {
                images: Vec::new(),
                ..PropertyDraft::from(property)
            },
            existing_images: property.images.clone(),
            pending_uploads: Vec::new(),
        }
    }

    pub fn mode(&self) -> &FormMode {
        &self.mode
    }

    pub fn existing_images(&self) -> &[String] {
        &self.existing_images
    }

    pub fn pending_uploads(&self) -> &[ImageUpload] {
        &self.pending_uploads
    }

    /// Replace the selected files
    pub fn set_uploads(&mut self, uploads: Vec<ImageUpload>) {
        self.pending_uploads = uploads;
    }

    pub fn add_upload(&mut self, upload: ImageUpload) {
        self.pending_uploads.push(upload);
    }

    pub fn remove_existing_image(&mut self, index: usize) -> Option<String> {
        (index < self.existing_images.len()).then(|| self.existing_images.remove(index))
    }

    pub fn remove_upload(&mut self, index: usize) -> Option<ImageUpload> {
        (index < self.pending_uploads.len()).then(|| self.pending_uploads.remove(index))
    }

    pub fn validate(&self) -> Result<()> {
        if self.draft.title.trim().is_empty() {
            return Err(ServiceError::validation("O título é obrigatório."));
        }
        if self.draft.price.trim().is_empty() {
            return Err(ServiceError::validation("O preço é obrigatório."));
        }
        if !self.draft.area.is_finite() || self.draft.area < 0.0 {
            return Err(ServiceError::validation("A área não pode ser negativa."));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DashboardStats {
    pub total: usize,
    pub featured: usize,
}

pub struct AdminDashboard {
    store: Arc<dyn PropertyStore>,
    images: Arc<dyn ImageStore>,
    properties: Vec<Property>,
    search_term: String,
    error: Option<String>,
}

impl AdminDashboard {
    pub fn new(store: Arc<dyn PropertyStore>, images: Arc<dyn ImageStore>) -> Self {
        Self {
            store,
            images,
            properties: Vec::new(),
            search_term: String::new(),
            error: None,
        }
    }

    /// Banner message of the last failed action
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    pub fn set_search_term(&mut self, term: impl Into<String>) {
        self.search_term = term.into();
    }

    /// Listings whose title or location contains the search term
    pub fn visible(&self) -> Vec<&Property> {
        let term = self.search_term.to_lowercase();
        self.properties
            .iter()
            .filter(|p| {
                let title = p.title.as_deref().unwrap_or_default().to_lowercase();
                let location = p.location.as_deref().unwrap_or_default().to_lowercase();
                title.contains(&term) || location.contains(&term)
            })
            .collect()
    }

    pub fn stats(&self) -> DashboardStats {
        DashboardStats {
            total: self.properties.len(),
            featured: self.properties.iter().filter(|p| p.is_featured()).count(),
        }
    }

    pub fn open_create(&self) -> PropertyForm {
        PropertyForm::create()
    }

    pub fn open_edit(&self, id: &PropertyId) -> Option<PropertyForm> {
        self.properties
            .iter()
            .find(|p| &p.id == id)
            .map(PropertyForm::edit)
    }

    fn record<T>(&mut self, context: &str, result: Result<T>) -> Result<T> {
        match result {
            Ok(value) => {
                self.error = None;
                Ok(value)
            }
            Err(e) => {
                error!("{}: {}", context, e);
                self.error = Some(e.localized(context));
                Err(e)
            }
        }
    }

    /// Reload every listing, newest first
    pub async fn refresh(&mut self) -> Result<()> {
        let result = self.store.select(&Query::new().newest_first()).await;
        let properties = self.record("Erro ao carregar propriedades", result)?;
        info!("Admin loaded {} properties", properties.len());
        self.properties = properties;
        Ok(())
    }

    /// Save a create or edit form and update the list in place
    pub async fn submit(&mut self, form: PropertyForm) -> Result<Property> {
        let result = self.save(&form).await;
        self.record("Erro ao salvar propriedade", result)
    }

    async fn save(&mut self, form: &PropertyForm) -> Result<Property> {
        form.validate()?;

        let mut images = form.existing_images.clone();
        if !form.pending_uploads.is_empty() {
            images.extend(self.upload_images(&form.pending_uploads).await?);
        }
        let draft = PropertyDraft {
            images,
            ..form.draft.clone()
        };

        match &form.mode {
            FormMode::Create => {
                let row = self.store.insert(&draft).await?;
                info!("Created property {}", row.id);
                self.properties.insert(0, row.clone());
                Ok(row)
            }
            FormMode::Edit {
                id,
                original_images,
            } => {
                let row = self.store.update(id, &draft).await?;
                let removed: Vec<String> = original_images
                    .iter()
                    .filter(|url| !draft.images.contains(url))
                    .cloned()
                    .collect();
                self.delete_images(&removed).await;

                if let Some(slot) = self.properties.iter_mut().find(|p| &p.id == id) {
                    *slot = row.clone();
                }
                info!("Updated property {}", row.id);
                Ok(row)
            }
        }
    }

    /// Delete a listing and, best-effort, its stored images
    pub async fn delete(&mut self, id: &PropertyId) -> Result<()> {
        let result = self.remove_listing(id).await;
        self.record("Erro ao deletar propriedade", result)
    }

    async fn remove_listing(&mut self, id: &PropertyId) -> Result<()> {
        let images = self
            .properties
            .iter()
            .find(|p| &p.id == id)
            .map(|p| p.images.clone())
            .unwrap_or_default();

        self.store.delete(id).await?;
        self.properties.retain(|p| &p.id != id);
        self.delete_images(&images).await;
        info!("Deleted property {}", id);
        Ok(())
    }

    /// Upload every file concurrently and return their public URLs in
    /// input order. If any upload fails, the ones that succeeded are
    /// removed again and the first failure is returned.
    pub async fn upload_images(&self, uploads: &[ImageUpload]) -> Result<Vec<String>> {
        let now = Utc::now();
        let images = &self.images;
        let attempts = uploads.iter().map(|upload| async move {
            let key = storage_key(upload, now);
            let outcome = images
                .upload(&key, upload.bytes.clone(), &upload.content_type)
                .await;
            (key, outcome)
        });
        let results = join_all(attempts).await;

        let mut uploaded = Vec::with_capacity(results.len());
        let mut failure = None;
        for (key, outcome) in results {
            match outcome {
                Ok(()) => uploaded.push(key),
                Err(e) => {
                    warn!("Upload of {} failed: {}", key, e);
                    failure.get_or_insert(e);
                }
            }
        }

        if let Some(e) = failure {
            if !uploaded.is_empty() {
                if let Err(cleanup) = images.remove(&uploaded).await {
                    warn!("Erro ao deletar imagem: {}", cleanup);
                }
            }
            return Err(e);
        }

        info!("Uploaded {} images", uploaded.len());
        Ok(uploaded.iter().map(|key| images.public_url(key)).collect())
    }

    /// Remove stored images by public URL; failures are logged only
    async fn delete_images(&self, urls: &[String]) {
        let paths: Vec<String> = urls
            .iter()
            .filter_map(|url| storage_path_from_url(url))
            .collect();
        if paths.is_empty() {
            return;
        }
        if let Err(e) = self.images.remove(&paths).await {
            warn!("Erro ao deletar imagem: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;

    fn dashboard(backend: &Arc<MemoryBackend>) -> AdminDashboard {
        AdminDashboard::new(backend.clone(), backend.clone())
    }

    fn filled_form(title: &str) -> PropertyForm {
        let mut form = PropertyForm::create();
        form.draft.title = title.to_string();
        form.draft.location = "Centro, Camocim".to_string();
        form.draft.price = "250000".to_string();
        form
    }

    #[test]
    fn storage_keys_are_unique_and_keep_extension() {
        let upload = ImageUpload::new("sala.png", vec![0]);
        let now = Utc::now();
        let a = storage_key(&upload, now);
        let b = storage_key(&upload, now);
        assert_ne!(a, b);
        assert!(a.starts_with(&format!("properties/{}-", now.timestamp_millis())));
        assert!(a.ends_with(".png"));
    }

    #[test]
    fn storage_path_from_public_url() {
        let url = concat!(
            "https://x.supabase.co/storage/v1/object/public/",
            "property-images/properties/1-ab.jpg?v=2"
        );
        assert_eq!(
            storage_path_from_url(url).as_deref(),
            Some("properties/1-ab.jpg")
        );
        assert_eq!(storage_path_from_url("https://cdn/"), None);
    }

    #[test]
    fn form_defaults_and_validation() {
        let form = PropertyForm::create();
        assert_eq!(form.draft.bedrooms, 1);
        assert_eq!(form.draft.bathrooms, 1);
        assert!(!form.draft.featured);
        assert_eq!(form.validate().unwrap_err().to_string(), "O título é obrigatório.");

        let mut form = filled_form("Casa");
        form.draft.area = -5.0;
        assert!(form.validate().unwrap_err().is_validation());
    }

    #[tokio::test]
    async fn validation_failure_makes_no_call() {
        let backend = Arc::new(MemoryBackend::new());
        let mut admin = dashboard(&backend);

        let err = admin.submit(PropertyForm::create()).await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(admin.error(), Some("O título é obrigatório."));
        assert!(backend.rows().is_empty());
    }

    #[tokio::test]
    async fn create_uploads_images_and_prepends_row() {
        let backend = Arc::new(MemoryBackend::seeded());
        let mut admin = dashboard(&backend);
        admin.refresh().await.unwrap();
        let before = admin.properties().len();

        let mut form = filled_form("Casa nova");
        form.set_uploads(vec![
            ImageUpload::new("frente.jpg", vec![1]),
            ImageUpload::new("fundos.jpg", vec![2]),
        ]);
        let created = admin.submit(form).await.unwrap();

        assert_eq!(admin.properties().len(), before + 1);
        assert_eq!(admin.properties()[0].id, created.id);
        assert_eq!(created.images.len(), 2);
        assert!(created.images.iter().all(|url| url.contains("/properties/")));
        assert_eq!(backend.object_keys().len(), 2);
        assert_eq!(admin.error(), None);
    }

    #[tokio::test]
    async fn failed_upload_aborts_submission() {
        let backend = Arc::new(MemoryBackend::new());
        let mut admin = dashboard(&backend);
        backend.fail_uploads(true);

        let mut form = filled_form("Casa");
        form.add_upload(ImageUpload::new("a.jpg", vec![1]));
        form.add_upload(ImageUpload::new("b.jpg", vec![2]));
        let err = admin.submit(form).await.unwrap_err();

        assert!(!err.is_validation());
        assert!(backend.rows().is_empty());
        assert!(admin.properties().is_empty());
        assert!(admin
            .error()
            .unwrap()
            .starts_with("Erro ao salvar propriedade: "));
    }

    #[tokio::test]
    async fn one_failed_upload_removes_its_siblings() {
        let backend = Arc::new(MemoryBackend::new());
        let mut admin = dashboard(&backend);
        backend.fail_nth_upload(2);

        let mut form = filled_form("Casa");
        form.set_uploads(vec![
            ImageUpload::new("a.jpg", vec![1]),
            ImageUpload::new("b.jpg", vec![2]),
            ImageUpload::new("c.jpg", vec![3]),
        ]);
        let err = admin.submit(form).await.unwrap_err();

        assert!(!err.is_validation());
        assert!(backend.rows().is_empty());
        assert!(backend.object_keys().is_empty());
        assert!(admin
            .error()
            .unwrap()
            .starts_with("Erro ao salvar propriedade: "));
    }

    #[tokio::test]
    async fn edit_keeps_order_and_drops_removed_images() {
        let backend = Arc::new(MemoryBackend::new());
        let mut admin = dashboard(&backend);

        let mut form = filled_form("Casa");
        form.set_uploads(vec![
            ImageUpload::new("1.jpg", vec![1]),
            ImageUpload::new("2.jpg", vec![2]),
        ]);
        let created = admin.submit(form).await.unwrap();

        let mut edit = admin.open_edit(&created.id).unwrap();
        assert_eq!(edit.existing_images(), created.images.as_slice());
        let dropped = edit.remove_existing_image(0).unwrap();
        edit.add_upload(ImageUpload::new("3.jpg", vec![3]));
        edit.draft.featured = true;
        let updated = admin.submit(edit).await.unwrap();

        assert_eq!(updated.images.len(), 2);
        assert_eq!(updated.images[0], created.images[1]);
        assert!(!updated.images.contains(&dropped));
        assert_eq!(backend.object_keys().len(), 2);
        assert_eq!(admin.stats(), DashboardStats { total: 1, featured: 1 });
    }

    #[tokio::test]
    async fn delete_survives_image_removal_failure() {
        let backend = Arc::new(MemoryBackend::seeded());
        let mut admin = dashboard(&backend);
        admin.refresh().await.unwrap();

        let target = admin
            .properties()
            .iter()
            .find(|p| !p.images.is_empty())
            .unwrap()
            .id
            .clone();
        backend.fail_removals(true);

        admin.delete(&target).await.unwrap();
        assert!(admin.properties().iter().all(|p| p.id != target));
        assert!(backend.rows().iter().all(|p| p.id != target));
        assert_eq!(admin.error(), None);
    }

    #[tokio::test]
    async fn failed_row_delete_keeps_images() {
        let backend = Arc::new(MemoryBackend::new());
        let mut admin = dashboard(&backend);

        let mut form = filled_form("Casa");
        form.add_upload(ImageUpload::new("frente.jpg", vec![1]));
        let created = admin.submit(form).await.unwrap();
        backend.fail_deletes(true);

        assert!(admin.delete(&created.id).await.is_err());
        assert_eq!(backend.object_keys().len(), 1);
        assert_eq!(backend.rows().len(), 1);
        assert!(admin.properties().iter().any(|p| p.id == created.id));
        assert!(admin
            .error()
            .unwrap()
            .starts_with("Erro ao deletar propriedade: "));
    }

    #[tokio::test]
    async fn refresh_failure_sets_banner() {
        let backend = Arc::new(MemoryBackend::seeded());
        let mut admin = dashboard(&backend);
        backend.fail_selects(true);

        assert!(admin.refresh().await.is_err());
        assert!(admin
            .error()
            .unwrap()
            .starts_with("Erro ao carregar propriedades: "));
    }

    #[tokio::test]
    async fn admin_search_matches_title_or_location() {
        let backend = Arc::new(MemoryBackend::seeded());
        let mut admin = dashboard(&backend);
        admin.refresh().await.unwrap();

        admin.set_search_term("TATAJUBA");
        assert_eq!(admin.visible().len(), 1);

        admin.set_search_term("camocim");
        assert_eq!(admin.visible().len(), 4);

        admin.set_search_term("");
        assert_eq!(admin.visible().len(), admin.stats().total);
        assert_eq!(admin.stats().featured, 2);
    }
}
