//! View state of the public pages: home search, listing grid, featured
//! highlight and the per-property detail page.

use crate::backend::{PropertyStore, Query};
use crate::catalog::format::{
    cover_image, format_area, format_price, parse_price, time_ago, whatsapp_url,
    youtube_embed_url,
};
use crate::catalog::search;
use crate::error::{Result, ServiceError};
use crate::models::{Filters, NumericRange, Property, PropertyId};
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info, warn};

/// Similar listings are priced within this fraction of the current one
pub const SIMILAR_PRICE_VARIATION: f64 = 0.15;
pub const SIMILAR_LIMIT: usize = 2;

/// What a listing card shows
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PropertyCard {
    pub id: PropertyId,
    pub title: String,
    pub location: String,
    pub price: String,
    pub bedrooms: u32,
    pub bathrooms: u32,
    pub area: String,
    pub cover_image: String,
    pub featured: bool,
    pub contact_url: String,
}

impl PropertyCard {
    pub fn new(property: &Property, whatsapp_phone: &str) -> Self {
        Self {
            id: property.id.clone(),
            title: property
                .title
                .clone()
                .unwrap_or_else(|| "Título indisponível".to_string()),
            location: property
                .location
                .clone()
                .unwrap_or_else(|| "Local não informado".to_string()),
            price: match property.price.as_deref() {
                Some(price) => format_price(Some(price)),
                None => "Preço sob consulta".to_string(),
            },
            bedrooms: property.bedrooms.unwrap_or(0),
            bathrooms: property.bathrooms.unwrap_or(0),
            area: format_area(property.area),
            cover_image: cover_image(property).to_string(),
            featured: property.is_featured(),
            contact_url: whatsapp_url(whatsapp_phone, property),
        }
    }
}

/// Home page: every listing, narrowed by a search term and filters
#[derive(Debug, Clone, Default)]
pub struct HomePage {
    properties: Vec<Property>,
    search_term: String,
    filters: Filters,
}

impl HomePage {
    pub fn new(properties: Vec<Property>) -> Self {
        Self {
            properties,
            ..Self::default()
        }
    }

    pub async fn load(store: &dyn PropertyStore) -> Result<Self> {
        let properties = store.select(&Query::new()).await.map_err(|e| {
            error!("Erro ao buscar propriedades: {}", e);
            e
        })?;
        info!("Loaded {} properties for the home page", properties.len());
        Ok(Self::new(properties))
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    pub fn search_term(&self) -> &str {
        &self.search_term
    }

    pub fn set_search_term(&mut self, term: impl Into<String>) {
        self.search_term = term.into();
    }

    pub fn filters(&self) -> &Filters {
        &self.filters
    }

    pub fn set_filters(&mut self, filters: Filters) {
        self.filters = filters;
    }

    pub fn has_active_filters(&self) -> bool {
        self.filters.is_active()
    }

    /// Whether the page is showing search results rather than the full grid
    pub fn show_search_results(&self) -> bool {
        !self.search_term.trim().is_empty() || self.has_active_filters()
    }

    /// Listings to render: the full list, or the search results
    pub fn visible(&self) -> Vec<&Property> {
        if !self.show_search_results() {
            return self.properties.iter().collect();
        }
        let found = search::apply(&self.properties, &self.search_term, &self.filters);
        debug!(
            "Search {:?} matched {} of {} properties",
            self.search_term,
            found.len(),
            self.properties.len()
        );
        found
    }

    /// Drop the search term and every filter
    pub fn clear(&mut self) {
        self.search_term.clear();
        self.filters = Filters::default();
    }
}

/// All listings, newest first
pub async fn list_properties(store: &dyn PropertyStore) -> Result<Vec<Property>> {
    store
        .select(&Query::new().newest_first())
        .await
        .map_err(|e| {
            error!("Erro ao carregar propriedades: {}", e);
            e
        })
}

/// Most recent featured listings
pub async fn featured_properties(store: &dyn PropertyStore, limit: usize) -> Result<Vec<Property>> {
    store
        .select(&Query::new().eq("featured", true).newest_first().limit(limit))
        .await
        .map_err(|e| {
            error!("Erro ao buscar propriedades em destaque: {}", e);
            e
        })
}

/// Up to `limit` other listings priced within ±15% of `property`.
///
/// Best-effort: lookup failures are logged and yield no suggestions.
pub async fn similar_properties(
    store: &dyn PropertyStore,
    property: &Property,
    limit: usize,
) -> Vec<Property> {
    let price = parse_price(property.price.as_deref().unwrap_or_default());
    if price == 0.0 {
        return Vec::new();
    }

    let candidates = match store
        .select(&Query::new().neq("id", property.id.as_str()))
        .await
    {
        Ok(candidates) => candidates,
        Err(e) => {
            warn!("Erro ao buscar propriedades similares: {}", e);
            return Vec::new();
        }
    };

    let filters = Filters {
        price_range: Some(NumericRange::new(
            Some(price * (1.0 - SIMILAR_PRICE_VARIATION)),
            Some(price * (1.0 + SIMILAR_PRICE_VARIATION)),
        )),
        ..Filters::default()
    };

    search::apply(&candidates, "", &filters)
        .into_iter()
        .take(limit)
        .cloned()
        .collect()
}

/// Detail page of a single listing
#[derive(Debug, Clone, Serialize)]
pub struct PropertyDetail {
    pub property: Property,
    /// Image shown large; the first one until another is picked
    pub main_image: Option<String>,
    pub formatted_price: String,
    pub formatted_area: String,
    pub time_ago: String,
    pub contact_url: String,
    pub video_embed_url: Option<String>,
    pub similar: Vec<Property>,
}

impl PropertyDetail {
    pub async fn load(
        store: &dyn PropertyStore,
        id: &PropertyId,
        whatsapp_phone: &str,
    ) -> Result<Self> {
        let property = store
            .fetch(id)
            .await
            .map_err(|e| {
                error!("Erro ao buscar dados da propriedade {}: {}", id, e);
                e
            })?
            .ok_or(ServiceError::NotFound)?;

        let similar = similar_properties(store, &property, SIMILAR_LIMIT).await;

        Ok(Self {
            main_image: property.images.first().cloned(),
            formatted_price: format_price(property.price.as_deref()),
            formatted_area: format_area(property.area),
            time_ago: time_ago(property.created_at, Utc::now()),
            contact_url: whatsapp_url(whatsapp_phone, &property),
            video_embed_url: property.youtube_video.as_deref().and_then(youtube_embed_url),
            similar,
            property,
        })
    }

    /// Switch the large image to one of the listing's images
    pub fn select_image(&mut self, index: usize) -> bool {
        match self.property.images.get(index) {
            Some(image) => {
                self.main_image = Some(image.clone());
                true
            }
            None => false,
        }
    }

    pub fn similar_cards(&self, whatsapp_phone: &str) -> Vec<PropertyCard> {
        self.similar
            .iter()
            .map(|property| PropertyCard::new(property, whatsapp_phone))
            .collect()
    }
}
