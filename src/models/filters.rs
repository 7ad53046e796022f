use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Inclusive numeric bounds; an absent side is open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NumericRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl NumericRange {
    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self { min, max }
    }

    pub fn is_unbounded(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    pub fn contains(&self, value: f64) -> bool {
        if let Some(min) = self.min {
            if value < min {
                return false;
            }
        }
        if let Some(max) = self.max {
            if value > max {
                return false;
            }
        }
        true
    }
}

/// Listing categories offered by the filter form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyType {
    Casa,
    Apartamento,
    Terreno,
    Comercial,
    Rural,
    #[serde(rename = "Lote Urbano")]
    LoteUrbano,
}

impl PropertyType {
    pub const ALL: [PropertyType; 6] = [
        PropertyType::Casa,
        PropertyType::Apartamento,
        PropertyType::Terreno,
        PropertyType::Comercial,
        PropertyType::Rural,
        PropertyType::LoteUrbano,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            PropertyType::Casa => "Casa",
            PropertyType::Apartamento => "Apartamento",
            PropertyType::Terreno => "Terreno",
            PropertyType::Comercial => "Comercial",
            PropertyType::Rural => "Rural",
            PropertyType::LoteUrbano => "Lote Urbano",
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for PropertyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.label().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("Tipo de imóvel desconhecido: {}", wanted))
    }
}

/// Client-side constraints narrowing the listing collection.
///
/// Every field is optional and `None` never excludes anything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Filters {
    pub price_range: Option<NumericRange>,
    pub area: Option<NumericRange>,
    /// At least this many bedrooms
    pub bedrooms: Option<u32>,
    /// At least this many bathrooms
    pub bathrooms: Option<u32>,
    /// Case-insensitive substring of the listing location
    pub location: Option<String>,
    pub property_type: Option<PropertyType>,
    pub featured: Option<bool>,
}

impl Filters {
    /// Whether any field would actually constrain a listing.
    pub fn is_active(&self) -> bool {
        let bounded = |range: &Option<NumericRange>| range.map_or(false, |r| !r.is_unbounded());

        bounded(&self.price_range)
            || bounded(&self.area)
            || self.bedrooms.is_some()
            || self.bathrooms.is_some()
            || self.location.as_deref().map_or(false, |l| !l.trim().is_empty())
            || self.property_type.is_some()
            || self.featured.is_some()
    }
}
