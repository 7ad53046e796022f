//! Search term and filter predicates over an in-memory listing collection.

use crate::catalog::format::parse_price;
use crate::models::{Filters, Property};

fn text(field: &Option<String>) -> String {
    field.as_deref().unwrap_or_default().to_lowercase()
}

/// Whether `property` satisfies every defined field of `filters`.
pub fn matches_filters(property: &Property, filters: &Filters) -> bool {
    if let Some(range) = &filters.price_range {
        let price = parse_price(property.price.as_deref().unwrap_or_default());
        if !range.contains(price) {
            return false;
        }
    }

    if let Some(range) = &filters.area {
        if !range.contains(property.area.unwrap_or(0.0)) {
            return false;
        }
    }

    if let Some(min) = filters.bedrooms {
        if property.bedrooms.unwrap_or(0) < min {
            return false;
        }
    }

    if let Some(min) = filters.bathrooms {
        if property.bathrooms.unwrap_or(0) < min {
            return false;
        }
    }

    if let Some(location) = filters.location.as_deref().map(str::trim) {
        if !location.is_empty() && !text(&property.location).contains(&location.to_lowercase()) {
            return false;
        }
    }

    if let Some(kind) = filters.property_type {
        let listed = property.property_type.as_deref().unwrap_or_default().trim();
        if !listed.eq_ignore_ascii_case(kind.label()) {
            return false;
        }
    }

    if let Some(featured) = filters.featured {
        if property.is_featured() != featured {
            return false;
        }
    }

    true
}

/// Case-insensitive match of `term` against title, location or description.
/// A blank term matches everything.
pub fn matches_search(property: &Property, term: &str) -> bool {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return true;
    }

    text(&property.title).contains(&term)
        || text(&property.location).contains(&term)
        || text(&property.description).contains(&term)
}

/// Listings passing both the search term and the filters, in input order.
pub fn apply<'a>(properties: &'a [Property], term: &str, filters: &Filters) -> Vec<&'a Property> {
    properties
        .iter()
        .filter(|property| matches_search(property, term))
        .filter(|property| matches_filters(property, filters))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NumericRange, PropertyId, PropertyType};

    fn listing(id: &str) -> Property {
        Property {
            id: PropertyId::new(id),
            title: None,
            location: None,
            price: None,
            description: None,
            bedrooms: None,
            bathrooms: None,
            area: None,
            images: Vec::new(),
            featured: None,
            property_type: None,
            youtube_video: None,
            created_at: None,
            updated_at: None,
        }
    }

    fn sample() -> Vec<Property> {
        vec![
            Property {
                title: Some("Casa pé na areia".to_string()),
                location: Some("Praia da Velha, Camocim".to_string()),
                price: Some("R$ 850000".to_string()),
                bedrooms: Some(3),
                bathrooms: Some(2),
                area: Some(180.0),
                featured: Some(true),
                property_type: Some("Casa".to_string()),
                ..listing("1")
            },
            Property {
                title: Some("Apartamento no Centro".to_string()),
                location: Some("Centro, Camocim".to_string()),
                price: Some("320000".to_string()),
                description: Some("Vista para a praia e o rio".to_string()),
                bedrooms: Some(2),
                bathrooms: Some(1),
                area: Some(75.0),
                property_type: Some("apartamento".to_string()),
                ..listing("2")
            },
            Property {
                title: Some("Terreno Tatajuba".to_string()),
                location: Some("Tatajuba".to_string()),
                price: Some("Sob consulta".to_string()),
                ..listing("3")
            },
        ]
    }

    fn ids(found: Vec<&Property>) -> Vec<&str> {
        found.into_iter().map(|p| p.id.as_str()).collect()
    }

    #[test]
    fn bedroom_threshold_is_inclusive_minimum() {
        let props = sample();
        let house = &props[0];

        let at_least_two = Filters {
            bedrooms: Some(2),
            ..Filters::default()
        };
        let at_least_three = Filters {
            bedrooms: Some(3),
            ..Filters::default()
        };
        let at_least_four = Filters {
            bedrooms: Some(4),
            ..Filters::default()
        };

        assert!(matches_filters(house, &at_least_two));
        assert!(matches_filters(house, &at_least_three));
        assert!(!matches_filters(house, &at_least_four));
    }

    #[test]
    fn search_is_case_insensitive_across_text_fields() {
        let props = sample();
        assert_eq!(ids(apply(&props, "praia", &Filters::default())), vec!["1", "2"]);
        assert_eq!(ids(apply(&props, "  TATAJUBA ", &Filters::default())), vec!["3"]);
        assert!(apply(&props, "fortaleza", &Filters::default()).is_empty());
    }

    #[test]
    fn empty_search_and_filters_keep_everything() {
        let props = sample();
        assert_eq!(ids(apply(&props, "", &Filters::default())), vec!["1", "2", "3"]);
    }

    #[test]
    fn price_range_uses_parsed_price_and_missing_is_zero() {
        let props = sample();
        let filters = Filters {
            price_range: Some(NumericRange::new(Some(300_000.0), Some(900_000.0))),
            ..Filters::default()
        };
        assert_eq!(ids(apply(&props, "", &filters)), vec!["1", "2"]);

        let up_to = Filters {
            price_range: Some(NumericRange::new(None, Some(100.0))),
            ..Filters::default()
        };
        assert_eq!(ids(apply(&props, "", &up_to)), vec!["3"]);
    }

    #[test]
    fn area_location_type_and_featured() {
        let props = sample();

        let big = Filters {
            area: Some(NumericRange::new(Some(100.0), None)),
            ..Filters::default()
        };
        assert_eq!(ids(apply(&props, "", &big)), vec!["1"]);

        let camocim = Filters {
            location: Some("camocim".to_string()),
            ..Filters::default()
        };
        assert_eq!(ids(apply(&props, "", &camocim)), vec!["1", "2"]);

        let apartments = Filters {
            property_type: Some(PropertyType::Apartamento),
            ..Filters::default()
        };
        assert_eq!(ids(apply(&props, "", &apartments)), vec!["2"]);

        let not_featured = Filters {
            featured: Some(false),
            ..Filters::default()
        };
        assert_eq!(ids(apply(&props, "", &not_featured)), vec!["2", "3"]);
    }

    #[test]
    fn search_and_filters_combine_with_and() {
        let props = sample();
        let filters = Filters {
            bedrooms: Some(3),
            ..Filters::default()
        };
        assert_eq!(ids(apply(&props, "praia", &filters)), vec!["1"]);
        assert!(apply(&props, "tatajuba", &filters).is_empty());
    }

    #[test]
    fn filtering_never_adds_items() {
        let props = sample();
        let combos = [
            Filters::default(),
            Filters {
                bathrooms: Some(1),
                ..Filters::default()
            },
            Filters {
                featured: Some(true),
                location: Some("a".into()),
                ..Filters::default()
            },
            Filters {
                price_range: Some(NumericRange::new(Some(0.0), Some(0.0))),
                ..Filters::default()
            },
        ];
        for filters in &combos {
            for term in ["", "a", "casa", "zzz"] {
                let found = apply(&props, term, filters);
                assert!(found.len() <= props.len());
                assert!(found.iter().all(|p| props.iter().any(|q| q.id == p.id)));
            }
        }
    }
}
