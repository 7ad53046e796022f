//! Terraventos: real-estate listing catalogue, detail pages, admin CRUD and
//! authentication on top of a hosted backend (rows, object storage, auth).

pub mod admin;
pub mod auth;
pub mod backend;
pub mod catalog;
pub mod config;
pub mod error;
pub mod models;

pub use config::Config;
pub use error::ServiceError;
pub use models::{Filters, NumericRange, Property, PropertyDraft, PropertyId, PropertyType};
