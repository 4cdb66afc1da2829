pub mod entity_service;
pub mod password;

pub use entity_service::{EntityService, Listing};
