//! Storage domain - credential store abstraction

mod entity;
mod repository;

pub use entity::{field_value, Document};
pub use repository::DocumentStore;

#[cfg(test)]
pub use repository::mock;
