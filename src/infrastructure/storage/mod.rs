//! Storage infrastructure - credential store and ledger backends

mod factory;
mod in_memory;
mod postgres;
mod stores;

pub use factory::{StorageConfig, StorageFactory, StorageType};
pub use in_memory::InMemoryDocumentStore;
pub use postgres::{PostgresConfig, PostgresDocumentStore};
pub use stores::CredentialStores;
