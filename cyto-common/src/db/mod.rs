//! Database models, schema and the Schema Store

pub mod init;
pub mod models;
pub mod populations;
pub mod store;

pub use init::SCHEMA_TABLES;
pub use models::*;
pub use populations::PopulationVocabulary;
pub use store::CytometryStore;
