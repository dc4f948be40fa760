pub mod ingest;
pub mod inventory;
pub mod query;
pub mod status;
