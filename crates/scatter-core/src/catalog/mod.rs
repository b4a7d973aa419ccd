mod queries;
mod schema;

pub use queries::CatalogDb;
pub use schema::migrate;
