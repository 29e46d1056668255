mod rows;
pub mod schema;
mod session;
pub mod upsert;

pub use schema::REQUIRED_TABLES;
pub use session::Session;
