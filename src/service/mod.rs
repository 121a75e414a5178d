//! CrudService: entity reads and writes through the SQL builder.

mod crud;
mod row;
pub use crud::{CrudService, Welcome};
