pub mod handlers;
pub mod repository;

pub use handlers::{get_profile, put_profile};
pub use repository::{PgSupplierRepository, SupplierRepository};
