pub mod invoice;
pub mod supplier;
pub mod user;

pub use invoice::{Invoice, InvoiceListItem, InvoiceStatus};
pub use supplier::{ProfileUpdate, SupplierProfile};
pub use user::{DirectoryUser, Role};
