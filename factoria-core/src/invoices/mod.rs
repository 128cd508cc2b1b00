pub mod handlers;
pub mod repository;
pub mod service;
pub mod stats;


pub use handlers::{
    create_invoice, dashboard_stats, list_invoices, process_invoice, update_invoice_status,
};
pub use repository::{InvoiceRepository, PgInvoiceRepository};
pub use service::InvoiceService;
