use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

use crate::models::{Invoice, InvoiceStatus};

const RECENT_LIMIT: usize = 5;

/// Aggregates shown on the admin dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardStats {
    pub total_invoices: usize,
    pub by_status: BTreeMap<&'static str, usize>,
    pub processed_count: usize,
    pub total_suppliers: usize,
    pub recent_invoices: Vec<RecentInvoice>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentInvoice {
    pub invoice_id: String,
    pub status: InvoiceStatus,
    #[serde(rename = "monto_total")]
    pub total_amount: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Computes dashboard aggregates over every stored invoice.
pub fn compute_stats(invoices: &[Invoice]) -> DashboardStats {
    let mut by_status: BTreeMap<&'static str, usize> =
        InvoiceStatus::ALL.iter().map(|s| (s.as_str(), 0)).collect();

    for invoice in invoices {
        *by_status.entry(invoice.status.as_str()).or_insert(0) += 1;
    }

    let processed_count = invoices.iter().filter(|i| i.processed).count();
    let total_suppliers = invoices
        .iter()
        .map(|i| i.supplier_uid.as_str())
        .collect::<HashSet<_>>()
        .len();

    let mut newest: Vec<&Invoice> = invoices.iter().collect();
    newest.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let recent_invoices = newest
        .into_iter()
        .take(RECENT_LIMIT)
        .map(|i| RecentInvoice {
            invoice_id: i.id.clone(),
            status: i.status,
            total_amount: i.total_amount.clone(),
            created_at: i.created_at,
        })
        .collect();

    DashboardStats {
        total_invoices: invoices.len(),
        by_status,
        processed_count,
        total_suppliers,
        recent_invoices,
    }
}
