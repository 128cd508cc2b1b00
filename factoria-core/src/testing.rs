//! In-memory stand-ins for the external services, used by unit tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};

use crate::auth::{Identity, IdentityProvider};
use crate::error::ApiError;
use crate::extraction::{ExtractedInvoiceData, GenerateResponse, GenerativeModel, InvoiceExtractor, TextExtractor};
use crate::invoices::repository::InvoiceRepository;
use crate::invoices::service::InvoiceService;
use crate::models::{DirectoryUser, Invoice, InvoiceStatus, ProfileUpdate, Role, SupplierProfile};
use crate::profiles::repository::SupplierRepository;
use crate::storage::BlobStore;
use crate::AppState;

pub const ADMIN_TOKEN: &str = "admin-token";
pub const SUPPLIER_TOKEN: &str = "supplier-token";
pub const OTHER_SUPPLIER_TOKEN: &str = "other-supplier-token";

pub fn admin() -> Identity {
    Identity {
        uid: "admin-1".into(),
        role: Some("admin".into()),
        email: Some("admin@factoria.test".into()),
    }
}

pub fn supplier() -> Identity {
    Identity {
        uid: "supplier-1".into(),
        role: Some("proveedor".into()),
        email: Some("ventas@acme.test".into()),
    }
}

pub fn other_supplier() -> Identity {
    Identity {
        uid: "supplier-2".into(),
        role: None,
        email: Some("contacto@beta.test".into()),
    }
}

#[derive(Default)]
pub struct MemoryInvoiceRepository {
    records: Mutex<HashMap<String, Invoice>>,
}

impl MemoryInvoiceRepository {
    pub fn snapshot(&self, id: &str) -> Option<Invoice> {
        self.records.lock().unwrap().get(id).cloned()
    }

    pub fn put(&self, invoice: Invoice) {
        self.records
            .lock()
            .unwrap()
            .insert(invoice.id.clone(), invoice);
    }
}

#[async_trait]
impl InvoiceRepository for MemoryInvoiceRepository {
    async fn insert(&self, invoice: &Invoice) -> Result<(), ApiError> {
        self.put(invoice.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Invoice>, ApiError> {
        Ok(self.snapshot(id))
    }

    async fn list_recent(&self, owner: Option<&str>, limit: i64) -> Result<Vec<Invoice>, ApiError> {
        let mut items: Vec<Invoice> = self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|i| owner.map_or(true, |uid| i.supplier_uid == uid))
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        items.truncate(limit as usize);
        Ok(items)
    }

    async fn all(&self) -> Result<Vec<Invoice>, ApiError> {
        Ok(self.records.lock().unwrap().values().cloned().collect())
    }

    async fn mark_processed(
        &self,
        id: &str,
        data: &ExtractedInvoiceData,
        processed_at: DateTime<Utc>,
    ) -> Result<bool, ApiError> {
        let mut records = self.records.lock().unwrap();
        let Some(invoice) = records.get_mut(id) else {
            return Ok(false);
        };
        invoice.is_invoice = Some(data.is_invoice);
        invoice.summary = data.summary.clone();
        invoice.total_amount = data.total_amount.clone();
        invoice.currency = data.currency.clone();
        invoice.issuer_tax_id = data.issuer_tax_id.clone();
        invoice.issuer_name = data.issuer_name.clone();
        invoice.issue_date = data.issue_date.clone();
        invoice.due_date = data.due_date.clone();
        invoice.invoice_number = data.invoice_number.clone();
        invoice.concept = data.concept.clone();
        invoice.confidence = Some(data.confidence.unwrap_or(0));
        invoice.processed = true;
        invoice.processed_at = Some(processed_at);
        Ok(true)
    }

    async fn update_status(
        &self,
        id: &str,
        status: InvoiceStatus,
        updated_by: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, ApiError> {
        let mut records = self.records.lock().unwrap();
        let Some(invoice) = records.get_mut(id) else {
            return Ok(false);
        };
        invoice.status = status;
        invoice.last_updated_by = Some(updated_by.to_string());
        invoice.last_updated_at = Some(updated_at);
        Ok(true)
    }

    async fn ping(&self) -> Result<(), ApiError> {
        Ok(())
    }
}

#[derive(Default)]
pub struct MemorySupplierRepository {
    profiles: Mutex<HashMap<String, SupplierProfile>>,
}

#[async_trait]
impl SupplierRepository for MemorySupplierRepository {
    async fn get(&self, uid: &str) -> Result<Option<SupplierProfile>, ApiError> {
        Ok(self.profiles.lock().unwrap().get(uid).cloned())
    }

    async fn upsert(
        &self,
        uid: &str,
        update: &ProfileUpdate,
        now: DateTime<Utc>,
    ) -> Result<SupplierProfile, ApiError> {
        let mut profiles = self.profiles.lock().unwrap();
        let merged = SupplierProfile::merged(uid, profiles.get(uid).cloned(), update.clone(), now);
        profiles.insert(uid.to_string(), merged.clone());
        Ok(merged)
    }
}

#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn contains(&self, path: &str) -> bool {
        self.blobs.lock().unwrap().contains_key(path)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, path: &str, bytes: &[u8], _content_type: &str) -> io::Result<()> {
        self.blobs
            .lock()
            .unwrap()
            .insert(path.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn get(&self, path: &str) -> io::Result<Vec<u8>> {
        self.blobs
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.to_string()))
    }
}

/// Treats the stored bytes as UTF-8 text, so tests control the "PDF" text.
pub struct Utf8TextExtractor;

impl TextExtractor for Utf8TextExtractor {
    fn extract_text(&self, bytes: &[u8]) -> String {
        String::from_utf8_lossy(bytes).into_owned()
    }
}

/// Identity provider with a fixed token table.
///
/// Like the Postgres directory, it starts empty and records each caller the
/// first time their token is verified.
pub struct StaticIdentityProvider {
    tokens: HashMap<String, Identity>,
    users: Mutex<Vec<DirectoryUser>>,
}

impl Default for StaticIdentityProvider {
    fn default() -> Self {
        let tokens = HashMap::from([
            (ADMIN_TOKEN.to_string(), admin()),
            (SUPPLIER_TOKEN.to_string(), supplier()),
            (OTHER_SUPPLIER_TOKEN.to_string(), other_supplier()),
        ]);

        Self {
            tokens,
            users: Mutex::new(Vec::new()),
        }
    }
}

impl StaticIdentityProvider {
    pub fn role_of(&self, uid: &str) -> Option<String> {
        self.users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.uid == uid)
            .and_then(|u| u.role.clone())
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn verify_token(&self, token: &str) -> Result<Identity, ApiError> {
        let identity = self
            .tokens
            .get(token)
            .cloned()
            .ok_or_else(|| ApiError::Authentication("invalid token".to_string()))?;

        let mut users = self.users.lock().unwrap();
        let stored_role = match users.iter_mut().find(|u| u.uid == identity.uid) {
            Some(user) => {
                if identity.email.is_some() {
                    user.email = identity.email.clone();
                }
                user.role.clone()
            }
            None => {
                users.push(DirectoryUser {
                    uid: identity.uid.clone(),
                    email: identity.email.clone(),
                    display_name: None,
                    role: None,
                    created_at: Utc::now(),
                });
                None
            }
        };

        Ok(identity.with_assigned_role(stored_role))
    }

    async fn get_user(&self, uid: &str) -> Result<Option<DirectoryUser>, ApiError> {
        Ok(self.users.lock().unwrap().iter().find(|u| u.uid == uid).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<DirectoryUser>, ApiError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.email.as_deref() == Some(email))
            .cloned())
    }

    async fn list_users(&self) -> Result<Vec<DirectoryUser>, ApiError> {
        Ok(self.users.lock().unwrap().clone())
    }

    async fn set_role(&self, uid: &str, role: Role) -> Result<(), ApiError> {
        let mut users = self.users.lock().unwrap();
        let user = users
            .iter_mut()
            .find(|u| u.uid == uid)
            .ok_or_else(|| ApiError::Dependency(format!("no user with uid {}", uid)))?;
        user.role = Some(role.as_str().to_string());
        Ok(())
    }
}

/// Model double that replays a fixed answer and records prompts.
#[derive(Clone)]
pub struct ScriptedModel {
    answer: Result<GenerateResponse, String>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl ScriptedModel {
    pub fn answering(response: GenerateResponse) -> Self {
        Self {
            answer: Ok(response),
            prompts: Arc::default(),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            answer: Err(message.to_string()),
            prompts: Arc::default(),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerativeModel for ScriptedModel {
    async fn generate_content(&self, prompt: &str) -> anyhow::Result<GenerateResponse> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.answer.clone().map_err(|e| anyhow::anyhow!(e))
    }
}

/// A full set of in-memory collaborators plus the service and state built
/// on top of them.
pub struct Harness {
    pub invoices: Arc<MemoryInvoiceRepository>,
    pub suppliers: Arc<MemorySupplierRepository>,
    pub blobs: Arc<MemoryBlobStore>,
    pub identity: Arc<StaticIdentityProvider>,
    pub service: Arc<InvoiceService>,
    pub state: AppState,
}

impl Harness {
    pub fn new(extractor: InvoiceExtractor) -> Self {
        let invoices = Arc::new(MemoryInvoiceRepository::default());
        let suppliers = Arc::new(MemorySupplierRepository::default());
        let blobs = Arc::new(MemoryBlobStore::default());
        let identity = Arc::new(StaticIdentityProvider::default());

        let service = Arc::new(InvoiceService::new(
            invoices.clone(),
            suppliers.clone(),
            identity.clone(),
            blobs.clone(),
            Arc::new(Utf8TextExtractor),
            extractor,
        ));

        let state = AppState {
            identity: identity.clone(),
            suppliers: suppliers.clone(),
            invoices: service.clone(),
        };

        Self {
            invoices,
            suppliers,
            blobs,
            identity,
            service,
            state,
        }
    }

    /// Verifies every known token once so all three callers are in the
    /// directory.
    pub async fn sign_in_all(&self) {
        for token in [ADMIN_TOKEN, SUPPLIER_TOKEN, OTHER_SUPPLIER_TOKEN] {
            self.identity.verify_token(token).await.unwrap();
        }
    }

    pub fn with_model(model: ScriptedModel) -> Self {
        Self::new(InvoiceExtractor::new(Some(Arc::new(model))))
    }
}
