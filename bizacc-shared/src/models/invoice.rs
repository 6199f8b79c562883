/// Invoices and quotations
///
/// Both are sales documents with GST-taxed line items and a per-owner
/// sequential number (`INV-0001`, `QUO-0001`). They live in the `invoices`
/// and `quotations` collections respectively.
///
/// Writes go through the collection as generic [`Document`]s so that
/// legacy records the typed model cannot read are carried along untouched.
///
/// # Example
///
/// ```no_run
/// use bizacc_shared::models::invoice::{DocumentKind, LineItem, NewSalesDocument, SalesDocument};
/// use bizacc_shared::gst::GstRate;
/// use bizacc_shared::store::RecordStore;
/// use uuid::Uuid;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = RecordStore::memory();
/// let owner = Uuid::new_v4();
///
/// let invoice = SalesDocument::create(&store, DocumentKind::Invoice, owner, "27", NewSalesDocument {
///     customer_name: "Sharma Traders".to_string(),
///     customer_gstin: None,
///     place_of_supply: Some("29".to_string()),
///     items: vec![LineItem {
///         description: "Consulting".to_string(),
///         hsn_code: Some("998311".to_string()),
///         quantity: 2,
///         unit_price_paise: 50_000,
///         discount_paise: 0,
///         gst_rate: GstRate::new(18)?,
///     }],
///     due_date: None,
///     notes: None,
/// }).await?;
///
/// assert_eq!(invoice.number, "INV-0001");
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use super::record::{lenient_id, lenient_owner, new_record_id, Document, OwnedRecord};
use crate::gst::{self, GstError, GstRate, NumberSeries, SupplyType, TaxBreakdown};
use crate::quota::{QuotaError, QuotaGuard, QuotaType};
use crate::store::{EntityType, RecordStore, StoreError};

/// Which kind of sales document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Invoice,
    Quotation,
}

impl DocumentKind {
    pub fn entity(&self) -> EntityType {
        match self {
            DocumentKind::Invoice => EntityType::Invoices,
            DocumentKind::Quotation => EntityType::Quotations,
        }
    }

    pub fn series(&self) -> NumberSeries {
        match self {
            DocumentKind::Invoice => NumberSeries::Invoice,
            DocumentKind::Quotation => NumberSeries::Quotation,
        }
    }
}

/// Document status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    #[default]
    Draft,
    Sent,
    Paid,
    Accepted,
    Declined,
    Cancelled,
}

/// One taxed line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub description: String,

    #[serde(default)]
    pub hsn_code: Option<String>,

    pub quantity: u32,

    pub unit_price_paise: i64,

    #[serde(default)]
    pub discount_paise: i64,

    #[serde(default)]
    pub gst_rate: GstRate,
}

impl LineItem {
    /// Quantity times unit price, less discount
    pub fn taxable_paise(&self) -> i64 {
        i64::from(self.quantity) * self.unit_price_paise - self.discount_paise
    }

    pub fn tax(&self, supply: SupplyType) -> TaxBreakdown {
        gst::compute_line(self.taxable_paise(), self.gst_rate, supply)
    }
}

/// Input for a new invoice or quotation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSalesDocument {
    pub customer_name: String,

    #[serde(default)]
    pub customer_gstin: Option<String>,

    /// State code of the place of supply
    #[serde(default)]
    pub place_of_supply: Option<String>,

    pub items: Vec<LineItem>,

    #[serde(default)]
    pub due_date: Option<NaiveDate>,

    #[serde(default)]
    pub notes: Option<String>,
}

/// An invoice or quotation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesDocument {
    #[serde(default = "new_record_id", deserialize_with = "lenient_id")]
    pub id: String,

    #[serde(default, deserialize_with = "lenient_owner")]
    pub user_id: Option<String>,

    pub kind: DocumentKind,

    pub number: String,

    #[serde(default)]
    pub status: DocumentStatus,

    pub customer_name: String,

    #[serde(default)]
    pub customer_gstin: Option<String>,

    /// Supplier's state code
    pub supplier_state: String,

    #[serde(default)]
    pub place_of_supply: Option<String>,

    pub supply_type: SupplyType,

    pub items: Vec<LineItem>,

    pub totals: TaxBreakdown,

    pub issue_date: NaiveDate,

    #[serde(default)]
    pub due_date: Option<NaiveDate>,

    #[serde(default)]
    pub notes: Option<String>,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum SalesDocumentError {
    #[error("A document needs at least one line item")]
    NoItems,

    #[error("Line item {0} has a negative taxable amount")]
    NegativeLine(usize),

    #[error(transparent)]
    Gst(#[from] GstError),

    #[error(transparent)]
    Quota(#[from] QuotaError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<serde_json::Error> for SalesDocumentError {
    fn from(e: serde_json::Error) -> Self {
        SalesDocumentError::Store(StoreError::Serialization(e))
    }
}

impl SalesDocument {
    /// Validates input and computes totals; does not touch the store
    pub fn build(
        kind: DocumentKind,
        owner: Uuid,
        number: String,
        supplier_state: &str,
        input: NewSalesDocument,
    ) -> Result<Self, SalesDocumentError> {
        if input.items.is_empty() {
            return Err(SalesDocumentError::NoItems);
        }
        if let Some(index) = input.items.iter().position(|i| i.taxable_paise() < 0) {
            return Err(SalesDocumentError::NegativeLine(index));
        }

        let customer_gstin = input
            .customer_gstin
            .map(|g| g.trim().to_uppercase())
            .filter(|g| !g.is_empty());
        if let Some(gstin) = &customer_gstin {
            gst::validate_gstin(gstin)?;
        }

        // A registered customer's GSTIN determines the place of supply
        let place_of_supply = input.place_of_supply.or_else(|| {
            customer_gstin
                .as_deref()
                .and_then(gst::state_code)
                .map(str::to_string)
        });
        let supply_type = SupplyType::between(supplier_state, place_of_supply.as_deref());
        let totals: TaxBreakdown = input.items.iter().map(|i| i.tax(supply_type)).sum();
        let now = Utc::now();

        Ok(Self {
            id: new_record_id(),
            user_id: Some(owner.to_string()),
            kind,
            number,
            status: DocumentStatus::Draft,
            customer_name: input.customer_name,
            customer_gstin,
            supplier_state: supplier_state.to_string(),
            place_of_supply,
            supply_type,
            items: input.items,
            totals,
            issue_date: now.date_naive(),
            due_date: input.due_date,
            notes: input.notes,
            created_at: now,
            updated_at: now,
        })
    }

    /// Builds, numbers, and stores a new document for `owner`
    pub async fn create(
        store: &RecordStore,
        kind: DocumentKind,
        owner: Uuid,
        supplier_state: &str,
        input: NewSalesDocument,
    ) -> Result<SalesDocument, SalesDocumentError> {
        let unlimited = QuotaGuard::unlimited(QuotaType::Invoices);
        Self::create_within(store, kind, owner, supplier_state, input, &unlimited).await
    }

    /// Like [`SalesDocument::create`], refusing with
    /// [`SalesDocumentError::Quota`] when `guard` is used up at write time
    pub async fn create_within(
        store: &RecordStore,
        kind: DocumentKind,
        owner: Uuid,
        supplier_state: &str,
        input: NewSalesDocument,
        guard: &QuotaGuard,
    ) -> Result<SalesDocument, SalesDocumentError> {
        // Validate once up front; the number is filled in under the write
        let draft = Self::build(kind, owner, String::new(), supplier_state, input)?;
        let owner_ref = owner.to_string();

        let document = store
            .modify(kind.entity(), |records: &mut Vec<Document>| {
                guard.admit(records.as_slice())?;

                let issued = records
                    .iter()
                    .filter(|r| r.user_id.as_deref() == Some(owner_ref.as_str()))
                    .filter_map(|r| r.fields.get("number").and_then(Value::as_str));

                let mut document = draft.clone();
                document.number = kind.series().next(issued);

                records.push(serde_json::from_value(serde_json::to_value(&document)?)?);
                Ok::<_, SalesDocumentError>(document)
            })
            .await?;

        info!(
            document_id = %document.id,
            number = %document.number,
            total_paise = document.totals.total_paise(),
            "Sales document created"
        );
        Ok(document)
    }

    /// All readable documents of a kind
    ///
    /// Records that do not parse as sales documents are skipped.
    pub async fn list(store: &RecordStore, kind: DocumentKind) -> Vec<SalesDocument> {
        let records: Vec<Value> = store.load(kind.entity()).await;
        records
            .into_iter()
            .filter_map(|value| match serde_json::from_value(value) {
                Ok(document) => Some(document),
                Err(e) => {
                    warn!(kind = ?kind, error = %e, "Skipping unreadable sales document");
                    None
                }
            })
            .collect()
    }
}

impl OwnedRecord for SalesDocument {
    fn record_id(&self) -> String {
        self.id.clone()
    }

    fn owner_ref(&self) -> Option<String> {
        self.user_id.clone()
    }

    fn set_owner(&mut self, owner: Uuid) {
        self.user_id = Some(owner.to_string());
    }
}
