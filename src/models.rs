use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuoteStatus {
    Draft,
    Sent,
    Accepted,
    Rejected,
}

impl QuoteStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Sent => "sent",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MaterialType {
    LumpSum,
    Itemized,
}

impl MaterialType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LumpSum => "lump-sum",
            Self::Itemized => "itemized",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRecord {
    pub id: String,
    pub owner_id: String,
    pub customer_id: String,
    pub display_id: i64,
    pub title: String,
    pub status: QuoteStatus,
    pub complexity_charge: Decimal,
    pub markup_percentage: Decimal,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub id: String,
    pub quote_id: String,
    pub description: String,
    pub price: Decimal,
    pub estimated_materials_cost: Decimal,
    pub material_type: MaterialType,
    pub position: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialRecord {
    pub id: String,
    pub task_id: String,
    pub product_id: Option<String>,
    pub name: String,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MaterialRecord {
    pub fn line_total(&self) -> Decimal {
        Decimal::from(self.quantity) * self.unit_price
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRecord {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub unit_price: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The five aggregation figures, always produced together from one snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub task_subtotal: Decimal,
    pub materials_subtotal: Decimal,
    pub combined_subtotal: Decimal,
    pub markup_charge: Decimal,
    pub grand_total: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDetail {
    pub task: TaskRecord,
    pub materials: Vec<MaterialRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteDetail {
    pub quote: QuoteRecord,
    pub tasks: Vec<TaskDetail>,
    pub totals: Totals,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateQuotePayload {
    pub title: String,
    pub customer_id: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateQuoteDetailsPayload {
    pub title: Option<String>,
    pub customer_id: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteChargesPayload {
    pub complexity_charge: Decimal,
    pub markup_percentage: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskPayload {
    pub quote_id: String,
    pub description: String,
    pub price: Decimal,
    pub material_type: MaterialType,
    #[serde(default)]
    pub estimated_materials_cost: Option<Decimal>,
    #[serde(default)]
    pub position: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskPayload {
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub material_type: Option<MaterialType>,
    pub estimated_materials_cost: Option<Decimal>,
    pub position: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMaterialPayload {
    pub task_id: String,
    #[serde(default)]
    pub product_id: Option<String>,
    /// Defaults to the referenced product's name when omitted.
    #[serde(default)]
    pub name: Option<String>,
    pub quantity: i64,
    /// Defaults to the referenced product's unit price when omitted.
    #[serde(default)]
    pub unit_price: Option<Decimal>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMaterialPayload {
    pub name: Option<String>,
    pub quantity: Option<i64>,
    pub unit_price: Option<Decimal>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveProductPayload {
    pub name: String,
    pub description: Option<String>,
    pub unit_price: Decimal,
}

/// Every mutation response carries the owning quote id so callers can refresh
/// aggregation without an extra round trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteMutation {
    pub quote: QuoteRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskMutation {
    pub task: TaskRecord,
    pub quote_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialMutation {
    pub material: MaterialRecord,
    pub quote_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResponse {
    pub deleted: bool,
    pub quote_id: String,
}
