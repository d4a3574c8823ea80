//! Input validation. Every mutation validates shape and numeric ranges here,
//! before authorization or storage is touched, and reports the full list of
//! offending fields in one error.

use crate::errors::{AppError, AppResult};
use crate::models::{
    CreateMaterialPayload, CreateQuotePayload, CreateTaskPayload, QuoteChargesPayload,
    SaveProductPayload, UpdateMaterialPayload, UpdateQuoteDetailsPayload, UpdateTaskPayload,
};
use rust_decimal::Decimal;

pub const MAX_MARKUP_PERCENTAGE: u32 = 100;
pub const MIN_MATERIAL_QUANTITY: i64 = 1;

fn max_markup() -> Decimal {
    Decimal::from(MAX_MARKUP_PERCENTAGE)
}

fn reject(message: &str, fields: Vec<&str>) -> AppResult<()> {
    if fields.is_empty() {
        Ok(())
    } else {
        Err(AppError::validation(message, &fields))
    }
}

pub fn validate_create_quote(payload: &CreateQuotePayload) -> AppResult<()> {
    let mut fields = Vec::new();
    if payload.title.trim().is_empty() {
        fields.push("title");
    }
    if payload.customer_id.trim().is_empty() {
        fields.push("customerId");
    }
    reject("Quote payload rejected", fields)
}

pub fn validate_update_quote_details(payload: &UpdateQuoteDetailsPayload) -> AppResult<()> {
    let mut fields = Vec::new();
    if matches!(&payload.title, Some(title) if title.trim().is_empty()) {
        fields.push("title");
    }
    if matches!(&payload.customer_id, Some(customer) if customer.trim().is_empty()) {
        fields.push("customerId");
    }
    reject("Quote update rejected", fields)
}

pub fn validate_quote_charges(payload: &QuoteChargesPayload) -> AppResult<()> {
    let mut fields = Vec::new();
    if payload.complexity_charge < Decimal::ZERO {
        fields.push("complexityCharge");
    }
    if payload.markup_percentage < Decimal::ZERO || payload.markup_percentage > max_markup() {
        fields.push("markupPercentage");
    }
    reject("Quote charges rejected", fields)
}

pub fn validate_create_task(payload: &CreateTaskPayload) -> AppResult<()> {
    let mut fields = Vec::new();
    if payload.description.trim().is_empty() {
        fields.push("description");
    }
    if payload.price < Decimal::ZERO {
        fields.push("price");
    }
    if matches!(payload.estimated_materials_cost, Some(cost) if cost < Decimal::ZERO) {
        fields.push("estimatedMaterialsCost");
    }
    if matches!(payload.position, Some(position) if position < 0) {
        fields.push("position");
    }
    reject("Task payload rejected", fields)
}

pub fn validate_update_task(payload: &UpdateTaskPayload) -> AppResult<()> {
    let mut fields = Vec::new();
    if matches!(&payload.description, Some(description) if description.trim().is_empty()) {
        fields.push("description");
    }
    if matches!(payload.price, Some(price) if price < Decimal::ZERO) {
        fields.push("price");
    }
    if matches!(payload.estimated_materials_cost, Some(cost) if cost < Decimal::ZERO) {
        fields.push("estimatedMaterialsCost");
    }
    if matches!(payload.position, Some(position) if position < 0) {
        fields.push("position");
    }
    reject("Task update rejected", fields)
}

pub fn validate_create_material(payload: &CreateMaterialPayload) -> AppResult<()> {
    let mut fields = Vec::new();
    if payload.quantity < MIN_MATERIAL_QUANTITY {
        fields.push("quantity");
    }
    if matches!(payload.unit_price, Some(price) if price < Decimal::ZERO) {
        fields.push("unitPrice");
    }
    // Ad hoc materials need an explicit name; catalog-backed ones inherit it.
    match (&payload.name, &payload.product_id) {
        (Some(name), _) if name.trim().is_empty() => fields.push("name"),
        (None, None) => fields.push("name"),
        _ => {}
    }
    reject("Material payload rejected", fields)
}

pub fn validate_update_material(payload: &UpdateMaterialPayload) -> AppResult<()> {
    let mut fields = Vec::new();
    if matches!(&payload.name, Some(name) if name.trim().is_empty()) {
        fields.push("name");
    }
    if matches!(payload.quantity, Some(quantity) if quantity < MIN_MATERIAL_QUANTITY) {
        fields.push("quantity");
    }
    if matches!(payload.unit_price, Some(price) if price < Decimal::ZERO) {
        fields.push("unitPrice");
    }
    reject("Material update rejected", fields)
}

pub fn validate_save_product(payload: &SaveProductPayload) -> AppResult<()> {
    let mut fields = Vec::new();
    if payload.name.trim().is_empty() {
        fields.push("name");
    }
    if payload.unit_price < Decimal::ZERO {
        fields.push("unitPrice");
    }
    reject("Product payload rejected", fields)
}
