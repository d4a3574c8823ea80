//! The procedure surface. One method per operation; each takes the acting
//! user's id (verified upstream — this layer does ownership checks only) and
//! runs the same pipeline: validate → authorize → normalize → persist.
//!
//! Responses carry the owning quote id so callers can refresh aggregation
//! without an extra round trip. Totals are never cached; `get_quote_with_totals`
//! recomputes them from persisted state on every call.

use crate::db::Database;
use crate::errors::{AppError, AppResult};
use crate::models::{
    CreateMaterialPayload, CreateQuotePayload, CreateTaskPayload, DeleteResponse,
    MaterialMutation, ProductRecord, QuoteChargesPayload, QuoteDetail, QuoteMutation, QuoteRecord,
    QuoteStatus, SaveProductPayload, TaskDetail, TaskMutation, UpdateMaterialPayload,
    UpdateQuoteDetailsPayload, UpdateTaskPayload,
};
use crate::ownership::{authorize, Access, OwnedEntity};
use crate::policy;
use crate::totals::{compute_totals, QuoteCharges, TaskPricing};
use crate::workflow;
use rust_decimal::Decimal;
use std::sync::Arc;

#[derive(Clone)]
pub struct QuoteService {
    db: Arc<Database>,
}

impl QuoteService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Resolves the ownership chain to a quote id or the matching typed error.
    /// Runs to completion before any caller issues a write.
    fn require_owned(&self, acting_user_id: &str, entity: &OwnedEntity) -> AppResult<String> {
        match authorize(self.db.as_ref(), acting_user_id, entity)? {
            Access::Authorized { quote_id } => Ok(quote_id),
            Access::Forbidden => Err(AppError::Forbidden(format!(
                "User '{}' does not own the {} '{}'",
                acting_user_id,
                entity.kind(),
                entity.id()
            ))),
            Access::NotFound => Err(AppError::NotFound(format!(
                "{} '{}' not found",
                entity.kind(),
                entity.id()
            ))),
        }
    }

    // ─── Quotes ───────────────────────────────────────────────────────────

    pub fn create_quote(
        &self,
        acting_user_id: &str,
        payload: CreateQuotePayload,
    ) -> AppResult<QuoteMutation> {
        policy::validate_create_quote(&payload)?;
        let quote = self.db.create_quote(acting_user_id, &payload)?;
        tracing::info!(quote_id = %quote.id, user_id = acting_user_id, "quote created");
        Ok(QuoteMutation { quote })
    }

    pub fn list_quotes(&self, acting_user_id: &str) -> AppResult<Vec<QuoteRecord>> {
        self.db.list_quotes(acting_user_id)
    }

    pub fn update_quote_details(
        &self,
        acting_user_id: &str,
        quote_id: &str,
        payload: UpdateQuoteDetailsPayload,
    ) -> AppResult<QuoteMutation> {
        policy::validate_update_quote_details(&payload)?;
        self.require_owned(acting_user_id, &OwnedEntity::Quote(quote_id.to_string()))?;
        let quote = self.db.update_quote_details(quote_id, &payload)?;
        Ok(QuoteMutation { quote })
    }

    pub fn update_quote_charges(
        &self,
        acting_user_id: &str,
        quote_id: &str,
        payload: QuoteChargesPayload,
    ) -> AppResult<QuoteMutation> {
        policy::validate_quote_charges(&payload)?;
        self.require_owned(acting_user_id, &OwnedEntity::Quote(quote_id.to_string()))?;
        let quote = self.db.update_quote_charges(
            quote_id,
            payload.complexity_charge,
            payload.markup_percentage,
        )?;
        tracing::debug!(quote_id, user_id = acting_user_id, "quote charges updated");
        Ok(QuoteMutation { quote })
    }

    /// Status writes are authorized exactly like task mutations. Any target
    /// status is accepted (the manual-correction path); non-forward writes
    /// are logged rather than rejected.
    pub fn update_quote_status(
        &self,
        acting_user_id: &str,
        quote_id: &str,
        status: QuoteStatus,
    ) -> AppResult<QuoteMutation> {
        self.require_owned(acting_user_id, &OwnedEntity::Quote(quote_id.to_string()))?;
        let current = self
            .db
            .get_quote(quote_id)?
            .ok_or_else(|| AppError::NotFound(format!("Quote '{}' not found", quote_id)))?;
        if !workflow::is_forward_transition(current.status, status) {
            tracing::warn!(
                quote_id,
                from = current.status.as_str(),
                to = status.as_str(),
                "non-forward status write"
            );
        }
        let quote = self.db.update_quote_status(quote_id, status)?;
        Ok(QuoteMutation { quote })
    }

    pub fn delete_quote(&self, acting_user_id: &str, quote_id: &str) -> AppResult<DeleteResponse> {
        self.require_owned(acting_user_id, &OwnedEntity::Quote(quote_id.to_string()))?;
        let deleted = self.db.delete_quote(quote_id)?;
        tracing::info!(quote_id, user_id = acting_user_id, "quote deleted");
        Ok(DeleteResponse {
            deleted,
            quote_id: quote_id.to_string(),
        })
    }

    /// Read projection: the quote, its ordered tasks and their materials, and
    /// the totals computed from that same snapshot — callers never recompute.
    pub fn get_quote_with_totals(&self, acting_user_id: &str, quote_id: &str) -> AppResult<QuoteDetail> {
        self.require_owned(acting_user_id, &OwnedEntity::Quote(quote_id.to_string()))?;
        let quote = self
            .db
            .get_quote(quote_id)?
            .ok_or_else(|| AppError::NotFound(format!("Quote '{}' not found", quote_id)))?;

        let mut tasks = Vec::new();
        let mut pricing = Vec::new();
        for task in self.db.list_tasks(quote_id)? {
            let materials = self.db.list_materials(&task.id)?;
            pricing.push(TaskPricing::from_records(&task, &materials));
            tasks.push(TaskDetail { task, materials });
        }

        let totals = compute_totals(
            QuoteCharges {
                complexity_charge: quote.complexity_charge,
                markup_percentage: quote.markup_percentage,
            },
            &pricing,
        );

        Ok(QuoteDetail {
            quote,
            tasks,
            totals,
        })
    }

    // ─── Tasks ────────────────────────────────────────────────────────────

    pub fn create_task(
        &self,
        acting_user_id: &str,
        payload: CreateTaskPayload,
    ) -> AppResult<TaskMutation> {
        policy::validate_create_task(&payload)?;
        let quote_id =
            self.require_owned(acting_user_id, &OwnedEntity::Quote(payload.quote_id.clone()))?;
        let task = self.db.insert_task(
            &payload.quote_id,
            payload.description.trim(),
            payload.price,
            payload.estimated_materials_cost.unwrap_or(Decimal::ZERO),
            payload.material_type,
            payload.position,
        )?;
        tracing::info!(task_id = %task.id, quote_id = %quote_id, "task created");
        Ok(TaskMutation { task, quote_id })
    }

    pub fn update_task(
        &self,
        acting_user_id: &str,
        task_id: &str,
        payload: UpdateTaskPayload,
    ) -> AppResult<TaskMutation> {
        policy::validate_update_task(&payload)?;
        let quote_id = self.require_owned(acting_user_id, &OwnedEntity::Task(task_id.to_string()))?;
        let task = self.db.update_task(task_id, &payload)?;
        Ok(TaskMutation { task, quote_id })
    }

    pub fn delete_task(&self, acting_user_id: &str, task_id: &str) -> AppResult<DeleteResponse> {
        let quote_id = self.require_owned(acting_user_id, &OwnedEntity::Task(task_id.to_string()))?;
        let deleted = self.db.delete_task(task_id)?;
        Ok(DeleteResponse { deleted, quote_id })
    }

    // ─── Materials ────────────────────────────────────────────────────────

    /// Authorizes through the target task's chain. A catalog product, when
    /// referenced, supplies the default name and unit price. Materials may be
    /// attached to a lump-sum task; the aggregation engine ignores them.
    pub fn create_material(
        &self,
        acting_user_id: &str,
        payload: CreateMaterialPayload,
    ) -> AppResult<MaterialMutation> {
        policy::validate_create_material(&payload)?;
        let quote_id =
            self.require_owned(acting_user_id, &OwnedEntity::Task(payload.task_id.clone()))?;

        let product = match payload.product_id.as_deref() {
            Some(product_id) => Some(self.db.get_product(product_id)?.ok_or_else(|| {
                AppError::NotFound(format!("Product '{}' not found", product_id))
            })?),
            None => None,
        };
        let name = payload
            .name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(ToString::to_string)
            .or_else(|| product.as_ref().map(|product| product.name.clone()))
            .ok_or_else(|| AppError::validation("Material payload rejected", &["name"]))?;
        let unit_price = payload
            .unit_price
            .or_else(|| product.as_ref().map(|product| product.unit_price))
            .unwrap_or(Decimal::ZERO);

        if let Some(task) = self.db.get_task(&payload.task_id)? {
            if task.material_type == crate::models::MaterialType::LumpSum {
                tracing::warn!(
                    task_id = %task.id,
                    "material attached to a lump-sum task; it will not contribute to totals"
                );
            }
        }

        let material = self.db.insert_material(&payload, &name, unit_price)?;
        tracing::info!(material_id = %material.id, quote_id = %quote_id, "material created");
        Ok(MaterialMutation { material, quote_id })
    }

    pub fn update_material(
        &self,
        acting_user_id: &str,
        material_id: &str,
        payload: UpdateMaterialPayload,
    ) -> AppResult<MaterialMutation> {
        policy::validate_update_material(&payload)?;
        let quote_id =
            self.require_owned(acting_user_id, &OwnedEntity::Material(material_id.to_string()))?;
        let material = self.db.update_material(material_id, &payload)?;
        Ok(MaterialMutation { material, quote_id })
    }

    pub fn delete_material(
        &self,
        acting_user_id: &str,
        material_id: &str,
    ) -> AppResult<DeleteResponse> {
        let quote_id =
            self.require_owned(acting_user_id, &OwnedEntity::Material(material_id.to_string()))?;
        let deleted = self.db.delete_material(material_id)?;
        Ok(DeleteResponse { deleted, quote_id })
    }

    // ─── Products ─────────────────────────────────────────────────────────
    // Catalog entries are tenant-global: validated, but no ownership chain to
    // walk.

    pub fn create_product(&self, payload: SaveProductPayload) -> AppResult<ProductRecord> {
        policy::validate_save_product(&payload)?;
        self.db.create_product(&payload)
    }

    pub fn update_product(
        &self,
        product_id: &str,
        payload: SaveProductPayload,
    ) -> AppResult<ProductRecord> {
        policy::validate_save_product(&payload)?;
        self.db.update_product(product_id, &payload)
    }

    pub fn delete_product(&self, product_id: &str) -> AppResult<bool> {
        // Existing materials keep their copied name and price; the FK is set
        // null by the schema.
        self.db.delete_product(product_id)
    }

    pub fn get_product(&self, product_id: &str) -> AppResult<Option<ProductRecord>> {
        self.db.get_product(product_id)
    }

    pub fn list_products(&self) -> AppResult<Vec<ProductRecord>> {
        self.db.list_products()
    }
}
