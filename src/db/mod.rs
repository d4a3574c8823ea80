use crate::decimal;
use crate::errors::{AppError, AppResult};
use crate::models::{
    CreateMaterialPayload, CreateQuotePayload, MaterialRecord, MaterialType, ProductRecord,
    QuoteRecord, QuoteStatus, SaveProductPayload, TaskRecord, UpdateMaterialPayload,
    UpdateQuoteDetailsPayload, UpdateTaskPayload,
};
use crate::ownership::OwnershipStore;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use uuid::Uuid;

const SCHEMA_SQL: &str = include_str!("schema.sql");

const QUOTE_COLUMNS: &str = "id, owner_id, customer_id, display_id, title, status, \
     complexity_charge, markup_percentage, notes, created_at, updated_at";
const TASK_COLUMNS: &str = "id, quote_id, description, price, estimated_materials_cost, \
     material_type, position, created_at, updated_at";
const MATERIAL_COLUMNS: &str =
    "id, task_id, product_id, name, quantity, unit_price, notes, created_at, updated_at";
const PRODUCT_COLUMNS: &str = "id, name, description, unit_price, created_at, updated_at";

#[derive(Debug)]
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn new(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| AppError::Io(err.to_string()))?;
        }
        let conn = Connection::open(path).map_err(AppError::from)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(AppError::from)?;
        conn.execute_batch(SCHEMA_SQL).map_err(AppError::from)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> AppResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Internal("database mutex poisoned".to_string()))
    }

    // ─── Quotes ───────────────────────────────────────────────────────────

    pub fn create_quote(&self, owner_id: &str, payload: &CreateQuotePayload) -> AppResult<QuoteRecord> {
        let now = Utc::now();
        let id = Uuid::new_v4().to_string();

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let display_id: i64 = tx.query_row(
            "SELECT COALESCE(MAX(display_id), 0) + 1 FROM quotes WHERE owner_id = ?1",
            [owner_id],
            |row| row.get(0),
        )?;
        tx.execute(
            "INSERT INTO quotes (
               id, owner_id, customer_id, display_id, title, status,
               complexity_charge, markup_percentage, notes, created_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
            params![
                id,
                owner_id,
                payload.customer_id,
                display_id,
                payload.title,
                QuoteStatus::Draft.as_str(),
                "0",
                "0",
                payload.notes,
                now.to_rfc3339(),
            ],
        )?;
        tx.commit()?;
        drop(conn);

        self.require_quote(&id)
    }

    pub fn get_quote(&self, quote_id: &str) -> AppResult<Option<QuoteRecord>> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {} FROM quotes WHERE id = ?1", QUOTE_COLUMNS),
            [quote_id],
            parse_quote_row,
        )
        .optional()
        .map_err(AppError::from)
    }

    fn require_quote(&self, quote_id: &str) -> AppResult<QuoteRecord> {
        self.get_quote(quote_id)?
            .ok_or_else(|| AppError::NotFound(format!("Quote '{}' not found", quote_id)))
    }

    pub fn list_quotes(&self, owner_id: &str) -> AppResult<Vec<QuoteRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM quotes WHERE owner_id = ?1 ORDER BY display_id ASC",
            QUOTE_COLUMNS
        ))?;
        let rows = stmt
            .query_map([owner_id], parse_quote_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn update_quote_details(
        &self,
        quote_id: &str,
        payload: &UpdateQuoteDetailsPayload,
    ) -> AppResult<QuoteRecord> {
        let current = self.require_quote(quote_id)?;
        let title = payload.title.as_deref().unwrap_or(&current.title);
        let customer_id = payload.customer_id.as_deref().unwrap_or(&current.customer_id);
        let notes = payload.notes.as_deref().or(current.notes.as_deref());

        let conn = self.lock()?;
        conn.execute(
            "UPDATE quotes SET title = ?1, customer_id = ?2, notes = ?3, updated_at = ?4 WHERE id = ?5",
            params![title, customer_id, notes, Utc::now().to_rfc3339(), quote_id],
        )?;
        drop(conn);
        self.require_quote(quote_id)
    }

    pub fn update_quote_charges(
        &self,
        quote_id: &str,
        complexity_charge: Decimal,
        markup_percentage: Decimal,
    ) -> AppResult<QuoteRecord> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE quotes SET complexity_charge = ?1, markup_percentage = ?2, updated_at = ?3 WHERE id = ?4",
            params![
                decimal::to_storage(complexity_charge),
                decimal::to_storage(markup_percentage),
                Utc::now().to_rfc3339(),
                quote_id,
            ],
        )?;
        drop(conn);
        if changed == 0 {
            return Err(AppError::NotFound(format!("Quote '{}' not found", quote_id)));
        }
        self.require_quote(quote_id)
    }

    pub fn update_quote_status(&self, quote_id: &str, status: QuoteStatus) -> AppResult<QuoteRecord> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE quotes SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status.as_str(), Utc::now().to_rfc3339(), quote_id],
        )?;
        drop(conn);
        if changed == 0 {
            return Err(AppError::NotFound(format!("Quote '{}' not found", quote_id)));
        }
        self.require_quote(quote_id)
    }

    /// Cascades to the quote's tasks and their materials via foreign keys, so
    /// no orphaned aggregation inputs survive.
    pub fn delete_quote(&self, quote_id: &str) -> AppResult<bool> {
        let conn = self.lock()?;
        let changed = conn.execute("DELETE FROM quotes WHERE id = ?1", [quote_id])?;
        Ok(changed > 0)
    }

    // ─── Tasks ────────────────────────────────────────────────────────────

    pub fn insert_task(
        &self,
        quote_id: &str,
        description: &str,
        price: Decimal,
        estimated_materials_cost: Decimal,
        material_type: MaterialType,
        position: Option<i64>,
    ) -> AppResult<TaskRecord> {
        let now = Utc::now();
        let id = Uuid::new_v4().to_string();

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let position = match position {
            Some(position) => position,
            None => tx.query_row(
                "SELECT COALESCE(MAX(position), -1) + 1 FROM tasks WHERE quote_id = ?1",
                [quote_id],
                |row| row.get(0),
            )?,
        };
        tx.execute(
            "INSERT INTO tasks (
               id, quote_id, description, price, estimated_materials_cost,
               material_type, position, created_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
            params![
                id,
                quote_id,
                description,
                decimal::to_storage(price),
                decimal::to_storage(estimated_materials_cost),
                material_type.as_str(),
                position,
                now.to_rfc3339(),
            ],
        )?;
        tx.commit()?;
        drop(conn);

        self.require_task(&id)
    }

    pub fn get_task(&self, task_id: &str) -> AppResult<Option<TaskRecord>> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {} FROM tasks WHERE id = ?1", TASK_COLUMNS),
            [task_id],
            parse_task_row,
        )
        .optional()
        .map_err(AppError::from)
    }

    fn require_task(&self, task_id: &str) -> AppResult<TaskRecord> {
        self.get_task(task_id)?
            .ok_or_else(|| AppError::NotFound(format!("Task '{}' not found", task_id)))
    }

    pub fn list_tasks(&self, quote_id: &str) -> AppResult<Vec<TaskRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM tasks WHERE quote_id = ?1 ORDER BY position ASC, created_at ASC",
            TASK_COLUMNS
        ))?;
        let rows = stmt
            .query_map([quote_id], parse_task_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn update_task(&self, task_id: &str, payload: &UpdateTaskPayload) -> AppResult<TaskRecord> {
        let current = self.require_task(task_id)?;
        let description = payload.description.as_deref().unwrap_or(&current.description);
        let price = payload.price.unwrap_or(current.price);
        let estimated = payload
            .estimated_materials_cost
            .unwrap_or(current.estimated_materials_cost);
        let material_type = payload.material_type.unwrap_or(current.material_type);
        let position = payload.position.unwrap_or(current.position);

        let conn = self.lock()?;
        conn.execute(
            "UPDATE tasks SET description = ?1, price = ?2, estimated_materials_cost = ?3,
                    material_type = ?4, position = ?5, updated_at = ?6
             WHERE id = ?7",
            params![
                description,
                decimal::to_storage(price),
                decimal::to_storage(estimated),
                material_type.as_str(),
                position,
                Utc::now().to_rfc3339(),
                task_id,
            ],
        )?;
        drop(conn);
        self.require_task(task_id)
    }

    pub fn delete_task(&self, task_id: &str) -> AppResult<bool> {
        let conn = self.lock()?;
        let changed = conn.execute("DELETE FROM tasks WHERE id = ?1", [task_id])?;
        Ok(changed > 0)
    }

    // ─── Materials ────────────────────────────────────────────────────────

    pub fn insert_material(
        &self,
        payload: &CreateMaterialPayload,
        name: &str,
        unit_price: Decimal,
    ) -> AppResult<MaterialRecord> {
        let now = Utc::now();
        let id = Uuid::new_v4().to_string();

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO materials (
               id, task_id, product_id, name, quantity, unit_price, notes, created_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
            params![
                id,
                payload.task_id,
                payload.product_id,
                name,
                payload.quantity,
                decimal::to_storage(unit_price),
                payload.notes,
                now.to_rfc3339(),
            ],
        )?;
        drop(conn);

        self.require_material(&id)
    }

    pub fn get_material(&self, material_id: &str) -> AppResult<Option<MaterialRecord>> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {} FROM materials WHERE id = ?1", MATERIAL_COLUMNS),
            [material_id],
            parse_material_row,
        )
        .optional()
        .map_err(AppError::from)
    }

    fn require_material(&self, material_id: &str) -> AppResult<MaterialRecord> {
        self.get_material(material_id)?
            .ok_or_else(|| AppError::NotFound(format!("Material '{}' not found", material_id)))
    }

    pub fn list_materials(&self, task_id: &str) -> AppResult<Vec<MaterialRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM materials WHERE task_id = ?1 ORDER BY created_at ASC, id ASC",
            MATERIAL_COLUMNS
        ))?;
        let rows = stmt
            .query_map([task_id], parse_material_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn update_material(
        &self,
        material_id: &str,
        payload: &UpdateMaterialPayload,
    ) -> AppResult<MaterialRecord> {
        let current = self.require_material(material_id)?;
        let name = payload.name.as_deref().unwrap_or(&current.name);
        let quantity = payload.quantity.unwrap_or(current.quantity);
        let unit_price = payload.unit_price.unwrap_or(current.unit_price);
        let notes = payload.notes.as_deref().or(current.notes.as_deref());

        let conn = self.lock()?;
        conn.execute(
            "UPDATE materials SET name = ?1, quantity = ?2, unit_price = ?3, notes = ?4, updated_at = ?5
             WHERE id = ?6",
            params![
                name,
                quantity,
                decimal::to_storage(unit_price),
                notes,
                Utc::now().to_rfc3339(),
                material_id,
            ],
        )?;
        drop(conn);
        self.require_material(material_id)
    }

    pub fn delete_material(&self, material_id: &str) -> AppResult<bool> {
        let conn = self.lock()?;
        let changed = conn.execute("DELETE FROM materials WHERE id = ?1", [material_id])?;
        Ok(changed > 0)
    }

    // ─── Products ─────────────────────────────────────────────────────────

    pub fn create_product(&self, payload: &SaveProductPayload) -> AppResult<ProductRecord> {
        let now = Utc::now();
        let id = Uuid::new_v4().to_string();

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO products (id, name, description, unit_price, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![
                id,
                payload.name,
                payload.description,
                decimal::to_storage(payload.unit_price),
                now.to_rfc3339(),
            ],
        )?;
        drop(conn);

        self.require_product(&id)
    }

    pub fn update_product(&self, product_id: &str, payload: &SaveProductPayload) -> AppResult<ProductRecord> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE products SET name = ?1, description = ?2, unit_price = ?3, updated_at = ?4
             WHERE id = ?5",
            params![
                payload.name,
                payload.description,
                decimal::to_storage(payload.unit_price),
                Utc::now().to_rfc3339(),
                product_id,
            ],
        )?;
        drop(conn);
        if changed == 0 {
            return Err(AppError::NotFound(format!("Product '{}' not found", product_id)));
        }
        self.require_product(product_id)
    }

    pub fn get_product(&self, product_id: &str) -> AppResult<Option<ProductRecord>> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {} FROM products WHERE id = ?1", PRODUCT_COLUMNS),
            [product_id],
            parse_product_row,
        )
        .optional()
        .map_err(AppError::from)
    }

    fn require_product(&self, product_id: &str) -> AppResult<ProductRecord> {
        self.get_product(product_id)?
            .ok_or_else(|| AppError::NotFound(format!("Product '{}' not found", product_id)))
    }

    pub fn delete_product(&self, product_id: &str) -> AppResult<bool> {
        let conn = self.lock()?;
        let changed = conn.execute("DELETE FROM products WHERE id = ?1", [product_id])?;
        Ok(changed > 0)
    }

    pub fn list_products(&self) -> AppResult<Vec<ProductRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM products ORDER BY name ASC",
            PRODUCT_COLUMNS
        ))?;
        let rows = stmt
            .query_map([], parse_product_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

// Each hop of the ownership chain is a fresh point read; nothing here caches
// parent references across calls.
impl OwnershipStore for Database {
    fn quote_owner(&self, quote_id: &str) -> AppResult<Option<String>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT owner_id FROM quotes WHERE id = ?1",
            [quote_id],
            |row| row.get(0),
        )
        .optional()
        .map_err(AppError::from)
    }

    fn task_parent(&self, task_id: &str) -> AppResult<Option<String>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT quote_id FROM tasks WHERE id = ?1",
            [task_id],
            |row| row.get(0),
        )
        .optional()
        .map_err(AppError::from)
    }

    fn material_parent(&self, material_id: &str) -> AppResult<Option<String>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT task_id FROM materials WHERE id = ?1",
            [material_id],
            |row| row.get(0),
        )
        .optional()
        .map_err(AppError::from)
    }
}

fn parse_quote_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<QuoteRecord> {
    Ok(QuoteRecord {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        customer_id: row.get(2)?,
        display_id: row.get(3)?,
        title: row.get(4)?,
        status: parse_status(&row.get::<_, String>(5)?)?,
        complexity_charge: parse_money(&row.get::<_, String>(6)?)?,
        markup_percentage: parse_money(&row.get::<_, String>(7)?)?,
        notes: row.get(8)?,
        created_at: parse_time(&row.get::<_, String>(9)?)?,
        updated_at: parse_time(&row.get::<_, String>(10)?)?,
    })
}

fn parse_task_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TaskRecord> {
    Ok(TaskRecord {
        id: row.get(0)?,
        quote_id: row.get(1)?,
        description: row.get(2)?,
        price: parse_money(&row.get::<_, String>(3)?)?,
        estimated_materials_cost: parse_money(&row.get::<_, String>(4)?)?,
        material_type: parse_material_type(&row.get::<_, String>(5)?)?,
        position: row.get(6)?,
        created_at: parse_time(&row.get::<_, String>(7)?)?,
        updated_at: parse_time(&row.get::<_, String>(8)?)?,
    })
}

fn parse_material_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MaterialRecord> {
    Ok(MaterialRecord {
        id: row.get(0)?,
        task_id: row.get(1)?,
        product_id: row.get(2)?,
        name: row.get(3)?,
        quantity: row.get(4)?,
        unit_price: parse_money(&row.get::<_, String>(5)?)?,
        notes: row.get(6)?,
        created_at: parse_time(&row.get::<_, String>(7)?)?,
        updated_at: parse_time(&row.get::<_, String>(8)?)?,
    })
}

fn parse_product_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ProductRecord> {
    Ok(ProductRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        unit_price: parse_money(&row.get::<_, String>(3)?)?,
        created_at: parse_time(&row.get::<_, String>(4)?)?,
        updated_at: parse_time(&row.get::<_, String>(5)?)?,
    })
}

/// A corrupt stored decimal is a data-integrity fault: logged here, tunneled
/// out of the row closure, and surfaced as `MalformedDecimal` — never coerced
/// to zero.
fn parse_money(raw: &str) -> rusqlite::Result<Decimal> {
    decimal::from_storage(raw).map_err(|error| {
        tracing::error!(raw, %error, "stored decimal failed to parse");
        rusqlite::Error::UserFunctionError(Box::new(error))
    })
}

fn parse_status(raw: &str) -> rusqlite::Result<QuoteStatus> {
    match raw {
        "draft" => Ok(QuoteStatus::Draft),
        "sent" => Ok(QuoteStatus::Sent),
        "accepted" => Ok(QuoteStatus::Accepted),
        "rejected" => Ok(QuoteStatus::Rejected),
        other => Err(rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("Unknown quote status '{}'", other),
            )),
        )),
    }
}

fn parse_material_type(raw: &str) -> rusqlite::Result<MaterialType> {
    match raw {
        "lump-sum" => Ok(MaterialType::LumpSum),
        "itemized" => Ok(MaterialType::Itemized),
        other => Err(rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("Unknown material type '{}'", other),
            )),
        )),
    }
}

fn parse_time(raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|error| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, error.to_string())),
            )
        })
}
