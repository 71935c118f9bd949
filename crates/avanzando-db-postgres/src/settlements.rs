//! Cost settlement storage.
//!
//! Expense and hour inserts lock the parent settlement, refuse anything
//! but drafts and rewrite the stored totals before committing.

use avanzando_core::settlement::{
    self, Expense, HoursEntry, NewExpense, NewHoursEntry, NewSettlement, Settlement, StatusChange,
};
use sqlx_core::query::query;
use sqlx_core::row::Row;
use sqlx_postgres::{PgConnection, PgRow};
use tracing::debug;

use crate::rows::text_enum;
use crate::{PgPool, StorageError, StorageResult, reference_error};

const SETTLEMENT_COLUMNS: &str = "id, proyecto_id, periodo_inicio, periodo_fin, estado, \
    total_gastos, total_horas, observaciones, creado_por, aprobado_por, fecha_creacion, \
    fecha_aprobacion";

const EXPENSE_COLUMNS: &str = "id, liquidacion_id, tipo_gasto, descripcion, cantidad, \
    precio_unitario, total, fecha_gasto, comprobante_url";

const HOURS_COLUMNS: &str = "id, liquidacion_id, recurso_id, fecha, horas_trabajadas, \
    tarifa_hora, total, descripcion_actividad";

const NOT_FOUND: &str = "Liquidación no encontrada";

fn row_to_settlement(row: &PgRow) -> StorageResult<Settlement> {
    Ok(Settlement {
        id: row.try_get("id")?,
        proyecto_id: row.try_get("proyecto_id")?,
        period_start: row.try_get("periodo_inicio")?,
        period_end: row.try_get("periodo_fin")?,
        status: text_enum(row, "estado")?,
        total_expenses: row.try_get("total_gastos")?,
        total_hours: row.try_get("total_horas")?,
        notes: row.try_get("observaciones")?,
        creado_por: row.try_get("creado_por")?,
        aprobado_por: row.try_get("aprobado_por")?,
        created_at: row.try_get("fecha_creacion")?,
        approved_at: row.try_get("fecha_aprobacion")?,
    })
}

fn row_to_expense(row: &PgRow) -> StorageResult<Expense> {
    Ok(Expense {
        id: row.try_get("id")?,
        liquidacion_id: row.try_get("liquidacion_id")?,
        tipo_gasto: text_enum(row, "tipo_gasto")?,
        description: row.try_get("descripcion")?,
        quantity: row.try_get("cantidad")?,
        unit_price: row.try_get("precio_unitario")?,
        total: row.try_get("total")?,
        fecha_gasto: row.try_get("fecha_gasto")?,
        comprobante_url: row.try_get("comprobante_url")?,
    })
}

fn row_to_hours(row: &PgRow) -> StorageResult<HoursEntry> {
    Ok(HoursEntry {
        id: row.try_get("id")?,
        liquidacion_id: row.try_get("liquidacion_id")?,
        recurso_id: row.try_get("recurso_id")?,
        fecha: row.try_get("fecha")?,
        horas_trabajadas: row.try_get("horas_trabajadas")?,
        tarifa_hora: row.try_get("tarifa_hora")?,
        total: row.try_get("total")?,
        descripcion_actividad: row.try_get("descripcion_actividad")?,
    })
}

/// Locks the settlement row and checks that it still accepts lines.
async fn lock_draft(conn: &mut PgConnection, id: i64) -> StorageResult<()> {
    let row = query(&format!(
        "SELECT {SETTLEMENT_COLUMNS} FROM liquidaciones WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    let settlement = row
        .as_ref()
        .map(row_to_settlement)
        .transpose()?
        .ok_or_else(|| StorageError::not_found(NOT_FOUND))?;
    if !settlement.status.is_editable() {
        return Err(StorageError::conflict(format!(
            "La liquidación está en estado '{}' y no admite cambios",
            settlement.status
        )));
    }
    Ok(())
}

/// Recomputes and stores the totals from every line of the settlement.
async fn refresh_totals(conn: &mut PgConnection, id: i64) -> StorageResult<()> {
    let expenses = query(&format!(
        "SELECT {EXPENSE_COLUMNS} FROM detalle_gastos WHERE liquidacion_id = $1"
    ))
    .bind(id)
    .fetch_all(&mut *conn)
    .await?
    .iter()
    .map(row_to_expense)
    .collect::<StorageResult<Vec<_>>>()?;
    let hours = query(&format!(
        "SELECT {HOURS_COLUMNS} FROM registro_horas WHERE liquidacion_id = $1"
    ))
    .bind(id)
    .fetch_all(&mut *conn)
    .await?
    .iter()
    .map(row_to_hours)
    .collect::<StorageResult<Vec<_>>>()?;

    let totals = settlement::totals(&expenses, &hours);
    query("UPDATE liquidaciones SET total_gastos = $2, total_horas = $3 WHERE id = $1")
        .bind(id)
        .bind(totals.total_expenses)
        .bind(totals.total_hours)
        .execute(&mut *conn)
        .await?;

    debug!(
        settlement_id = id,
        total_expenses = totals.total_expenses,
        total_hours = totals.total_hours,
        "Settlement totals refreshed"
    );
    Ok(())
}

pub struct SettlementStorage<'a> {
    pool: &'a PgPool,
}

impl<'a> SettlementStorage<'a> {
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Settlements, newest first, optionally for one project.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list(&self, proyecto_id: Option<i64>) -> StorageResult<Vec<Settlement>> {
        let rows = query(&format!(
            "SELECT {SETTLEMENT_COLUMNS} FROM liquidaciones \
             WHERE ($1::BIGINT IS NULL OR proyecto_id = $1) \
             ORDER BY fecha_creacion DESC, id DESC"
        ))
        .bind(proyecto_id)
        .fetch_all(self.pool)
        .await?;
        rows.iter().map(row_to_settlement).collect()
    }

    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn find_by_id(&self, id: i64) -> StorageResult<Option<Settlement>> {
        let row = query(&format!(
            "SELECT {SETTLEMENT_COLUMNS} FROM liquidaciones WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        row.as_ref().map(row_to_settlement).transpose()
    }

    /// # Errors
    ///
    /// Returns [`StorageError::Conflict`] if the project does not exist.
    pub async fn create(&self, settlement: &NewSettlement) -> StorageResult<Settlement> {
        let row = query(&format!(
            "INSERT INTO liquidaciones (proyecto_id, periodo_inicio, periodo_fin, observaciones, \
                creado_por) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {SETTLEMENT_COLUMNS}"
        ))
        .bind(settlement.proyecto_id)
        .bind(settlement.period_start)
        .bind(settlement.period_end)
        .bind(&settlement.notes)
        .bind(settlement.creado_por)
        .fetch_one(self.pool)
        .await
        .map_err(|e| reference_error(e, "Proyecto no encontrado"))?;
        row_to_settlement(&row)
    }

    /// Adds an expense line and refreshes the totals in one transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] for an unknown settlement and
    /// [`StorageError::Conflict`] when it is no longer a draft.
    pub async fn add_expense(&self, expense: &NewExpense) -> StorageResult<Expense> {
        let mut tx = self.pool.begin().await?;
        lock_draft(&mut tx, expense.liquidacion_id).await?;

        let row = query(&format!(
            "INSERT INTO detalle_gastos (liquidacion_id, tipo_gasto, descripcion, cantidad, \
                precio_unitario, total, fecha_gasto, comprobante_url) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {EXPENSE_COLUMNS}"
        ))
        .bind(expense.liquidacion_id)
        .bind(expense.kind.as_str())
        .bind(&expense.description)
        .bind(expense.quantity)
        .bind(expense.unit_price)
        .bind(expense.total)
        .bind(expense.date)
        .bind(&expense.receipt_url)
        .fetch_one(&mut *tx)
        .await?;
        let created = row_to_expense(&row)?;

        refresh_totals(&mut tx, expense.liquidacion_id).await?;
        tx.commit().await?;
        Ok(created)
    }

    /// Adds logged hours and refreshes the totals in one transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] for an unknown settlement,
    /// [`StorageError::Conflict`] when it is no longer a draft or the
    /// resource does not exist.
    pub async fn add_hours(&self, entry: &NewHoursEntry) -> StorageResult<HoursEntry> {
        let mut tx = self.pool.begin().await?;
        lock_draft(&mut tx, entry.liquidacion_id).await?;

        let row = query(&format!(
            "INSERT INTO registro_horas (liquidacion_id, recurso_id, fecha, horas_trabajadas, \
                tarifa_hora, total, descripcion_actividad) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {HOURS_COLUMNS}"
        ))
        .bind(entry.liquidacion_id)
        .bind(entry.recurso_id)
        .bind(entry.date)
        .bind(entry.hours)
        .bind(entry.hourly_rate)
        .bind(entry.total())
        .bind(&entry.activity)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| reference_error(e, "Recurso no encontrado"))?;
        let created = row_to_hours(&row)?;

        refresh_totals(&mut tx, entry.liquidacion_id).await?;
        tx.commit().await?;
        Ok(created)
    }

    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn expenses(&self, liquidacion_id: i64) -> StorageResult<Vec<Expense>> {
        let rows = query(&format!(
            "SELECT {EXPENSE_COLUMNS} FROM detalle_gastos WHERE liquidacion_id = $1 \
             ORDER BY fecha_gasto, id"
        ))
        .bind(liquidacion_id)
        .fetch_all(self.pool)
        .await?;
        rows.iter().map(row_to_expense).collect()
    }

    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn hours(&self, liquidacion_id: i64) -> StorageResult<Vec<HoursEntry>> {
        let rows = query(&format!(
            "SELECT {HOURS_COLUMNS} FROM registro_horas WHERE liquidacion_id = $1 \
             ORDER BY fecha, id"
        ))
        .bind(liquidacion_id)
        .fetch_all(self.pool)
        .await?;
        rows.iter().map(row_to_hours).collect()
    }

    /// Stores a validated status change; approval stamps are only written
    /// when the change carries them.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if the row is gone.
    pub async fn set_status(&self, id: i64, change: StatusChange) -> StorageResult<Settlement> {
        let (approver, approved_at) = change.approval.unzip();
        let row = query(&format!(
            "UPDATE liquidaciones SET estado = $2, \
                aprobado_por = COALESCE($3, aprobado_por), \
                fecha_aprobacion = COALESCE($4, fecha_aprobacion) \
             WHERE id = $1 RETURNING {SETTLEMENT_COLUMNS}"
        ))
        .bind(id)
        .bind(change.status.as_str())
        .bind(approver)
        .bind(approved_at)
        .fetch_optional(self.pool)
        .await?;
        row.as_ref()
            .map(row_to_settlement)
            .transpose()?
            .ok_or_else(|| StorageError::not_found(NOT_FOUND))
    }
}
