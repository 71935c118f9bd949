//! Cost settlements: expenses and logged hours for a project period.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::{CoreError, CoreResult};

string_enum! {
    pub enum SettlementStatus: "estado" {
        Draft => "borrador",
        Submitted => "enviada",
        Approved => "aprobada",
        Paid => "pagada",
        Rejected => "rechazada",
    }
}

impl SettlementStatus {
    /// Allowed moves of the approval workflow.
    #[must_use]
    pub fn can_transition_to(&self, next: SettlementStatus) -> bool {
        use SettlementStatus::*;
        matches!(
            (self, next),
            (Draft, Submitted)
                | (Submitted, Approved)
                | (Submitted, Rejected)
                | (Approved, Paid)
                | (Rejected, Draft)
        )
    }

    /// Only drafts accept new expenses or hours.
    #[must_use]
    pub fn is_editable(&self) -> bool {
        matches!(self, SettlementStatus::Draft)
    }
}

string_enum! {
    pub enum ExpenseKind: "tipo_gasto" {
        Personnel => "personal",
        Material => "material",
        Service => "servicio",
        Transport => "transporte",
        Other => "otro",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Settlement {
    pub id: i64,
    pub proyecto_id: i64,
    #[serde(rename = "periodo_inicio")]
    pub period_start: NaiveDate,
    #[serde(rename = "periodo_fin")]
    pub period_end: NaiveDate,
    #[serde(rename = "estado")]
    pub status: SettlementStatus,
    #[serde(rename = "total_gastos")]
    pub total_expenses: f64,
    #[serde(rename = "total_horas")]
    pub total_hours: f64,
    #[serde(rename = "observaciones")]
    pub notes: Option<String>,
    pub creado_por: i64,
    pub aprobado_por: Option<i64>,
    #[serde(rename = "fecha_creacion")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "fecha_aprobacion")]
    pub approved_at: Option<DateTime<Utc>>,
}

impl Settlement {
    /// Validates a status change and returns the approval stamp to store,
    /// which is only set when moving to `aprobada`.
    pub fn transition(
        &self,
        next: SettlementStatus,
        actor: i64,
        now: DateTime<Utc>,
    ) -> CoreResult<StatusChange> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::invalid_transition(self.status.as_str(), next.as_str()));
        }
        let approval = (next == SettlementStatus::Approved).then_some((actor, now));
        Ok(StatusChange {
            status: next,
            approval,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub status: SettlementStatus,
    /// Approver and approval time.
    pub approval: Option<(i64, DateTime<Utc>)>,
}

#[derive(Debug, Clone)]
pub struct NewSettlement {
    pub proyecto_id: i64,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub notes: Option<String>,
    pub creado_por: i64,
}

impl NewSettlement {
    pub fn validate(&self) -> CoreResult<()> {
        if self.period_end < self.period_start {
            return Err(CoreError::validation(
                "La fecha de fin del período no puede ser anterior a la de inicio",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Expense {
    pub id: i64,
    pub liquidacion_id: i64,
    pub tipo_gasto: ExpenseKind,
    #[serde(rename = "descripcion")]
    pub description: String,
    #[serde(rename = "cantidad")]
    pub quantity: f64,
    #[serde(rename = "precio_unitario")]
    pub unit_price: f64,
    pub total: f64,
    pub fecha_gasto: NaiveDate,
    pub comprobante_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewExpense {
    pub liquidacion_id: i64,
    pub kind: ExpenseKind,
    pub description: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub total: f64,
    pub date: NaiveDate,
    pub receipt_url: Option<String>,
}

/// Explicit totals win; otherwise quantity times unit price.
#[must_use]
pub fn expense_total(quantity: f64, unit_price: f64, explicit: Option<f64>) -> f64 {
    explicit.unwrap_or(quantity * unit_price)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HoursEntry {
    pub id: i64,
    pub liquidacion_id: i64,
    pub recurso_id: i64,
    pub fecha: NaiveDate,
    pub horas_trabajadas: f64,
    pub tarifa_hora: f64,
    pub total: f64,
    pub descripcion_actividad: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewHoursEntry {
    pub liquidacion_id: i64,
    pub recurso_id: i64,
    pub date: NaiveDate,
    pub hours: f64,
    pub hourly_rate: f64,
    pub activity: Option<String>,
}

impl NewHoursEntry {
    #[must_use]
    pub fn total(&self) -> f64 {
        self.hours * self.hourly_rate
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.hours <= 0.0 || self.hours > 24.0 {
            return Err(CoreError::validation(
                "Las horas trabajadas deben estar entre 0 y 24",
            ));
        }
        if self.hourly_rate < 0.0 {
            return Err(CoreError::validation("La tarifa por hora no puede ser negativa"));
        }
        Ok(())
    }
}

/// Totals stored on the settlement after each insert.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SettlementTotals {
    pub total_expenses: f64,
    pub total_hours: f64,
}

/// Costs include both expenses and billed hours.
#[must_use]
pub fn totals(expenses: &[Expense], hours: &[HoursEntry]) -> SettlementTotals {
    SettlementTotals {
        total_expenses: expenses.iter().map(|e| e.total).sum::<f64>()
            + hours.iter().map(|h| h.total).sum::<f64>(),
        total_hours: hours.iter().map(|h| h.horas_trabajadas).sum(),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    pub total_gastos: f64,
    pub total_horas: f64,
    pub gastos_por_tipo: BTreeMap<&'static str, f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SettlementReport<'a> {
    pub liquidacion: &'a Settlement,
    pub gastos: &'a [Expense],
    pub horas: &'a [HoursEntry],
    pub resumen: ReportSummary,
}

#[must_use]
pub fn report<'a>(
    settlement: &'a Settlement,
    expenses: &'a [Expense],
    hours: &'a [HoursEntry],
) -> SettlementReport<'a> {
    let totals = totals(expenses, hours);
    let gastos_por_tipo = ExpenseKind::ALL
        .iter()
        .map(|kind| {
            let sum = expenses
                .iter()
                .filter(|e| e.tipo_gasto == *kind)
                .map(|e| e.total)
                .sum();
            (kind.as_str(), sum)
        })
        .collect();
    SettlementReport {
        liquidacion: settlement,
        gastos: expenses,
        horas: hours,
        resumen: ReportSummary {
            total_gastos: totals.total_expenses,
            total_horas: totals.total_hours,
            gastos_por_tipo,
        },
    }
}
