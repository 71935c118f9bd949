//! Key performance indicators and their traffic-light classification.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

string_enum! {
    pub enum KpiKind: "tipo" {
        Time => "tiempo",
        Scope => "alcance",
        Cost => "costo",
        Quality => "calidad",
        Resources => "recursos",
    }
}

string_enum! {
    pub enum KpiStatus: "estado" {
        Green => "verde",
        Yellow => "amarillo",
        Red => "rojo",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Kpi {
    pub id: i64,
    pub proyecto_id: i64,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "descripcion")]
    pub description: Option<String>,
    #[serde(rename = "tipo")]
    pub kind: KpiKind,
    #[serde(rename = "valor_objetivo")]
    pub target: f64,
    #[serde(rename = "valor_actual")]
    pub current: f64,
    #[serde(rename = "unidad_medida")]
    pub unit: String,
    #[serde(rename = "estado")]
    pub status: KpiStatus,
    #[serde(rename = "umbral_amarillo")]
    pub yellow_threshold: f64,
    #[serde(rename = "umbral_rojo")]
    pub red_threshold: f64,
    #[serde(rename = "activo")]
    pub active: bool,
    #[serde(rename = "fecha_creacion")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "fecha_actualizacion")]
    pub updated_at: DateTime<Utc>,
}

impl Kpi {
    #[must_use]
    pub fn compliance_percentage(&self) -> f64 {
        compliance_percentage(self.current, self.target)
    }

    /// Serializable form carrying `porcentaje_cumplimiento`.
    #[must_use]
    pub fn view(&self) -> KpiView<'_> {
        KpiView {
            kpi: self,
            compliance: self.compliance_percentage(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct KpiView<'a> {
    #[serde(flatten)]
    pub kpi: &'a Kpi,
    #[serde(rename = "porcentaje_cumplimiento")]
    pub compliance: f64,
}

/// Values written on insert. `status` is derived, not supplied.
#[derive(Debug, Clone)]
pub struct NewKpi {
    pub proyecto_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub kind: KpiKind,
    pub target: f64,
    pub current: f64,
    pub unit: String,
    pub yellow_threshold: f64,
    pub red_threshold: f64,
}

impl NewKpi {
    #[must_use]
    pub fn status(&self) -> KpiStatus {
        classify(self.current, self.yellow_threshold, self.red_threshold)
    }
}

#[derive(Debug, Clone, Default)]
pub struct KpiChanges {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub kind: Option<KpiKind>,
    pub target: Option<f64>,
    pub current: Option<f64>,
    pub unit: Option<String>,
    pub yellow_threshold: Option<f64>,
    pub red_threshold: Option<f64>,
}

impl KpiChanges {
    /// Applies the changes in memory and reclassifies the KPI.
    pub fn apply(self, kpi: &mut Kpi) {
        if let Some(name) = self.name {
            kpi.name = name;
        }
        if let Some(description) = self.description {
            kpi.description = description;
        }
        if let Some(kind) = self.kind {
            kpi.kind = kind;
        }
        if let Some(target) = self.target {
            kpi.target = target;
        }
        if let Some(current) = self.current {
            kpi.current = current;
        }
        if let Some(unit) = self.unit {
            kpi.unit = unit;
        }
        if let Some(threshold) = self.yellow_threshold {
            kpi.yellow_threshold = threshold;
        }
        if let Some(threshold) = self.red_threshold {
            kpi.red_threshold = threshold;
        }
        kpi.status = classify(kpi.current, kpi.yellow_threshold, kpi.red_threshold);
    }
}

/// Thresholds are "bad above": reaching the red threshold wins over yellow.
#[must_use]
pub fn classify(current: f64, yellow_threshold: f64, red_threshold: f64) -> KpiStatus {
    if current >= red_threshold {
        KpiStatus::Red
    } else if current >= yellow_threshold {
        KpiStatus::Yellow
    } else {
        KpiStatus::Green
    }
}

#[must_use]
pub fn compliance_percentage(current: f64, target: f64) -> f64 {
    if target == 0.0 {
        0.0
    } else {
        (current / target * 100.0).min(100.0)
    }
}

// -------------------------
// Dashboard
// -------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiSummary {
    pub total_kpis: usize,
    pub kpis_verdes: usize,
    pub kpis_amarillos: usize,
    pub kpis_rojos: usize,
    pub porcentaje_verde: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KindBreakdown {
    pub total: usize,
    pub promedio_cumplimiento: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct KpiDashboard<'a> {
    pub resumen: KpiSummary,
    pub kpis_por_tipo: BTreeMap<&'static str, KindBreakdown>,
    pub kpis: Vec<KpiView<'a>>,
}

#[must_use]
pub fn summarize(kpis: &[Kpi]) -> KpiSummary {
    let count = |status: KpiStatus| kpis.iter().filter(|k| k.status == status).count();
    let greens = count(KpiStatus::Green);
    KpiSummary {
        total_kpis: kpis.len(),
        kpis_verdes: greens,
        kpis_amarillos: count(KpiStatus::Yellow),
        kpis_rojos: count(KpiStatus::Red),
        porcentaje_verde: if kpis.is_empty() {
            0.0
        } else {
            greens as f64 / kpis.len() as f64 * 100.0
        },
    }
}

/// Aggregates the active KPIs of one project. Every kind is present in the
/// breakdown, with zeroes when the project has none of it.
#[must_use]
pub fn dashboard(kpis: &[Kpi]) -> KpiDashboard<'_> {
    let kpis_por_tipo = KpiKind::ALL
        .iter()
        .map(|kind| {
            let of_kind: Vec<&Kpi> = kpis.iter().filter(|k| k.kind == *kind).collect();
            let average = if of_kind.is_empty() {
                0.0
            } else {
                of_kind.iter().map(|k| k.compliance_percentage()).sum::<f64>()
                    / of_kind.len() as f64
            };
            (
                kind.as_str(),
                KindBreakdown {
                    total: of_kind.len(),
                    promedio_cumplimiento: average,
                },
            )
        })
        .collect();

    KpiDashboard {
        resumen: summarize(kpis),
        kpis_por_tipo,
        kpis: kpis.iter().map(Kpi::view).collect(),
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn kpi(id: i64, kind: KpiKind, target: f64, current: f64) -> Kpi {
        let now = Utc::now();
        Kpi {
            id,
            proyecto_id: 1,
            name: format!("KPI {id}"),
            description: None,
            kind,
            target,
            current,
            unit: "%".into(),
            status: classify(current, 70.0, 90.0),
            yellow_threshold: 70.0,
            red_threshold: 90.0,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }
}
