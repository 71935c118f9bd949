//! Project risks, exposure scoring and the 5x5 probability/impact matrix.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

string_enum! {
    pub enum RiskKind: "tipo" {
        Technical => "tecnico",
        Operational => "operacional",
        Financial => "financiero",
        Legal => "legal",
        External => "externo",
    }
}

string_enum! {
    pub enum RiskStatus: "estado" {
        Identified => "identificado",
        Monitoring => "en_seguimiento",
        Mitigated => "mitigado",
        Materialized => "materializado",
        Closed => "cerrado",
    }
}

impl Default for RiskStatus {
    fn default() -> Self {
        RiskStatus::Identified
    }
}

impl RiskStatus {
    /// Statuses that still need attention.
    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(self, RiskStatus::Identified | RiskStatus::Monitoring)
    }
}

level_enum! {
    pub enum Probability: "probabilidad" {
        VeryLow = 1 => "MUY_BAJA",
        Low = 2 => "BAJA",
        Medium = 3 => "MEDIA",
        High = 4 => "ALTA",
        VeryHigh = 5 => "MUY_ALTA",
    }
}

level_enum! {
    pub enum Impact: "impacto" {
        VeryLow = 1 => "MUY_BAJO",
        Low = 2 => "BAJO",
        Medium = 3 => "MEDIO",
        High = 4 => "ALTO",
        VeryHigh = 5 => "MUY_ALTO",
    }
}

/// Band of the exposure score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Critico,
    Alto,
    Medio,
    Bajo,
    MuyBajo,
}

impl RiskLevel {
    #[must_use]
    pub fn from_exposure(exposure: i32) -> Self {
        match exposure {
            e if e >= 20 => RiskLevel::Critico,
            e if e >= 15 => RiskLevel::Alto,
            e if e >= 10 => RiskLevel::Medio,
            e if e >= 5 => RiskLevel::Bajo,
            _ => RiskLevel::MuyBajo,
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Critico => "CRITICO",
            RiskLevel::Alto => "ALTO",
            RiskLevel::Medio => "MEDIO",
            RiskLevel::Bajo => "BAJO",
            RiskLevel::MuyBajo => "MUY_BAJO",
        }
    }

    #[must_use]
    pub const fn color(&self) -> &'static str {
        match self {
            RiskLevel::Critico => "#DC2626",
            RiskLevel::Alto => "#EA580C",
            RiskLevel::Medio => "#D97706",
            RiskLevel::Bajo => "#16A34A",
            RiskLevel::MuyBajo => "#059669",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Risk {
    pub id: i64,
    pub proyecto_id: i64,
    #[serde(rename = "codigo")]
    pub code: String,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "descripcion")]
    pub description: String,
    #[serde(rename = "tipo")]
    pub kind: RiskKind,
    #[serde(rename = "probabilidad")]
    pub probability: Probability,
    #[serde(rename = "impacto")]
    pub impact: Impact,
    #[serde(rename = "estado")]
    pub status: RiskStatus,
    #[serde(rename = "plan_mitigacion")]
    pub mitigation_plan: String,
    #[serde(rename = "plan_contingencia")]
    pub contingency_plan: String,
    pub responsable_id: Option<i64>,
    pub responsable_nombre: Option<String>,
    #[serde(rename = "fecha_identificacion")]
    pub identified_at: DateTime<Utc>,
    #[serde(rename = "fecha_revision")]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[serde(rename = "fecha_cierre")]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(rename = "costo_estimado")]
    pub estimated_cost: f64,
    #[serde(rename = "activo")]
    pub active: bool,
}

impl Risk {
    #[must_use]
    pub fn exposure(&self) -> i32 {
        exposure(self.probability, self.impact)
    }

    #[must_use]
    pub fn level(&self) -> RiskLevel {
        RiskLevel::from_exposure(self.exposure())
    }

    #[must_use]
    pub fn view(&self) -> RiskView<'_> {
        let level = self.level();
        RiskView {
            risk: self,
            exposure: self.exposure(),
            level: level.as_str(),
            color: level.color(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RiskView<'a> {
    #[serde(flatten)]
    pub risk: &'a Risk,
    #[serde(rename = "exposicion")]
    pub exposure: i32,
    #[serde(rename = "nivel_riesgo")]
    pub level: &'static str,
    #[serde(rename = "color_riesgo")]
    pub color: &'static str,
}

#[must_use]
pub fn exposure(probability: Probability, impact: Impact) -> i32 {
    probability.value() * impact.value()
}

/// `R-{project:03}-{sequence:03}`, where `existing` counts every risk the
/// project already has (including soft-deleted ones).
#[must_use]
pub fn risk_code(proyecto_id: i64, existing: i64) -> String {
    format!("R-{:03}-{:03}", proyecto_id, existing + 1)
}

#[derive(Debug, Clone)]
pub struct NewRisk {
    pub proyecto_id: i64,
    pub code: String,
    pub name: String,
    pub description: String,
    pub kind: RiskKind,
    pub probability: Probability,
    pub impact: Impact,
    pub mitigation_plan: String,
    pub contingency_plan: String,
    pub responsable_id: Option<i64>,
    pub estimated_cost: f64,
}

#[derive(Debug, Clone, Default)]
pub struct RiskChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub kind: Option<RiskKind>,
    pub probability: Option<Probability>,
    pub impact: Option<Impact>,
    pub status: Option<RiskStatus>,
    pub mitigation_plan: Option<String>,
    pub contingency_plan: Option<String>,
    pub responsable_id: Option<Option<i64>>,
    pub estimated_cost: Option<f64>,
}

impl RiskChanges {
    /// Applies the changes in memory. A status change stamps the review or
    /// closing date the first time the risk reaches that stage.
    pub fn apply(self, risk: &mut Risk, now: DateTime<Utc>) {
        if let Some(name) = self.name {
            risk.name = name;
        }
        if let Some(description) = self.description {
            risk.description = description;
        }
        if let Some(kind) = self.kind {
            risk.kind = kind;
        }
        if let Some(probability) = self.probability {
            risk.probability = probability;
        }
        if let Some(impact) = self.impact {
            risk.impact = impact;
        }
        if let Some(plan) = self.mitigation_plan {
            risk.mitigation_plan = plan;
        }
        if let Some(plan) = self.contingency_plan {
            risk.contingency_plan = plan;
        }
        if let Some(responsable_id) = self.responsable_id {
            risk.responsable_id = responsable_id;
        }
        if let Some(cost) = self.estimated_cost {
            risk.estimated_cost = cost;
        }
        if let Some(status) = self.status {
            risk.status = status;
            match status {
                RiskStatus::Monitoring if risk.reviewed_at.is_none() => {
                    risk.reviewed_at = Some(now);
                }
                RiskStatus::Mitigated | RiskStatus::Closed if risk.closed_at.is_none() => {
                    risk.closed_at = Some(now);
                }
                _ => {}
            }
        }
    }
}

// -------------------------
// Matrix and dashboard
// -------------------------

/// Probability (outer key) by impact (inner key), both `"1"` to `"5"`.
pub type RiskMatrix<'a> = BTreeMap<String, BTreeMap<String, Vec<RiskView<'a>>>>;

#[derive(Debug, Clone, Serialize)]
pub struct RiskStatistics {
    pub total_riesgos: usize,
    pub riesgos_por_nivel: BTreeMap<&'static str, usize>,
    pub riesgos_por_estado: BTreeMap<&'static str, usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RiskMatrixReport<'a> {
    pub matriz: RiskMatrix<'a>,
    pub estadisticas: RiskStatistics,
    pub riesgos: Vec<RiskView<'a>>,
}

#[must_use]
pub fn matrix(risks: &[Risk]) -> RiskMatrixReport<'_> {
    let mut matriz: RiskMatrix<'_> = (1..=5)
        .map(|p| {
            let row = (1..=5).map(|i| (i.to_string(), Vec::new())).collect();
            (p.to_string(), row)
        })
        .collect();
    for risk in risks {
        if let Some(cell) = matriz
            .get_mut(&risk.probability.value().to_string())
            .and_then(|row| row.get_mut(&risk.impact.value().to_string()))
        {
            cell.push(risk.view());
        }
    }

    RiskMatrixReport {
        matriz,
        estadisticas: statistics(risks),
        riesgos: risks.iter().map(Risk::view).collect(),
    }
}

/// Counts only the levels and statuses that occur.
#[must_use]
pub fn statistics(risks: &[Risk]) -> RiskStatistics {
    let mut riesgos_por_nivel: BTreeMap<&'static str, usize> = BTreeMap::new();
    let mut riesgos_por_estado: BTreeMap<&'static str, usize> = BTreeMap::new();
    for risk in risks {
        *riesgos_por_nivel.entry(risk.level().as_str()).or_insert(0) += 1;
        *riesgos_por_estado.entry(risk.status.as_str()).or_insert(0) += 1;
    }
    RiskStatistics {
        total_riesgos: risks.len(),
        riesgos_por_nivel,
        riesgos_por_estado,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RiskDashboardSummary {
    pub total_riesgos: usize,
    pub riesgos_criticos: usize,
    pub costo_total_estimado: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RiskDashboard<'a> {
    pub resumen: RiskDashboardSummary,
    pub riesgos_por_tipo: BTreeMap<&'static str, usize>,
    pub riesgos_criticos: Vec<RiskView<'a>>,
}

/// Critical risks are those at exposure 20 or more; the five worst are listed.
#[must_use]
pub fn dashboard(risks: &[Risk]) -> RiskDashboard<'_> {
    let mut critical: Vec<&Risk> = risks
        .iter()
        .filter(|r| r.level() == RiskLevel::Critico)
        .collect();
    critical.sort_by_key(|r| std::cmp::Reverse(r.exposure()));

    let riesgos_por_tipo = RiskKind::ALL
        .iter()
        .map(|kind| (kind.as_str(), risks.iter().filter(|r| r.kind == *kind).count()))
        .collect();

    RiskDashboard {
        resumen: RiskDashboardSummary {
            total_riesgos: risks.len(),
            riesgos_criticos: critical.len(),
            costo_total_estimado: risks.iter().map(|r| r.estimated_cost).sum(),
        },
        riesgos_por_tipo,
        riesgos_criticos: critical.into_iter().take(5).map(Risk::view).collect(),
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn risk(id: i64, p: i32, i: i32) -> Risk {
        Risk {
            id,
            proyecto_id: 1,
            code: risk_code(1, id - 1),
            name: format!("Riesgo {id}"),
            description: "desc".into(),
            kind: RiskKind::Technical,
            probability: Probability::try_from(p).unwrap(),
            impact: Impact::try_from(i).unwrap(),
            status: RiskStatus::Identified,
            mitigation_plan: String::new(),
            contingency_plan: String::new(),
            responsable_id: None,
            responsable_nombre: None,
            identified_at: Utc::now(),
            reviewed_at: None,
            closed_at: None,
            estimated_cost: 100.0,
            active: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::risk;
    use super::*;

    #[test]
    fn levels_for_every_cell() {
        for p in Probability::ALL {
            for i in Impact::ALL {
                let e = exposure(*p, *i);
                let expected = if e >= 20 {
                    ("CRITICO", "#DC2626")
                } else if e >= 15 {
                    ("ALTO", "#EA580C")
                } else if e >= 10 {
                    ("MEDIO", "#D97706")
                } else if e >= 5 {
                    ("BAJO", "#16A34A")
                } else {
                    ("MUY_BAJO", "#059669")
                };
                let level = RiskLevel::from_exposure(e);
                assert_eq!((level.as_str(), level.color()), expected, "p={p:?} i={i:?}");
            }
        }
        assert_eq!(RiskLevel::from_exposure(4), RiskLevel::MuyBajo);
        assert_eq!(RiskLevel::from_exposure(5), RiskLevel::Bajo);
        assert_eq!(RiskLevel::from_exposure(25), RiskLevel::Critico);
    }

    #[test]
    fn code_is_zero_padded() {
        assert_eq!(risk_code(7, 0), "R-007-001");
        assert_eq!(risk_code(12, 41), "R-012-042");
    }

    #[test]
    fn levels_serialize_as_value_and_text() {
        let json = serde_json::to_value(risk(1, 4, 5).view()).unwrap();
        assert_json_diff::assert_json_include!(
            actual: json,
            expected: serde_json::json!({
                "probabilidad": { "valor": 4, "texto": "ALTA" },
                "impacto": { "texto": "MUY_ALTO" },
                "exposicion": 20,
                "nivel_riesgo": "CRITICO",
                "color_riesgo": "#DC2626"
            })
        );
    }

    #[test]
    fn levels_deserialize_from_integers() {
        let p: Probability = serde_json::from_str("3").unwrap();
        assert_eq!(p, Probability::Medium);
        assert!(serde_json::from_str::<Impact>("6").is_err());
        assert!(Impact::try_from(0).is_err());
    }

    #[test]
    fn status_changes_stamp_dates_once() {
        let mut r = risk(1, 2, 2);
        let first = Utc::now();
        RiskChanges {
            status: Some(RiskStatus::Monitoring),
            ..Default::default()
        }
        .apply(&mut r, first);
        assert_eq!(r.reviewed_at, Some(first));
        assert_eq!(r.closed_at, None);

        let later = first + chrono::Duration::days(3);
        RiskChanges {
            status: Some(RiskStatus::Monitoring),
            ..Default::default()
        }
        .apply(&mut r, later);
        assert_eq!(r.reviewed_at, Some(first));

        RiskChanges {
            status: Some(RiskStatus::Closed),
            ..Default::default()
        }
        .apply(&mut r, later);
        assert_eq!(r.closed_at, Some(later));
        assert_eq!(r.status, RiskStatus::Closed);
    }

    #[test]
    fn matrix_places_risks_by_probability_then_impact() {
        let risks = vec![risk(1, 5, 4), risk(2, 1, 1), risk(3, 5, 4)];
        let report = matrix(&risks);
        assert_eq!(report.matriz.len(), 5);
        assert!(report.matriz.values().all(|row| row.len() == 5));
        assert_eq!(report.matriz["5"]["4"].len(), 2);
        assert_eq!(report.matriz["1"]["1"].len(), 1);
        assert!(report.matriz["4"]["5"].is_empty());
        assert_eq!(report.estadisticas.total_riesgos, 3);
        assert_eq!(report.estadisticas.riesgos_por_nivel["CRITICO"], 2);
        assert_eq!(report.estadisticas.riesgos_por_nivel["MUY_BAJO"], 1);
        assert_eq!(report.estadisticas.riesgos_por_estado["identificado"], 3);
    }

    #[test]
    fn dashboard_lists_critical_risks() {
        let risks: Vec<Risk> = (1..=8).map(|id| risk(id, 5, if id % 2 == 0 { 5 } else { 4 })).collect();
        let dash = dashboard(&risks);
        assert_eq!(dash.resumen.total_riesgos, 8);
        assert_eq!(dash.resumen.riesgos_criticos, 8);
        assert_eq!(dash.resumen.costo_total_estimado, 800.0);
        assert_eq!(dash.riesgos_criticos.len(), 5);
        assert_eq!(dash.riesgos_criticos[0].exposure, 25);
        assert_eq!(dash.riesgos_por_tipo["tecnico"], 8);
        assert_eq!(dash.riesgos_por_tipo["legal"], 0);
    }
}
