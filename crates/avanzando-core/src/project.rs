//! Projects and their lifecycle phases.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::{CoreError, CoreResult};

string_enum! {
    pub enum ProjectStatus: "estado" {
        Active => "activo",
        Paused => "pausado",
        Completed => "completado",
        Cancelled => "cancelado",
    }
}

impl Default for ProjectStatus {
    fn default() -> Self {
        ProjectStatus::Active
    }
}

string_enum! {
    /// The five lifecycle stages every project is created with.
    pub enum PhaseKind: "tipo" {
        Initiation => "inicio",
        Planning => "planeacion",
        Execution => "ejecucion",
        MonitoringControl => "seguimiento_control",
        Closing => "cierre",
    }
}

impl PhaseKind {
    #[must_use]
    pub const fn default_name(&self) -> &'static str {
        match self {
            PhaseKind::Initiation => "Inicio",
            PhaseKind::Planning => "Planeación",
            PhaseKind::Execution => "Ejecución",
            PhaseKind::MonitoringControl => "Seguimiento y Control",
            PhaseKind::Closing => "Cierre",
        }
    }
}

/// Phases inserted, in this order, when a project is created.
pub const DEFAULT_PHASES: [PhaseKind; 5] = [
    PhaseKind::Initiation,
    PhaseKind::Planning,
    PhaseKind::Execution,
    PhaseKind::MonitoringControl,
    PhaseKind::Closing,
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Project {
    pub id: i64,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "descripcion")]
    pub description: Option<String>,
    pub cliente_id: i64,
    pub cliente_nombre: Option<String>,
    pub pm_id: Option<i64>,
    #[serde(rename = "estado")]
    pub status: ProjectStatus,
    #[serde(rename = "fecha_inicio")]
    pub start_date: NaiveDate,
    #[serde(rename = "fecha_fin")]
    pub end_date: Option<NaiveDate>,
    #[serde(rename = "presupuesto_estimado")]
    pub estimated_budget: Option<f64>,
    #[serde(rename = "presupuesto_real")]
    pub actual_budget: f64,
    #[serde(rename = "fecha_creacion")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "fecha_actualizacion")]
    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// Spent budget as a percentage of the estimate, 0 without an estimate.
    #[must_use]
    pub fn budget_used_percentage(&self) -> f64 {
        match self.estimated_budget {
            Some(estimate) if estimate > 0.0 => self.actual_budget / estimate * 100.0,
            _ => 0.0,
        }
    }

    /// `(real - estimate) / estimate * 100`, 0 without a non-zero estimate.
    #[must_use]
    pub fn budget_variance(&self) -> f64 {
        match self.estimated_budget {
            Some(estimate) if estimate != 0.0 => {
                (self.actual_budget - estimate) / estimate * 100.0
            }
            _ => 0.0,
        }
    }

    /// Whole days since the start date, or `None` for projects starting in the future.
    #[must_use]
    pub fn days_elapsed(&self, today: NaiveDate) -> Option<i64> {
        let days = (today - self.start_date).num_days();
        (days >= 0).then_some(days)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Phase {
    pub id: i64,
    pub proyecto_id: i64,
    #[serde(rename = "tipo")]
    pub kind: PhaseKind,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "descripcion")]
    pub description: Option<String>,
    #[serde(rename = "avance")]
    pub advance: i32,
    #[serde(rename = "fecha_inicio")]
    pub start_date: Option<NaiveDate>,
    #[serde(rename = "fecha_fin")]
    pub end_date: Option<NaiveDate>,
    #[serde(rename = "completada")]
    pub completed: bool,
    #[serde(rename = "fecha_creacion")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "fecha_actualizacion")]
    pub updated_at: DateTime<Utc>,
}

/// Project plus its phases, as returned by the detail endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectDetail {
    #[serde(flatten)]
    pub project: Project,
    #[serde(rename = "fases")]
    pub phases: Vec<Phase>,
}

#[derive(Debug, Clone)]
pub struct NewProject {
    pub name: String,
    pub description: Option<String>,
    pub cliente_id: i64,
    pub pm_id: Option<i64>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub estimated_budget: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct ProjectChanges {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub status: Option<ProjectStatus>,
    pub end_date: Option<Option<NaiveDate>>,
    pub estimated_budget: Option<Option<f64>>,
    pub actual_budget: Option<f64>,
}

impl ProjectChanges {
    pub fn apply(self, project: &mut Project) {
        if let Some(name) = self.name {
            project.name = name;
        }
        if let Some(description) = self.description {
            project.description = description;
        }
        if let Some(status) = self.status {
            project.status = status;
        }
        if let Some(end_date) = self.end_date {
            project.end_date = end_date;
        }
        if let Some(estimate) = self.estimated_budget {
            project.estimated_budget = estimate;
        }
        if let Some(actual) = self.actual_budget {
            project.actual_budget = actual;
        }
    }
}

/// New values for a phase after an advance is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseAdvance {
    pub advance: i32,
    pub completed: bool,
    pub end_date: Option<NaiveDate>,
}

/// Validates an advance percentage and derives the completion columns.
///
/// Reaching 100 completes the phase and closes it today; lower values keep
/// whatever completion state the phase already had.
pub fn plan_advance(phase: &Phase, advance: i64, today: NaiveDate) -> CoreResult<PhaseAdvance> {
    if !(0..=100).contains(&advance) {
        return Err(CoreError::validation("El avance debe estar entre 0 y 100"));
    }
    let advance = advance as i32;
    if advance == 100 {
        Ok(PhaseAdvance {
            advance,
            completed: true,
            end_date: Some(today),
        })
    } else {
        Ok(PhaseAdvance {
            advance,
            completed: phase.completed,
            end_date: phase.end_date,
        })
    }
}

/// Completed phases over total phases, as a percentage.
#[must_use]
pub fn progress(phases: &[Phase]) -> f64 {
    if phases.is_empty() {
        return 0.0;
    }
    let completed = phases.iter().filter(|phase| phase.completed).count();
    completed as f64 / phases.len() as f64 * 100.0
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn project(id: i64, name: &str) -> Project {
        let created = Utc::now();
        Project {
            id,
            name: name.to_string(),
            description: None,
            cliente_id: 1,
            cliente_nombre: Some("Acme".to_string()),
            pm_id: Some(10),
            status: ProjectStatus::Active,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: None,
            estimated_budget: None,
            actual_budget: 0.0,
            created_at: created,
            updated_at: created,
        }
    }

    pub fn phase(id: i64, kind: PhaseKind, completed: bool) -> Phase {
        let created = Utc::now();
        Phase {
            id,
            proyecto_id: 1,
            kind,
            name: kind.default_name().to_string(),
            description: None,
            advance: if completed { 100 } else { 0 },
            start_date: None,
            end_date: None,
            completed,
            created_at: created,
            updated_at: created,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::{phase, project};
    use super::*;

    #[test]
    fn default_phases_are_ordered_and_named() {
        let names: Vec<_> = DEFAULT_PHASES.iter().map(PhaseKind::default_name).collect();
        assert_eq!(
            names,
            ["Inicio", "Planeación", "Ejecución", "Seguimiento y Control", "Cierre"]
        );
        assert_eq!(PhaseKind::MonitoringControl.as_str(), "seguimiento_control");
    }

    #[test]
    fn progress_counts_completed_phases() {
        assert_eq!(progress(&[]), 0.0);
        let phases: Vec<_> = DEFAULT_PHASES
            .iter()
            .enumerate()
            .map(|(i, kind)| phase(i as i64, *kind, i < 2))
            .collect();
        assert_eq!(progress(&phases), 40.0);
    }

    #[test]
    fn advance_bounds_and_completion() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let open = phase(1, PhaseKind::Execution, false);

        assert!(plan_advance(&open, -1, today).is_err());
        assert!(plan_advance(&open, 101, today).is_err());

        let partial = plan_advance(&open, 60, today).unwrap();
        assert_eq!(partial.advance, 60);
        assert!(!partial.completed);
        assert_eq!(partial.end_date, None);

        let done = plan_advance(&open, 100, today).unwrap();
        assert!(done.completed);
        assert_eq!(done.end_date, Some(today));
    }

    #[test]
    fn budget_figures() {
        let mut p = project(1, "Portal");
        assert_eq!(p.budget_used_percentage(), 0.0);
        assert_eq!(p.budget_variance(), 0.0);

        p.estimated_budget = Some(1000.0);
        p.actual_budget = 1250.0;
        assert_eq!(p.budget_used_percentage(), 125.0);
        assert_eq!(p.budget_variance(), 25.0);
    }

    #[test]
    fn detail_flattens_project_fields() {
        let detail = ProjectDetail {
            project: project(3, "ERP"),
            phases: vec![phase(1, PhaseKind::Initiation, false)],
        };
        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["nombre"], "ERP");
        assert_eq!(json["estado"], "activo");
        assert_eq!(json["cliente_nombre"], "Acme");
        assert_eq!(json["fecha_inicio"], "2024-01-01");
        assert_eq!(json["fases"][0]["tipo"], "inicio");
    }
}
