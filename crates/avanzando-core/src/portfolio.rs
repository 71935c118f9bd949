//! Cross-project aggregation for the portfolio dashboard.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::kpi::Kpi;
use crate::project::{Project, ProjectStatus};
use crate::resource::Resource;
use crate::risk::Risk;

/// Estimates below this are `low`.
pub const LOW_BUDGET_CEILING: f64 = 10_000.0;
/// Estimates at or above this are `high`.
pub const HIGH_BUDGET_FLOOR: f64 = 100_000.0;
pub const TOP_RISKS: usize = 10;

string_enum! {
    pub enum BudgetBand: "budget" {
        Low => "low",
        Medium => "medium",
        High => "high",
    }
}

impl BudgetBand {
    #[must_use]
    pub fn of(estimate: f64) -> Self {
        if estimate < LOW_BUDGET_CEILING {
            BudgetBand::Low
        } else if estimate < HIGH_BUDGET_FLOOR {
            BudgetBand::Medium
        } else {
            BudgetBand::High
        }
    }
}

/// Query-string filters of `GET /portfolio`. Absent fields match everything.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PortfolioFilter {
    pub status: Option<ProjectStatus>,
    pub client: Option<i64>,
    pub search: Option<String>,
    pub budget: Option<BudgetBand>,
}

impl PortfolioFilter {
    #[must_use]
    pub fn matches(&self, project: &Project) -> bool {
        if let Some(status) = self.status
            && project.status != status
        {
            return false;
        }
        if let Some(client) = self.client
            && project.cliente_id != client
        {
            return false;
        }
        if let Some(band) = self.budget
            && BudgetBand::of(project.estimated_budget.unwrap_or(0.0)) != band
        {
            return false;
        }
        match self.search.as_deref().map(str::trim) {
            Some(needle) if !needle.is_empty() => {
                let needle = needle.to_lowercase();
                project.name.to_lowercase().contains(&needle)
                    || project
                        .description
                        .as_deref()
                        .is_some_and(|d| d.to_lowercase().contains(&needle))
            }
            _ => true,
        }
    }
}

/// A project together with its phase-based progress.
#[derive(Debug, Clone)]
pub struct PortfolioProject {
    pub project: Project,
    pub progress: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectRow<'a> {
    pub id: i64,
    pub nombre: &'a str,
    pub descripcion: Option<&'a str>,
    pub estado: ProjectStatus,
    pub presupuesto_estimado: Option<f64>,
    pub presupuesto_real: f64,
    pub progreso: f64,
    pub cliente_nombre: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct KpiRow<'a> {
    pub proyecto: &'a str,
    pub nombre: &'a str,
    pub valor_actual: f64,
    pub valor_objetivo: f64,
    pub estado: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct RiskRow<'a> {
    pub proyecto: &'a str,
    pub descripcion: &'a str,
    pub exposicion: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estado: Option<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResourceRow<'a> {
    pub proyecto: &'a str,
    pub nombre: &'a str,
    pub tipo: &'static str,
    pub estado: &'static str,
    pub costo_total: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioOverview<'a> {
    pub total_projects: usize,
    pub active_projects: usize,
    pub completed_projects: usize,
    pub total_budget: f64,
    pub total_spent: f64,
    pub projects: Vec<ProjectRow<'a>>,
    pub kpi_summary: Vec<KpiRow<'a>>,
    pub risk_summary: Vec<RiskRow<'a>>,
    pub resource_utilization: Vec<ResourceRow<'a>>,
}

fn names_by_id(projects: &[PortfolioProject]) -> HashMap<i64, &str> {
    projects
        .iter()
        .map(|p| (p.project.id, p.project.name.as_str()))
        .collect()
}

/// Builds the dashboard from already-scoped projects and their children.
///
/// Children belonging to projects outside `projects` are ignored, as are
/// inactive risks and resources. Only open risks appear in `riskSummary`.
#[must_use]
pub fn overview<'a>(
    projects: &'a [PortfolioProject],
    kpis: &'a [Kpi],
    risks: &'a [Risk],
    resources: &'a [Resource],
) -> PortfolioOverview<'a> {
    let names = names_by_id(projects);
    let count = |status: ProjectStatus| {
        projects
            .iter()
            .filter(|p| p.project.status == status)
            .count()
    };

    let rows = projects
        .iter()
        .map(|p| ProjectRow {
            id: p.project.id,
            nombre: &p.project.name,
            descripcion: p.project.description.as_deref(),
            estado: p.project.status,
            presupuesto_estimado: p.project.estimated_budget,
            presupuesto_real: p.project.actual_budget,
            progreso: p.progress,
            cliente_nombre: p.project.cliente_nombre.as_deref().unwrap_or("N/A"),
        })
        .collect();

    let kpi_summary = kpis
        .iter()
        .filter_map(|k| {
            names.get(&k.proyecto_id).copied().map(|proyecto| KpiRow {
                proyecto,
                nombre: &k.name,
                valor_actual: k.current,
                valor_objetivo: k.target,
                estado: k.status.as_str(),
            })
        })
        .collect();

    let risk_summary = risks
        .iter()
        .filter(|r| r.active && r.status.is_open())
        .filter_map(|r| {
            names.get(&r.proyecto_id).copied().map(|proyecto| RiskRow {
                proyecto,
                descripcion: &r.description,
                exposicion: r.exposure(),
                estado: Some(r.status.as_str()),
            })
        })
        .collect();

    let resource_utilization = resources
        .iter()
        .filter(|r| r.active)
        .filter_map(|r| {
            names.get(&r.proyecto_id).copied().map(|proyecto| ResourceRow {
                proyecto,
                nombre: &r.name,
                tipo: r.kind.as_str(),
                estado: r.status.as_str(),
                costo_total: r.total_cost,
            })
        })
        .collect();

    PortfolioOverview {
        total_projects: projects.len(),
        active_projects: count(ProjectStatus::Active),
        completed_projects: count(ProjectStatus::Completed),
        total_budget: projects
            .iter()
            .map(|p| p.project.estimated_budget.unwrap_or(0.0))
            .sum(),
        total_spent: projects.iter().map(|p| p.project.actual_budget).sum(),
        projects: rows,
        kpi_summary,
        risk_summary,
        resource_utilization,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyCount {
    pub month: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct BudgetRow<'a> {
    pub proyecto: &'a str,
    pub presupuestado: f64,
    pub gastado: f64,
    pub varianza: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioAnalytics<'a> {
    pub monthly_projects: Vec<MonthlyCount>,
    pub budget_analysis: Vec<BudgetRow<'a>>,
    pub top_risks: Vec<RiskRow<'a>>,
}

#[must_use]
pub fn analytics<'a>(projects: &'a [Project], risks: &'a [Risk]) -> PortfolioAnalytics<'a> {
    let mut months: BTreeMap<String, usize> = BTreeMap::new();
    for project in projects {
        *months
            .entry(project.start_date.format("%Y-%m").to_string())
            .or_default() += 1;
    }
    let monthly_projects = months
        .into_iter()
        .map(|(month, count)| MonthlyCount { month, count })
        .collect();

    let budget_analysis = projects
        .iter()
        .filter_map(|p| match p.estimated_budget {
            Some(estimate) if estimate != 0.0 => Some(BudgetRow {
                proyecto: &p.name,
                presupuestado: estimate,
                gastado: p.actual_budget,
                varianza: p.budget_variance(),
            }),
            _ => None,
        })
        .collect();

    let names: HashMap<i64, &str> = projects.iter().map(|p| (p.id, p.name.as_str())).collect();
    let mut top_risks: Vec<RiskRow<'a>> = risks
        .iter()
        .filter(|r| r.active)
        .filter_map(|r| {
            names.get(&r.proyecto_id).copied().map(|proyecto| RiskRow {
                proyecto,
                descripcion: &r.description,
                exposicion: r.exposure(),
                estado: None,
            })
        })
        .collect();
    top_risks.sort_by(|a, b| b.exposicion.cmp(&a.exposicion));
    top_risks.truncate(TOP_RISKS);

    PortfolioAnalytics {
        monthly_projects,
        budget_analysis,
        top_risks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kpi::KpiKind;
    use crate::kpi::fixtures::kpi;
    use crate::project::fixtures::project;
    use crate::resource::ResourceKind;
    use crate::resource::fixtures::resource;
    use crate::risk::RiskStatus;
    use crate::risk::fixtures::risk;
    use chrono::NaiveDate;

    fn scoped(project: Project, progress: f64) -> PortfolioProject {
        PortfolioProject { project, progress }
    }

    #[test]
    fn budget_bands() {
        assert_eq!(BudgetBand::of(0.0), BudgetBand::Low);
        assert_eq!(BudgetBand::of(9_999.99), BudgetBand::Low);
        assert_eq!(BudgetBand::of(10_000.0), BudgetBand::Medium);
        assert_eq!(BudgetBand::of(99_999.0), BudgetBand::Medium);
        assert_eq!(BudgetBand::of(100_000.0), BudgetBand::High);
    }

    #[test]
    fn filters_combine() {
        let mut p = project(1, "Migración ERP");
        p.description = Some("Cambio de plataforma contable".into());
        p.estimated_budget = Some(50_000.0);

        assert!(PortfolioFilter::default().matches(&p));
        let search = |s: &str| PortfolioFilter {
            search: Some(s.into()),
            ..Default::default()
        };
        assert!(search("erp").matches(&p));
        assert!(search("CONTABLE").matches(&p));
        assert!(search("  ").matches(&p));
        assert!(!search("móvil").matches(&p));

        let filter = PortfolioFilter {
            status: Some(ProjectStatus::Active),
            client: Some(1),
            budget: Some(BudgetBand::Medium),
            search: None,
        };
        assert!(filter.matches(&p));
        assert!(!PortfolioFilter { client: Some(2), ..filter.clone() }.matches(&p));
        assert!(!PortfolioFilter { budget: Some(BudgetBand::High), ..filter.clone() }.matches(&p));
        assert!(!PortfolioFilter { status: Some(ProjectStatus::Paused), ..filter }.matches(&p));
    }

    #[test]
    fn overview_totals_and_rows() {
        let mut a = project(1, "A");
        a.estimated_budget = Some(1000.0);
        a.actual_budget = 400.0;
        let mut b = project(2, "B");
        b.status = ProjectStatus::Completed;
        b.cliente_nombre = None;
        b.actual_budget = 100.0;
        let projects = [scoped(a, 40.0), scoped(b, 100.0)];

        let kpis = [kpi(1, KpiKind::Cost, 100.0, 50.0)];
        let mut closed = risk(2, 5, 5);
        closed.status = RiskStatus::Closed;
        let mut foreign = risk(3, 1, 1);
        foreign.proyecto_id = 99;
        let risks = [risk(1, 3, 4), closed, foreign];
        let resources = [resource(1, ResourceKind::Human, 10.0, 5.0)];

        let view = overview(&projects, &kpis, &risks, &resources);
        assert_eq!(view.total_projects, 2);
        assert_eq!(view.active_projects, 1);
        assert_eq!(view.completed_projects, 1);
        assert_eq!(view.total_budget, 1000.0);
        assert_eq!(view.total_spent, 500.0);
        assert_eq!(view.projects[1].cliente_nombre, "N/A");
        assert_eq!(view.kpi_summary[0].proyecto, "A");
        assert_eq!(view.risk_summary.len(), 1);
        assert_eq!(view.risk_summary[0].exposicion, 12);
        assert_eq!(view.resource_utilization[0].costo_total, 50.0);

        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("totalProjects").is_some());
        assert!(json.get("resourceUtilization").is_some());
        assert_eq!(json["riskSummary"][0]["estado"], "identificado");
    }

    #[test]
    fn analytics_groups_months_and_ranks_risks() {
        let mut a = project(1, "A");
        a.start_date = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        a.estimated_budget = Some(200.0);
        a.actual_budget = 250.0;
        let mut b = project(2, "B");
        b.start_date = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        b.estimated_budget = Some(0.0);
        let mut c = project(3, "C");
        c.start_date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let projects = [a, b, c];

        let risks: Vec<Risk> = (1..=12).map(|i| risk(i, (i % 5 + 1) as i32, 5)).collect();
        let report = analytics(&projects, &risks);

        assert_eq!(
            report.monthly_projects,
            [
                MonthlyCount { month: "2024-01".into(), count: 1 },
                MonthlyCount { month: "2024-03".into(), count: 2 },
            ]
        );
        assert_eq!(report.budget_analysis.len(), 1);
        assert!((report.budget_analysis[0].varianza - 25.0).abs() < 1e-9);
        assert_eq!(report.top_risks.len(), TOP_RISKS);
        assert_eq!(report.top_risks[0].exposicion, 25);
        assert!(report.top_risks.windows(2).all(|w| w[0].exposicion >= w[1].exposicion));

        let json = serde_json::to_value(&report).unwrap();
        assert!(json["topRisks"][0].get("estado").is_none());
    }
}
