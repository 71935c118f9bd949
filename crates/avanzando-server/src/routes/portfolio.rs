//! Cross-project dashboard, analytics and report export.
//!
//! Administrators aggregate every project; anyone else only the projects
//! they manage.

use std::collections::HashMap;

use avanzando_api::{ApiError, ApiQuery};
use avanzando_auth::BearerAuth;
use avanzando_core::export::{self, ExportFormat};
use avanzando_core::portfolio::{self, PortfolioFilter, PortfolioProject};
use avanzando_core::project::{self as project_core, Phase, Project};
use avanzando_core::user::User;
use avanzando_db_postgres::ProjectScope;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::server::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/portfolio", get(overview))
        .route("/api/portfolio/analytics", get(analytics))
        .route("/api/portfolio/export", get(export_report))
}

#[derive(Debug, Default, Deserialize)]
pub struct ExportQuery {
    pub format: Option<String>,
}

impl ExportQuery {
    /// Defaults to CSV; unknown formats are a 400.
    fn format(&self) -> Result<ExportFormat, ApiError> {
        match self.format.as_deref() {
            None => Ok(ExportFormat::Csv),
            Some(raw) => raw
                .parse::<ExportFormat>()
                .map_err(|_| ApiError::bad_request("Formato no soportado")),
        }
    }
}

fn scope_for(user: &User) -> ProjectScope {
    if user.role.is_admin() {
        ProjectScope::All
    } else {
        ProjectScope::ManagedBy(user.id)
    }
}

/// Pairs each project with the progress of its own phases.
fn with_progress(projects: Vec<Project>, phases: &[Phase]) -> Vec<PortfolioProject> {
    let mut by_project: HashMap<i64, Vec<Phase>> = HashMap::new();
    for phase in phases {
        by_project
            .entry(phase.proyecto_id)
            .or_default()
            .push(phase.clone());
    }
    projects
        .into_iter()
        .map(|project| {
            let progress = by_project
                .get(&project.id)
                .map_or(0.0, |phases| project_core::progress(phases));
            PortfolioProject { project, progress }
        })
        .collect()
}

/// Scoped projects after filtering, with their progress.
async fn load_portfolio(
    state: &AppState,
    user: &User,
    filter: &PortfolioFilter,
) -> Result<Vec<PortfolioProject>, ApiError> {
    let projects: Vec<Project> = state
        .storage
        .projects()
        .list(scope_for(user))
        .await?
        .into_iter()
        .filter(|p| filter.matches(p))
        .collect();
    let ids: Vec<i64> = projects.iter().map(|p| p.id).collect();
    let phases = state.storage.projects().phases_of(&ids).await?;
    Ok(with_progress(projects, &phases))
}

/// GET /api/portfolio - Totals and per-project summaries.
pub async fn overview(
    BearerAuth(user): BearerAuth,
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<PortfolioFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let projects = load_portfolio(&state, &user, &filter).await?;
    let ids: Vec<i64> = projects.iter().map(|p| p.project.id).collect();

    let kpis = state.storage.kpis().list_for_projects(&ids).await?;
    let risks = state.storage.risks().list_for_projects(&ids).await?;
    let resources = state.storage.resources().list_for_projects(&ids).await?;

    tracing::debug!(user_id = user.id, projects = projects.len(), "portfolio overview");
    Ok(Json(json!(portfolio::overview(
        &projects, &kpis, &risks, &resources
    ))))
}

/// GET /api/portfolio/analytics - Monthly creation counts, budget variance and top risks.
pub async fn analytics(
    BearerAuth(user): BearerAuth,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let projects = state.storage.projects().list(scope_for(&user)).await?;
    let ids: Vec<i64> = projects.iter().map(|p| p.id).collect();
    let risks = state.storage.risks().list_for_projects(&ids).await?;
    Ok(Json(json!(portfolio::analytics(&projects, &risks))))
}

/// GET /api/portfolio/export?format=csv|json
pub async fn export_report(
    BearerAuth(user): BearerAuth,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ExportQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let format = query.format()?;
    let projects = load_portfolio(&state, &user, &PortfolioFilter::default()).await?;
    let body = export::render(format, &export::report_rows(&projects))?;

    tracing::info!(user_id = user.id, %format, rows = projects.len(), "portfolio exported");
    Ok((
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", format.file_name()),
            ),
        ],
        body,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use avanzando_core::project::{PhaseKind, ProjectStatus};
    use avanzando_core::user::Role;
    use chrono::Utc;

    fn project(id: i64) -> Project {
        let now = Utc::now();
        Project {
            id,
            name: format!("Proyecto {id}"),
            description: None,
            cliente_id: 1,
            cliente_nombre: None,
            pm_id: Some(7),
            status: ProjectStatus::default(),
            start_date: now.date_naive(),
            end_date: None,
            estimated_budget: Some(50_000.0),
            actual_budget: 0.0,
            created_at: now,
            updated_at: now,
        }
    }

    fn phase(id: i64, proyecto_id: i64, completed: bool) -> Phase {
        let now = Utc::now();
        Phase {
            id,
            proyecto_id,
            kind: PhaseKind::ALL[0],
            name: format!("Fase {id}"),
            description: None,
            advance: if completed { 100 } else { 0 },
            start_date: None,
            end_date: None,
            completed,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn progress_only_counts_the_projects_own_phases() {
        let phases = vec![
            phase(1, 10, true),
            phase(2, 10, false),
            phase(3, 20, true),
        ];
        let rows = with_progress(vec![project(10), project(20), project(30)], &phases);
        let progress: Vec<f64> = rows.iter().map(|r| r.progress).collect();
        assert_eq!(progress, vec![50.0, 100.0, 0.0]);
    }

    #[test]
    fn export_format_defaults_to_csv_and_rejects_others() {
        assert_eq!(ExportQuery::default().format().unwrap(), ExportFormat::Csv);
        let json = ExportQuery {
            format: Some("json".into()),
        };
        assert_eq!(json.format().unwrap(), ExportFormat::Json);
        let pdf = ExportQuery {
            format: Some("pdf".into()),
        };
        assert!(matches!(pdf.format(), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn only_admins_see_the_whole_portfolio() {
        let now = Utc::now();
        let mut user = User {
            id: 7,
            name: "Ana".into(),
            email: "ana@example.com".into(),
            password_hash: String::new(),
            role: Role::ProjectManager,
            cliente_id: None,
            active: true,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(scope_for(&user), ProjectScope::ManagedBy(7));
        user.role = Role::Administrator;
        assert_eq!(scope_for(&user), ProjectScope::All);
    }
}
