//! REST API routes.
//!
//! One module per resource, each exposing a `router()` with full paths:
//! - `auth` - registration, login and profile
//! - `users`, `clients` - account and tenant administration
//! - `projects` - projects, phases and phase advances
//! - `kpis`, `risks`, `resources` - project indicators and their dashboards
//! - `documents` - documents, uploads and templates
//! - `subscriptions` - plans, limits and upgrades
//! - `ai` - heuristic predictions and insights
//! - `portfolio` - cross-project aggregation and export
//! - `settlements` - cost settlements with expenses and logged hours

use avanzando_api::ApiError;
use avanzando_auth::hash_password;
use avanzando_core::project::Project;
use avanzando_core::subscription::{Feature, Subscription};
use avanzando_core::user::{Role, User};
use axum::Router;
use chrono::Utc;

use crate::server::AppState;

pub mod ai;
pub mod auth;
pub mod clients;
pub mod documents;
pub mod kpis;
pub mod portfolio;
pub mod projects;
pub mod resources;
pub mod risks;
pub mod settlements;
pub mod subscriptions;
pub mod users;

pub const PROJECT_NOT_FOUND: &str = "Proyecto no encontrado";

pub fn api_router() -> Router<AppState> {
    Router::new()
        .merge(auth::router())
        .merge(users::router())
        .merge(clients::router())
        .merge(projects::router())
        .merge(kpis::router())
        .merge(risks::router())
        .merge(resources::router())
        .merge(documents::router())
        .merge(subscriptions::router())
        .merge(ai::router())
        .merge(portfolio::router())
        .merge(settlements::router())
}

// -------------------------
// Shared lookups
// -------------------------

/// Loads a project or fails with 404.
pub(crate) async fn require_project(state: &AppState, id: i64) -> Result<Project, ApiError> {
    state
        .storage
        .projects()
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found(PROJECT_NOT_FOUND))
}

/// Clients may only read projects of their own organisation.
pub(crate) fn ensure_visible(user: &User, project: &Project) -> Result<(), ApiError> {
    if user.role == Role::Client && user.cliente_id != Some(project.cliente_id) {
        return Err(ApiError::forbidden("No tiene permisos para ver este proyecto"));
    }
    Ok(())
}

/// The project's PM or an administrator.
pub(crate) fn ensure_manages(user: &User, project: &Project) -> Result<(), ApiError> {
    if user.role.is_admin() || project.pm_id == Some(user.id) {
        return Ok(());
    }
    Err(ApiError::forbidden("Acceso denegado a este proyecto"))
}

/// Refuses with the plan-gate body when `feature` is not available to the
/// user's current subscription.
pub(crate) async fn require_feature(
    state: &AppState,
    user: &User,
    feature: Feature,
) -> Result<Subscription, ApiError> {
    let now = Utc::now();
    let subscription = state.storage.subscriptions().current(user.id, now).await?;
    let count = match feature {
        Feature::CreateProject => state.storage.projects().count_managed_by(user.id).await?,
        Feature::AiFeatures | Feature::AdvancedAnalytics => 0,
    };
    let check = subscription.check(feature, count, now);
    if !check.allowed {
        tracing::debug!(user_id = user.id, %feature, plan = %check.current_plan, "plan gate refused");
        return Err(ApiError::upgrade_required(
            check.message,
            check.current_plan.as_str(),
        ));
    }
    Ok(subscription)
}

/// Argon2 hashing on the blocking pool.
pub(crate) async fn hash_off_runtime(password: String) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ApiError::internal(format!("password hashing task failed: {e}")))?
        .map_err(|e| ApiError::internal(format!("password hashing failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    fn user(id: i64, role: Role, cliente_id: Option<i64>) -> User {
        let now = Utc::now();
        User {
            id,
            name: "Ana".into(),
            email: "ana@example.com".into(),
            password_hash: String::new(),
            role,
            cliente_id,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn project(cliente_id: i64, pm_id: Option<i64>) -> Project {
        let now = Utc::now();
        Project {
            id: 1,
            name: "Obra".into(),
            description: None,
            cliente_id,
            cliente_nombre: None,
            pm_id,
            status: Default::default(),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: None,
            estimated_budget: None,
            actual_budget: 0.0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn clients_only_see_their_organisation() {
        let p = project(7, None);
        assert!(ensure_visible(&user(1, Role::Client, Some(7)), &p).is_ok());
        let err = ensure_visible(&user(1, Role::Client, Some(8)), &p).unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
        assert!(ensure_visible(&user(1, Role::Client, None), &p).is_err());
        assert!(ensure_visible(&user(1, Role::ProjectManager, None), &p).is_ok());
    }

    #[test]
    fn only_owner_pm_or_admin_manages() {
        let p = project(7, Some(3));
        assert!(ensure_manages(&user(3, Role::ProjectManager, None), &p).is_ok());
        assert!(ensure_manages(&user(4, Role::ProjectManager, None), &p).is_err());
        assert!(ensure_manages(&user(9, Role::Administrator, None), &p).is_ok());
    }

    #[tokio::test]
    async fn hashes_on_the_blocking_pool() {
        let hash = hash_off_runtime("secreto123".to_string()).await.unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(avanzando_auth::verify_password("secreto123", &hash).unwrap());
    }
}
