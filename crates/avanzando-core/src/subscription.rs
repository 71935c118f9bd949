//! Subscription plans, their limits and the feature gates derived from them.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

string_enum! {
    pub enum PlanType: "plan_type" {
        Free => "free",
        Pro => "pro",
        Enterprise => "enterprise",
    }
}

string_enum! {
    pub enum SubscriptionStatus: "status" {
        Active => "active",
        Expired => "expired",
        Cancelled => "cancelled",
        Trial => "trial",
    }
}

string_enum! {
    /// Features that can be queried through the check-limit endpoint.
    pub enum Feature: "feature" {
        CreateProject => "create_project",
        AiFeatures => "ai_features",
        AdvancedAnalytics => "advanced_analytics",
    }
}

/// Marker for "no limit" in quota fields.
pub const UNLIMITED: i64 = -1;

pub const TRIAL_DAYS: i64 = 14;

/// Numeric quotas and feature flags of a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanQuotas {
    pub max_projects: i64,
    pub max_users_per_project: i64,
    pub max_kpis_per_project: i64,
    pub max_risks_per_project: i64,
    pub max_resources_per_project: i64,
    pub ai_features: bool,
    pub advanced_analytics: bool,
    pub storage_gb: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanLimits {
    #[serde(flatten)]
    pub quotas: PlanQuotas,
    pub export_formats: Vec<&'static str>,
    pub integrations: Vec<&'static str>,
}

impl PlanLimits {
    #[must_use]
    pub fn for_plan(plan: PlanType) -> Self {
        match plan {
            PlanType::Free => PlanLimits {
                quotas: PlanQuotas {
                    max_projects: 3,
                    max_users_per_project: 5,
                    max_kpis_per_project: 10,
                    max_risks_per_project: 15,
                    max_resources_per_project: 20,
                    ai_features: false,
                    advanced_analytics: false,
                    storage_gb: 1,
                },
                export_formats: vec!["PDF"],
                integrations: vec![],
            },
            PlanType::Pro => PlanLimits {
                quotas: PlanQuotas {
                    max_projects: 25,
                    max_users_per_project: 25,
                    max_kpis_per_project: 50,
                    max_risks_per_project: 100,
                    max_resources_per_project: 200,
                    ai_features: true,
                    advanced_analytics: true,
                    storage_gb: 10,
                },
                export_formats: vec!["PDF", "Excel", "CSV"],
                integrations: vec!["Slack", "Teams", "Email"],
            },
            PlanType::Enterprise => PlanLimits {
                quotas: PlanQuotas {
                    max_projects: UNLIMITED,
                    max_users_per_project: UNLIMITED,
                    max_kpis_per_project: UNLIMITED,
                    max_risks_per_project: UNLIMITED,
                    max_resources_per_project: UNLIMITED,
                    ai_features: true,
                    advanced_analytics: true,
                    storage_gb: 100,
                },
                export_formats: vec!["PDF", "Excel", "CSV", "PowerBI"],
                integrations: vec!["Slack", "Teams", "Email", "Jira", "Trello", "Asana"],
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Subscription {
    pub id: i64,
    pub user_id: i64,
    pub plan_type: PlanType,
    pub status: SubscriptionStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub trial_end_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Columns for a subscription row being created or rewritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionState {
    pub plan_type: PlanType,
    pub status: SubscriptionStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub trial_end_date: Option<DateTime<Utc>>,
}

impl SubscriptionState {
    /// Free plans start active; paid plans start with a 14 day trial.
    #[must_use]
    pub fn initial(plan: PlanType, now: DateTime<Utc>) -> Self {
        let (status, trial_end_date) = match plan {
            PlanType::Free => (SubscriptionStatus::Active, None),
            PlanType::Pro | PlanType::Enterprise => (
                SubscriptionStatus::Trial,
                Some(now + Duration::days(TRIAL_DAYS)),
            ),
        };
        Self {
            plan_type: plan,
            status,
            start_date: now,
            end_date: None,
            trial_end_date,
        }
    }

    /// Paid activation: a month for pro, a year for enterprise.
    /// Returns `None` for the free plan, which cannot be upgraded to.
    #[must_use]
    pub fn upgraded(plan: PlanType, now: DateTime<Utc>) -> Option<Self> {
        let days = match plan {
            PlanType::Free => return None,
            PlanType::Pro => 30,
            PlanType::Enterprise => 365,
        };
        Some(Self {
            plan_type: plan,
            status: SubscriptionStatus::Active,
            start_date: now,
            end_date: Some(now + Duration::days(days)),
            trial_end_date: None,
        })
    }
}

impl Subscription {
    #[must_use]
    pub fn limits(&self) -> PlanLimits {
        PlanLimits::for_plan(self.plan_type)
    }

    /// True when an active subscription ran past its end date and should be
    /// persisted as expired.
    #[must_use]
    pub fn has_lapsed(&self, now: DateTime<Utc>) -> bool {
        self.status == SubscriptionStatus::Active && self.end_date.is_some_and(|end| now > end)
    }

    #[must_use]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        match self.status {
            SubscriptionStatus::Cancelled | SubscriptionStatus::Expired => false,
            SubscriptionStatus::Trial => self.trial_end_date.is_some_and(|end| now <= end),
            SubscriptionStatus::Active => !self.has_lapsed(now),
        }
    }

    #[must_use]
    pub fn can_create_project(&self, current_count: i64, now: DateTime<Utc>) -> bool {
        if !self.is_active_at(now) {
            return false;
        }
        let max = self.limits().quotas.max_projects;
        max == UNLIMITED || current_count < max
    }

    #[must_use]
    pub fn can_use_ai(&self, now: DateTime<Utc>) -> bool {
        self.is_active_at(now) && self.limits().quotas.ai_features
    }

    #[must_use]
    pub fn can_use_advanced_analytics(&self, now: DateTime<Utc>) -> bool {
        self.is_active_at(now) && self.limits().quotas.advanced_analytics
    }

    /// Answers a check-limit query. `project_count` is only consulted for
    /// [`Feature::CreateProject`].
    #[must_use]
    pub fn check(&self, feature: Feature, project_count: i64, now: DateTime<Utc>) -> LimitCheck {
        let (allowed, denial) = match feature {
            Feature::CreateProject => (
                self.can_create_project(project_count, now),
                format!(
                    "Has alcanzado el límite de {} proyectos. Actualiza tu plan para crear más proyectos.",
                    self.limits().quotas.max_projects
                ),
            ),
            Feature::AiFeatures => (
                self.can_use_ai(now),
                "Las funcionalidades de IA están disponibles solo en planes Pro y Enterprise."
                    .to_string(),
            ),
            Feature::AdvancedAnalytics => (
                self.can_use_advanced_analytics(now),
                "Los análisis avanzados están disponibles solo en planes Pro y Enterprise."
                    .to_string(),
            ),
        };
        LimitCheck {
            allowed,
            message: if allowed { String::new() } else { denial },
            current_plan: self.plan_type,
            upgrade_required: !allowed,
        }
    }

    #[must_use]
    pub fn view(&self, now: DateTime<Utc>) -> SubscriptionView<'_> {
        SubscriptionView {
            subscription: self,
            is_active: self.is_active_at(now),
            limits: self.limits(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionView<'a> {
    #[serde(flatten)]
    pub subscription: &'a Subscription,
    pub is_active: bool,
    pub limits: PlanLimits,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LimitCheck {
    pub allowed: bool,
    pub message: String,
    pub current_plan: PlanType,
    pub upgrade_required: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Usage {
    pub current_projects: i64,
    pub can_create_project: bool,
    pub can_use_ai: bool,
    pub can_use_advanced_analytics: bool,
}

impl Usage {
    #[must_use]
    pub fn of(subscription: &Subscription, current_projects: i64, now: DateTime<Utc>) -> Self {
        Self {
            current_projects,
            can_create_project: subscription.can_create_project(current_projects, now),
            can_use_ai: subscription.can_use_ai(now),
            can_use_advanced_analytics: subscription.can_use_advanced_analytics(now),
        }
    }
}

// -------------------------
// Public plan catalog
// -------------------------

#[derive(Debug, Clone, Serialize)]
pub struct PlanOffer {
    pub name: &'static str,
    pub price: u32,
    pub currency: &'static str,
    pub billing: &'static str,
    pub features: Vec<&'static str>,
    pub limits: PlanQuotas,
}

/// Marketing description of every plan, keyed by plan type.
#[must_use]
pub fn plan_catalog() -> BTreeMap<&'static str, PlanOffer> {
    let offer = |plan: PlanType, name: &'static str, price: u32, features: Vec<&'static str>| PlanOffer {
        name,
        price,
        currency: "USD",
        billing: "monthly",
        features,
        limits: PlanLimits::for_plan(plan).quotas,
    };

    BTreeMap::from([
        (
            PlanType::Free.as_str(),
            offer(
                PlanType::Free,
                "Gratuito",
                0,
                vec![
                    "Hasta 3 proyectos",
                    "5 usuarios por proyecto",
                    "10 KPIs por proyecto",
                    "15 riesgos por proyecto",
                    "20 recursos por proyecto",
                    "Exportación PDF",
                    "1 GB de almacenamiento",
                ],
            ),
        ),
        (
            PlanType::Pro.as_str(),
            offer(
                PlanType::Pro,
                "Profesional",
                29,
                vec![
                    "Hasta 25 proyectos",
                    "25 usuarios por proyecto",
                    "50 KPIs por proyecto",
                    "100 riesgos por proyecto",
                    "200 recursos por proyecto",
                    "Funcionalidades de IA",
                    "Análisis avanzados",
                    "Exportación PDF, Excel, CSV",
                    "Integraciones (Slack, Teams)",
                    "10 GB de almacenamiento",
                ],
            ),
        ),
        (
            PlanType::Enterprise.as_str(),
            offer(
                PlanType::Enterprise,
                "Empresarial",
                99,
                vec![
                    "Proyectos ilimitados",
                    "Usuarios ilimitados",
                    "KPIs ilimitados",
                    "Riesgos ilimitados",
                    "Recursos ilimitados",
                    "Funcionalidades de IA avanzadas",
                    "Análisis predictivos",
                    "Todas las exportaciones",
                    "Todas las integraciones",
                    "100 GB de almacenamiento",
                    "Soporte prioritario",
                ],
            ),
        ),
    ])
}
