//! Heuristic prediction engine and the persisted prediction record.
//!
//! The "AI" features are deterministic formulas over project data. Every
//! run is stored with its input and result so the history can be listed.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::kpi::{Kpi, KpiStatus};
use crate::risk::{Risk, RiskLevel};

string_enum! {
    pub enum PredictionType: "prediction_type" {
        ProjectCompletion => "project_completion",
        BudgetOverrun => "budget_overrun",
        RiskProbability => "risk_probability",
        ResourceUtilization => "resource_utilization",
        KpiForecast => "kpi_forecast",
    }
}

string_enum! {
    pub enum PredictionStatus: "status" {
        Pending => "pending",
        Completed => "completed",
        Failed => "failed",
    }
}

pub const BUDGET_CONFIDENCE: f64 = 0.8;
pub const KPI_FORECAST_CONFIDENCE: f64 = 0.75;
pub const RISK_CONFIDENCE: f64 = 0.85;
/// Mitigation effectiveness assumed when none is recorded.
pub const DEFAULT_MITIGATION: f64 = 0.3;
/// Days elapsed assumed when the project has not started yet.
pub const DEFAULT_DAYS_ELAPSED: i64 = 30;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub id: i64,
    pub project_id: i64,
    pub prediction_type: PredictionType,
    pub status: PredictionStatus,
    pub input_data: Value,
    pub prediction_result: Value,
    pub confidence_score: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// A finished engine run ready to be stored as `completed`.
#[derive(Debug, Clone)]
pub struct NewPrediction {
    pub project_id: i64,
    pub prediction_type: PredictionType,
    pub input_data: Value,
    pub prediction_result: Value,
    pub confidence_score: f64,
}

impl NewPrediction {
    /// Serializes input and result of a run.
    pub fn from_run<I: Serialize, R: Serialize>(
        project_id: i64,
        prediction_type: PredictionType,
        input: &I,
        result: &R,
        confidence_score: f64,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            project_id,
            prediction_type,
            input_data: serde_json::to_value(input)?,
            prediction_result: serde_json::to_value(result)?,
            confidence_score,
        })
    }
}

// =============================================================================
// Project completion
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct CompletionInput {
    pub project_id: i64,
    pub progress: f64,
    pub days_elapsed: i64,
    pub total_phases: usize,
    pub completed_phases: usize,
    pub budget_used_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionForecast {
    pub estimated_completion_days: i64,
    pub completion_probability: f64,
    pub risk_factors: Vec<&'static str>,
}

#[must_use]
pub fn completion_probability(progress: f64) -> f64 {
    (0.6 + progress / 100.0 * 0.3).min(0.95)
}

/// Extrapolates the elapsed pace to the full project. Without any progress
/// the remaining time defaults to 90 days.
#[must_use]
pub fn predict_completion(input: &CompletionInput) -> CompletionForecast {
    let remaining = if input.progress > 0.0 {
        let elapsed = input.days_elapsed as f64;
        elapsed / input.progress * 100.0 - elapsed
    } else {
        90.0
    };
    CompletionForecast {
        estimated_completion_days: (remaining.trunc() as i64).max(1),
        completion_probability: completion_probability(input.progress),
        risk_factors: if input.progress < 50.0 {
            vec!["resource_availability", "scope_changes"]
        } else {
            Vec::new()
        },
    }
}

// =============================================================================
// Budget overrun
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct BudgetInput {
    pub project_id: i64,
    pub budget_used_percentage: f64,
    pub progress_percentage: f64,
    pub estimated_budget: f64,
    pub spent_budget: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetForecast {
    pub overrun_probability: f64,
    pub projected_cost_percentage: f64,
    pub recommended_actions: Vec<&'static str>,
}

#[must_use]
pub fn predict_budget_overrun(input: &BudgetInput) -> BudgetForecast {
    let (overrun_probability, projected_cost_percentage) = if input.progress_percentage > 0.0 {
        let burn_rate = input.budget_used_percentage / input.progress_percentage;
        let projected = burn_rate * 100.0;
        (((projected - 100.0) / 50.0).clamp(0.0, 1.0), projected.min(200.0))
    } else {
        (0.3, 100.0)
    };
    BudgetForecast {
        overrun_probability,
        projected_cost_percentage,
        recommended_actions: if overrun_probability > 0.5 {
            vec![
                "Review resource allocation",
                "Optimize processes",
                "Consider scope reduction",
            ]
        } else {
            Vec::new()
        },
    }
}

// =============================================================================
// KPI forecast
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct KpiForecastInput {
    pub kpi_id: i64,
    pub historical_values: Vec<f64>,
    pub target_value: f64,
    pub current_value: f64,
    pub measurement_unit: String,
}

impl KpiForecastInput {
    /// Builds a synthetic history ramping up to the current value.
    #[must_use]
    pub fn for_kpi(kpi: &Kpi) -> Self {
        let current = kpi.current;
        Self {
            kpi_id: kpi.id,
            historical_values: [0.7, 0.8, 0.9, 1.0].iter().map(|f| current * f).collect(),
            target_value: kpi.target,
            current_value: current,
            measurement_unit: kpi.unit.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastPoint {
    pub period: u32,
    pub projected_value: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiForecast {
    pub trend: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trend_strength: Option<f64>,
    pub forecast: Vec<ForecastPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_achievement_probability: Option<f64>,
}

/// Linear projection of the last step over five periods.
///
/// A zero target counts as achieved once the current value reaches it.
#[must_use]
pub fn forecast_kpi(input: &KpiForecastInput) -> KpiForecast {
    let [.., previous, current] = *input.historical_values.as_slice() else {
        return KpiForecast {
            trend: "insufficient_data",
            trend_strength: None,
            forecast: Vec::new(),
            target_achievement_probability: None,
        };
    };
    let step = current - previous;
    let forecast = (1..=5u32)
        .map(|i| ForecastPoint {
            period: i,
            projected_value: (current + step * f64::from(i)).max(0.0),
            confidence: (0.9 - f64::from(i) * 0.1).max(0.3),
        })
        .collect();
    let trend = if step > 0.0 {
        "increasing"
    } else if step < 0.0 {
        "decreasing"
    } else {
        "stable"
    };
    let target = input.target_value;
    let achievement = if target == 0.0 {
        if current >= target { 1.0 } else { 0.0 }
    } else {
        (0.5 + (current - target) / target).clamp(0.0, 1.0)
    };

    KpiForecast {
        trend,
        trend_strength: Some(step.abs() / current.abs().max(1.0)),
        forecast,
        target_achievement_probability: Some(achievement),
    }
}

// =============================================================================
// Risk impact
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct RiskImpactInput {
    pub risk_id: i64,
    pub probability: f64,
    pub impact: f64,
    pub mitigation_effectiveness: f64,
    pub current_status: String,
}

impl RiskImpactInput {
    /// Normalizes the 1..=5 scales to 0..=1.
    #[must_use]
    pub fn for_risk(risk: &Risk) -> Self {
        Self {
            risk_id: risk.id,
            probability: f64::from(risk.probability.value()) / 5.0,
            impact: f64::from(risk.impact.value()) / 5.0,
            mitigation_effectiveness: DEFAULT_MITIGATION,
            current_status: risk.status.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskImpactAssessment {
    pub adjusted_probability: f64,
    pub risk_score: f64,
    pub priority_level: &'static str,
    pub mitigation_recommendations: Vec<&'static str>,
}

#[must_use]
pub fn assess_risk_impact(input: &RiskImpactInput) -> RiskImpactAssessment {
    let adjusted_probability = input.probability * (1.0 - input.mitigation_effectiveness);
    let risk_score = adjusted_probability * input.impact;
    let priority_level = if risk_score > 0.7 {
        "high"
    } else if risk_score > 0.4 {
        "medium"
    } else {
        "low"
    };
    RiskImpactAssessment {
        adjusted_probability,
        risk_score,
        priority_level,
        mitigation_recommendations: if risk_score > 0.6 {
            vec![
                "Increase monitoring frequency",
                "Develop contingency plan",
                "Assign dedicated owner",
            ]
        } else {
            Vec::new()
        },
    }
}

// =============================================================================
// Project insights
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Milestone {
    pub name: String,
    pub estimated_date: DateTime<Utc>,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectInsights {
    pub project_health: &'static str,
    pub completion_likelihood: f64,
    pub budget_status: &'static str,
    pub key_risks: usize,
    pub kpi_performance: &'static str,
    pub recommendations: Vec<&'static str>,
    pub next_milestones: Vec<Milestone>,
}

/// Budget health from spend against progress: spending past the estimate
/// is `over_budget`, spending more than 10 points ahead of progress is
/// `at_risk`.
#[must_use]
pub fn budget_status(budget_used_percentage: f64, progress: f64) -> &'static str {
    if budget_used_percentage > 100.0 {
        "over_budget"
    } else if budget_used_percentage > progress + 10.0 {
        "at_risk"
    } else {
        "on_track"
    }
}

/// Rates the share of green KPIs. Projects without KPIs rate `mixed`.
#[must_use]
pub fn kpi_performance(kpis: &[Kpi]) -> &'static str {
    if kpis.is_empty() {
        return "mixed";
    }
    let green = kpis.iter().filter(|k| k.status == KpiStatus::Green).count();
    let share = green as f64 / kpis.len() as f64 * 100.0;
    match share {
        s if s >= 80.0 => "excellent",
        s if s >= 60.0 => "good",
        s if s >= 40.0 => "mixed",
        _ => "poor",
    }
}

/// Summarizes project health from its progress, budget, KPIs and active risks.
#[must_use]
pub fn project_insights(
    progress: f64,
    budget_used_percentage: f64,
    kpis: &[Kpi],
    risks: &[Risk],
    now: DateTime<Utc>,
) -> ProjectInsights {
    let budget = budget_status(budget_used_percentage, progress);
    let performance = kpi_performance(kpis);
    let key_risks = risks.iter().filter(|r| r.exposure() >= 15).count();
    let has_critical = risks.iter().any(|r| r.level() == RiskLevel::Critico);

    let project_health = if budget == "over_budget" || has_critical || performance == "poor" {
        "critical"
    } else if budget == "at_risk" || key_risks > 0 || performance == "mixed" {
        "warning"
    } else {
        "good"
    };

    let mut recommendations = Vec::new();
    if key_risks > 0 {
        recommendations.push("Monitorear de cerca los riesgos de alta exposición");
    }
    if progress < 50.0 {
        recommendations.push("Revisar el progreso de las fases críticas");
    }
    if budget != "on_track" {
        recommendations.push("Considerar reasignación de recursos si es necesario");
    }
    if matches!(performance, "mixed" | "poor") && !kpis.is_empty() {
        recommendations.push("Revisar los KPIs fuera de meta con el equipo");
    }
    if recommendations.is_empty() {
        recommendations.push("Mantener el ritmo actual y el seguimiento semanal");
    }

    ProjectInsights {
        project_health,
        completion_likelihood: completion_probability(progress),
        budget_status: budget,
        key_risks,
        kpi_performance: performance,
        recommendations,
        next_milestones: vec![Milestone {
            name: "Revisión de medio término".to_string(),
            estimated_date: now + Duration::days(15),
            confidence: 0.8,
        }],
    }
}
