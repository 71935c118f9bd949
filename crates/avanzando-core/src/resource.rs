//! Project resources and allocation tracking.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;

string_enum! {
    pub enum ResourceKind: "tipo" {
        Human => "humano",
        Material => "material",
        Technological => "tecnologico",
        Financial => "financiero",
    }
}

string_enum! {
    pub enum ResourceStatus: "estado" {
        Available => "disponible",
        Assigned => "asignado",
        Busy => "ocupado",
        Unavailable => "no_disponible",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resource {
    pub id: i64,
    pub proyecto_id: i64,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "descripcion")]
    pub description: String,
    #[serde(rename = "tipo")]
    pub kind: ResourceKind,
    #[serde(rename = "estado")]
    pub status: ResourceStatus,
    #[serde(rename = "cantidad_requerida")]
    pub required: f64,
    #[serde(rename = "cantidad_asignada")]
    pub assigned: f64,
    #[serde(rename = "unidad_medida")]
    pub unit: String,
    #[serde(rename = "costo_unitario")]
    pub unit_cost: f64,
    #[serde(rename = "costo_total")]
    pub total_cost: f64,
    #[serde(rename = "fecha_inicio")]
    pub start: Option<NaiveDateTime>,
    #[serde(rename = "fecha_fin")]
    pub end: Option<NaiveDateTime>,
    pub usuario_asignado_id: Option<i64>,
    pub usuario_asignado_nombre: Option<String>,
    #[serde(rename = "observaciones")]
    pub notes: String,
    #[serde(rename = "activo")]
    pub active: bool,
    #[serde(rename = "fecha_creacion")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "fecha_actualizacion")]
    pub updated_at: DateTime<Utc>,
}

impl Resource {
    #[must_use]
    pub fn allocation_percentage(&self) -> f64 {
        allocation_percentage(self.assigned, self.required)
    }

    #[must_use]
    pub fn utilization_days(&self) -> i64 {
        utilization_days(self.start, self.end)
    }

    /// Recomputes the stored derived columns after quantities changed.
    pub fn refresh_derived(&mut self) {
        self.total_cost = total_cost(self.assigned, self.unit_cost);
        self.status = status_for(self.assigned, self.required);
    }

    #[must_use]
    pub fn view(&self) -> ResourceView<'_> {
        ResourceView {
            resource: self,
            allocation: self.allocation_percentage(),
            utilization_days: self.utilization_days(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResourceView<'a> {
    #[serde(flatten)]
    pub resource: &'a Resource,
    #[serde(rename = "porcentaje_asignacion")]
    pub allocation: f64,
    #[serde(rename = "dias_utilizacion")]
    pub utilization_days: i64,
}

#[must_use]
pub fn total_cost(assigned: f64, unit_cost: f64) -> f64 {
    assigned * unit_cost
}

#[must_use]
pub fn allocation_percentage(assigned: f64, required: f64) -> f64 {
    if required == 0.0 {
        0.0
    } else {
        (assigned / required * 100.0).min(100.0)
    }
}

/// Status follows allocation: none, partial, full.
#[must_use]
pub fn status_for(assigned: f64, required: f64) -> ResourceStatus {
    let percentage = allocation_percentage(assigned, required);
    if percentage == 0.0 {
        ResourceStatus::Available
    } else if percentage < 100.0 {
        ResourceStatus::Assigned
    } else {
        ResourceStatus::Busy
    }
}

/// Inclusive day count between both dates; 0 when either is missing.
#[must_use]
pub fn utilization_days(start: Option<NaiveDateTime>, end: Option<NaiveDateTime>) -> i64 {
    match (start, end) {
        (Some(start), Some(end)) => (end - start).num_days() + 1,
        _ => 0,
    }
}

#[derive(Debug, Clone)]
pub struct NewResource {
    pub proyecto_id: i64,
    pub name: String,
    pub description: String,
    pub kind: ResourceKind,
    pub required: f64,
    pub assigned: f64,
    pub unit: String,
    pub unit_cost: f64,
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    pub usuario_asignado_id: Option<i64>,
    pub notes: String,
}

impl NewResource {
    #[must_use]
    pub fn total_cost(&self) -> f64 {
        total_cost(self.assigned, self.unit_cost)
    }

    #[must_use]
    pub fn status(&self) -> ResourceStatus {
        status_for(self.assigned, self.required)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResourceChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub kind: Option<ResourceKind>,
    pub required: Option<f64>,
    pub assigned: Option<f64>,
    pub unit: Option<String>,
    pub unit_cost: Option<f64>,
    pub start: Option<Option<NaiveDateTime>>,
    pub end: Option<Option<NaiveDateTime>>,
    pub usuario_asignado_id: Option<Option<i64>>,
    pub notes: Option<String>,
}

impl ResourceChanges {
    pub fn apply(self, resource: &mut Resource) {
        if let Some(name) = self.name {
            resource.name = name;
        }
        if let Some(description) = self.description {
            resource.description = description;
        }
        if let Some(kind) = self.kind {
            resource.kind = kind;
        }
        if let Some(required) = self.required {
            resource.required = required;
        }
        if let Some(assigned) = self.assigned {
            resource.assigned = assigned;
        }
        if let Some(unit) = self.unit {
            resource.unit = unit;
        }
        if let Some(unit_cost) = self.unit_cost {
            resource.unit_cost = unit_cost;
        }
        if let Some(start) = self.start {
            resource.start = start;
        }
        if let Some(end) = self.end {
            resource.end = end;
        }
        if let Some(user) = self.usuario_asignado_id {
            resource.usuario_asignado_id = user;
        }
        if let Some(notes) = self.notes {
            resource.notes = notes;
        }
        resource.refresh_derived();
    }
}

// -------------------------
// Dashboard
// -------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ResourceSummary {
    pub total_recursos: usize,
    pub costo_total: f64,
    pub utilizacion_promedio: f64,
    pub recursos_criticos: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResourceDashboard<'a> {
    pub resumen: ResourceSummary,
    pub recursos_por_tipo: BTreeMap<&'static str, usize>,
    pub costo_por_tipo: BTreeMap<&'static str, f64>,
    pub recursos_por_estado: BTreeMap<&'static str, usize>,
    pub recursos_criticos: Vec<ResourceView<'a>>,
}

/// Resources under half allocated are critical; the first five are listed.
#[must_use]
pub fn dashboard(resources: &[Resource]) -> ResourceDashboard<'_> {
    let critical: Vec<&Resource> = resources
        .iter()
        .filter(|r| r.allocation_percentage() < 50.0)
        .collect();
    let average = if resources.is_empty() {
        0.0
    } else {
        resources.iter().map(Resource::allocation_percentage).sum::<f64>() / resources.len() as f64
    };

    let mut recursos_por_tipo: BTreeMap<&'static str, usize> = BTreeMap::new();
    let mut costo_por_tipo: BTreeMap<&'static str, f64> = BTreeMap::new();
    for kind in ResourceKind::ALL {
        let of_kind = resources.iter().filter(|r| r.kind == *kind);
        recursos_por_tipo.insert(kind.as_str(), of_kind.clone().count());
        costo_por_tipo.insert(kind.as_str(), of_kind.map(|r| r.total_cost).sum());
    }
    let recursos_por_estado = ResourceStatus::ALL
        .iter()
        .map(|status| {
            (
                status.as_str(),
                resources.iter().filter(|r| r.status == *status).count(),
            )
        })
        .collect();

    ResourceDashboard {
        resumen: ResourceSummary {
            total_recursos: resources.len(),
            costo_total: resources.iter().map(|r| r.total_cost).sum(),
            utilizacion_promedio: average,
            recursos_criticos: critical.len(),
        },
        recursos_por_tipo,
        costo_por_tipo,
        recursos_por_estado,
        recursos_criticos: critical.into_iter().take(5).map(Resource::view).collect(),
    }
}

/// One bar of the allocation chart.
#[derive(Debug, Clone, Serialize)]
pub struct AllocationRow<'a> {
    pub nombre: &'a str,
    pub tipo: ResourceKind,
    pub requerido: f64,
    pub asignado: f64,
    pub porcentaje: f64,
    pub estado: ResourceStatus,
}

#[must_use]
pub fn allocation_rows(resources: &[Resource]) -> Vec<AllocationRow<'_>> {
    resources
        .iter()
        .map(|r| AllocationRow {
            nombre: &r.name,
            tipo: r.kind,
            requerido: r.required,
            asignado: r.assigned,
            porcentaje: r.allocation_percentage(),
            estado: r.status,
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn resource(id: i64, kind: ResourceKind, required: f64, assigned: f64) -> Resource {
        let now = Utc::now();
        let mut resource = Resource {
            id,
            proyecto_id: 1,
            name: format!("Recurso {id}"),
            description: String::new(),
            kind,
            status: ResourceStatus::Available,
            required,
            assigned,
            unit: "horas".into(),
            unit_cost: 10.0,
            total_cost: 0.0,
            start: None,
            end: None,
            usuario_asignado_id: None,
            usuario_asignado_nombre: None,
            notes: String::new(),
            active: true,
            created_at: now,
            updated_at: now,
        };
        resource.refresh_derived();
        resource
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::resource;
    use super::*;
    use crate::dates::parse_date_time;

    #[test]
    fn allocation_and_status() {
        assert_eq!(allocation_percentage(5.0, 0.0), 0.0);
        assert_eq!(allocation_percentage(5.0, 10.0), 50.0);
        assert_eq!(allocation_percentage(15.0, 10.0), 100.0);

        assert_eq!(status_for(0.0, 10.0), ResourceStatus::Available);
        assert_eq!(status_for(3.0, 10.0), ResourceStatus::Assigned);
        assert_eq!(status_for(10.0, 10.0), ResourceStatus::Busy);
        // nothing required means nothing allocated
        assert_eq!(status_for(4.0, 0.0), ResourceStatus::Available);
    }

    #[test]
    fn utilization_days_are_inclusive() {
        let start = parse_date_time("2024-01-01").ok();
        let end = parse_date_time("2024-01-10").ok();
        assert_eq!(utilization_days(start, end), 10);
        assert_eq!(utilization_days(start, None), 0);
        assert_eq!(utilization_days(None, end), 0);
    }

    #[test]
    fn changes_recompute_cost_and_status() {
        let mut r = resource(1, ResourceKind::Human, 10.0, 0.0);
        assert_eq!(r.status, ResourceStatus::Available);
        ResourceChanges {
            assigned: Some(10.0),
            unit_cost: Some(25.0),
            ..Default::default()
        }
        .apply(&mut r);
        assert_eq!(r.total_cost, 250.0);
        assert_eq!(r.status, ResourceStatus::Busy);
    }

    #[test]
    fn view_serializes_derived_fields() {
        let mut r = resource(2, ResourceKind::Material, 4.0, 1.0);
        r.start = parse_date_time("2024-03-01").ok();
        r.end = parse_date_time("2024-03-03").ok();
        let json = serde_json::to_value(r.view()).unwrap();
        assert_eq!(json["porcentaje_asignacion"], 25.0);
        assert_eq!(json["dias_utilizacion"], 3);
        assert_eq!(json["estado"], "asignado");
        assert_eq!(json["fecha_inicio"], "2024-03-01T00:00:00");
    }

    #[test]
    fn dashboard_totals() {
        let resources = vec![
            resource(1, ResourceKind::Human, 10.0, 10.0),
            resource(2, ResourceKind::Human, 10.0, 2.0),
            resource(3, ResourceKind::Financial, 10.0, 0.0),
        ];
        let dash = dashboard(&resources);
        assert_eq!(dash.resumen.total_recursos, 3);
        assert_eq!(dash.resumen.costo_total, 120.0);
        assert_eq!(dash.resumen.utilizacion_promedio, 40.0);
        assert_eq!(dash.resumen.recursos_criticos, 2);
        assert_eq!(dash.recursos_por_tipo["humano"], 2);
        assert_eq!(dash.costo_por_tipo["humano"], 120.0);
        assert_eq!(dash.recursos_por_estado["ocupado"], 1);
        assert_eq!(dash.recursos_por_estado["no_disponible"], 0);

        let rows = allocation_rows(&resources);
        assert_eq!(rows[1].porcentaje, 20.0);
        assert_eq!(rows[1].estado, ResourceStatus::Assigned);
    }
}
