//! Portfolio report export as CSV or JSON.

use serde::Serialize;

use crate::portfolio::PortfolioProject;
use crate::{CoreError, CoreResult};

string_enum! {
    pub enum ExportFormat: "format" {
        Csv => "csv",
        Json => "json",
    }
}

impl ExportFormat {
    #[must_use]
    pub const fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv; charset=utf-8",
            ExportFormat::Json => "application/json",
        }
    }

    #[must_use]
    pub fn file_name(&self) -> String {
        format!("portfolio-report.{}", self.as_str())
    }
}

const HEADER: [&str; 8] = [
    "id",
    "nombre",
    "estado",
    "cliente",
    "presupuesto_estimado",
    "presupuesto_real",
    "varianza",
    "progreso",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow<'a> {
    pub id: i64,
    pub nombre: &'a str,
    pub estado: &'static str,
    pub cliente: &'a str,
    pub presupuesto_estimado: f64,
    pub presupuesto_real: f64,
    pub varianza: f64,
    pub progreso: f64,
}

#[must_use]
pub fn report_rows(projects: &[PortfolioProject]) -> Vec<ReportRow<'_>> {
    projects
        .iter()
        .map(|p| ReportRow {
            id: p.project.id,
            nombre: &p.project.name,
            estado: p.project.status.as_str(),
            cliente: p.project.cliente_nombre.as_deref().unwrap_or("N/A"),
            presupuesto_estimado: p.project.estimated_budget.unwrap_or(0.0),
            presupuesto_real: p.project.actual_budget,
            varianza: p.project.budget_variance(),
            progreso: p.progress,
        })
        .collect()
}

/// Encodes the rows; CSV output starts with a header record.
pub fn render(format: ExportFormat, rows: &[ReportRow<'_>]) -> CoreResult<Vec<u8>> {
    match format {
        ExportFormat::Csv => to_csv(rows),
        ExportFormat::Json => {
            serde_json::to_vec_pretty(rows).map_err(|e| CoreError::Export(e.to_string()))
        }
    }
}

fn to_csv(rows: &[ReportRow<'_>]) -> CoreResult<Vec<u8>> {
    let export_err = |e: csv::Error| CoreError::Export(e.to_string());
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(HEADER).map_err(export_err)?;
    for row in rows {
        writer
            .write_record([
                row.id.to_string(),
                row.nombre.to_string(),
                row.estado.to_string(),
                row.cliente.to_string(),
                format!("{:.2}", row.presupuesto_estimado),
                format!("{:.2}", row.presupuesto_real),
                format!("{:.2}", row.varianza),
                format!("{:.1}", row.progreso),
            ])
            .map_err(export_err)?;
    }
    writer
        .into_inner()
        .map_err(|e| CoreError::Export(e.error().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::fixtures::project;

    fn sample() -> Vec<PortfolioProject> {
        let mut a = project(1, "Portal, clientes");
        a.estimated_budget = Some(1000.0);
        a.actual_budget = 1100.0;
        let mut b = project(2, "Intranet");
        b.cliente_nombre = None;
        vec![
            PortfolioProject { project: a, progress: 40.0 },
            PortfolioProject { project: b, progress: 0.0 },
        ]
    }

    #[test]
    fn parses_supported_formats_only() {
        assert_eq!("csv".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert_eq!("json".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert!("xlsx".parse::<ExportFormat>().is_err());
        assert_eq!(ExportFormat::Csv.file_name(), "portfolio-report.csv");
    }

    #[test]
    fn csv_has_header_and_quotes_commas() {
        let projects = sample();
        let bytes = render(ExportFormat::Csv, &report_rows(&projects)).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "id,nombre,estado,cliente,presupuesto_estimado,presupuesto_real,varianza,progreso"
        );
        assert_eq!(lines[1], "1,\"Portal, clientes\",activo,Acme,1000.00,1100.00,10.00,40.0");
        assert_eq!(lines[2], "2,Intranet,activo,N/A,0.00,0.00,0.00,0.0");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn json_is_an_array_of_rows() {
        let projects = sample();
        let bytes = render(ExportFormat::Json, &report_rows(&projects)).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value.as_array().map(Vec::len), Some(2));
        assert_eq!(value[0]["cliente"], "Acme");
        assert_eq!(value[1]["cliente"], "N/A");
    }
}
