//! Stored prediction runs.

use avanzando_core::prediction::{NewPrediction, Prediction, PredictionStatus};
use sqlx_core::query::query;
use sqlx_core::row::Row;
use sqlx_postgres::PgRow;

use crate::rows::text_enum;
use crate::{PgPool, StorageResult, reference_error};

const COLUMNS: &str = "id, project_id, prediction_type, status, input_data, prediction_result, \
    confidence_score, created_at, completed_at";

fn row_to_prediction(row: &PgRow) -> StorageResult<Prediction> {
    Ok(Prediction {
        id: row.try_get("id")?,
        project_id: row.try_get("project_id")?,
        prediction_type: text_enum(row, "prediction_type")?,
        status: text_enum(row, "status")?,
        input_data: row.try_get("input_data")?,
        prediction_result: row.try_get("prediction_result")?,
        confidence_score: row.try_get("confidence_score")?,
        created_at: row.try_get("created_at")?,
        completed_at: row.try_get("completed_at")?,
    })
}

pub struct PredictionStorage<'a> {
    pool: &'a PgPool,
}

impl<'a> PredictionStorage<'a> {
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Stores a finished run as `completed`, stamped now.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Conflict`](crate::StorageError::Conflict) if
    /// the project no longer exists.
    pub async fn record(&self, prediction: &NewPrediction) -> StorageResult<Prediction> {
        let row = query(&format!(
            "INSERT INTO ai_predictions (project_id, prediction_type, status, input_data, \
                prediction_result, confidence_score, completed_at) \
             VALUES ($1, $2, $3, $4, $5, $6, NOW()) RETURNING {COLUMNS}"
        ))
        .bind(prediction.project_id)
        .bind(prediction.prediction_type.as_str())
        .bind(PredictionStatus::Completed.as_str())
        .bind(&prediction.input_data)
        .bind(&prediction.prediction_result)
        .bind(prediction.confidence_score)
        .fetch_one(self.pool)
        .await
        .map_err(|e| reference_error(e, "Proyecto no encontrado"))?;
        row_to_prediction(&row)
    }

    /// Predictions of a project, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_for_project(&self, project_id: i64) -> StorageResult<Vec<Prediction>> {
        let rows = query(&format!(
            "SELECT {COLUMNS} FROM ai_predictions WHERE project_id = $1 \
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(project_id)
        .fetch_all(self.pool)
        .await?;
        rows.iter().map(row_to_prediction).collect()
    }
}
