use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, ToSchema, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(50))")]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    #[sea_orm(string_value = "processing")]
    Processing,
    #[sea_orm(string_value = "success")]
    Success,
    #[sea_orm(string_value = "failed")]
    Failed,
}

/// One upload of a study export and its form, with the outcome of the
/// conversion
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "form_submissions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub relay_location: Option<String>,
    pub line_number: Option<String>,
    pub remote_location: Option<String>,
    pub nominal_system_voltage: Option<String>,
    pub breaker_rating: Option<String>,
    pub conductor_rating: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub form_data_json: Option<String>,
    pub csv_file_name: Option<String>,
    pub uploaded_at: DateTime<Utc>,
    pub generated_file_name: Option<String>,
    pub status: SubmissionStatus,
    #[sea_orm(column_type = "Text", nullable)]
    pub error_message: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// API view of a stored submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FormSubmission {
    pub id: Uuid,
    pub relay_location: Option<String>,
    pub line_number: Option<String>,
    pub remote_location: Option<String>,
    pub nominal_system_voltage: Option<String>,
    pub breaker_rating: Option<String>,
    pub conductor_rating: Option<String>,
    /// The submitted form exactly as received
    #[schema(value_type = Option<Object>)]
    pub form_data: Option<serde_json::Value>,
    pub csv_file_name: Option<String>,
    pub uploaded_at: DateTime<Utc>,
    pub generated_file_name: Option<String>,
    pub status: SubmissionStatus,
    pub error_message: Option<String>,
}

impl From<Model> for FormSubmission {
    fn from(model: Model) -> Self {
        let form_data = model
            .form_data_json
            .as_deref()
            .and_then(|json| serde_json::from_str(json).ok());
        Self {
            id: model.id,
            relay_location: model.relay_location,
            line_number: model.line_number,
            remote_location: model.remote_location,
            nominal_system_voltage: model.nominal_system_voltage,
            breaker_rating: model.breaker_rating,
            conductor_rating: model.conductor_rating,
            form_data,
            csv_file_name: model.csv_file_name,
            uploaded_at: model.uploaded_at,
            generated_file_name: model.generated_file_name,
            status: model.status,
            error_message: model.error_message,
        }
    }
}

/// Filters for listing recent submissions
#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SubmissionFilter {
    /// Case-insensitive substring of the relay location
    pub relay_location: Option<String>,
    /// Case-insensitive substring of the line number
    pub line_number: Option<String>,
    pub status: Option<SubmissionStatus>,
    /// Maximum number of rows, most recent first (default 10)
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PurgeParams {
    /// Delete submissions uploaded strictly before this instant (RFC 3339)
    pub before: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SubmissionStats {
    pub total: u64,
    pub processing: u64,
    pub success: u64,
    pub failed: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PurgeResult {
    pub deleted: u64,
}
