use super::models::{FormSubmission, PurgeParams, PurgeResult, SubmissionFilter, SubmissionStats};
use super::services;
use crate::common::errors::{BusinessError, BusinessResult, DbErrorExt};
use crate::common::state::AppState;
use crate::conversion::{ConversionOutput, FormFields, convert};
use crate::{not_found, validation_error};
use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::{HeaderName, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use utoipa_axum::{router::OpenApiRouter, routes};
use uuid::Uuid;

pub const GENERATED_FILE_NAME: &str = "Updated_Line_Protection_Calculation_Sheet.xlsm";
pub const XLSM_CONTENT_TYPE: &str = "application/vnd.ms-excel.sheet.macroEnabled.12";
pub const WARNINGS_HEADER: &str = "x-conversion-warnings";
pub const SUBMISSION_HEADER: &str = "x-submission-id";

const FORM_DATA_FIELD: &str = "formData";
const CSV_FILE_FIELD: &str = "csvFile";

pub fn router(state: &AppState) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(upload))
        .routes(routes!(list_submissions, purge_submissions))
        .routes(routes!(submission_stats))
        .routes(routes!(get_submission))
        .with_state(state.clone())
}

/// Parts of the upload form
struct UploadRequest {
    form_json: String,
    csv_file_name: Option<String>,
    csv_bytes: Vec<u8>,
}

async fn read_upload(mut multipart: Multipart) -> BusinessResult<UploadRequest> {
    let mut form_json = None;
    let mut csv = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| validation_error!("multipart", e.body_text()))?
    {
        match field.name() {
            Some(FORM_DATA_FIELD) => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| validation_error!(FORM_DATA_FIELD, e.body_text()))?;
                form_json = Some(text);
            }
            Some(CSV_FILE_FIELD) => {
                let file_name = field.file_name().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| validation_error!(CSV_FILE_FIELD, e.body_text()))?;
                csv = Some((file_name, bytes.to_vec()));
            }
            other => tracing::debug!("Ignoring multipart field {other:?}"),
        }
    }

    let form_json = form_json.ok_or_else(|| validation_error!(FORM_DATA_FIELD, "is required"))?;
    let (csv_file_name, csv_bytes) =
        csv.ok_or_else(|| validation_error!(CSV_FILE_FIELD, "is required"))?;

    Ok(UploadRequest {
        form_json,
        csv_file_name,
        csv_bytes,
    })
}

/// Load the template and run the conversion on the blocking pool
async fn run_conversion(
    state: &AppState,
    form: FormFields,
    csv_bytes: Vec<u8>,
) -> BusinessResult<ConversionOutput> {
    let template_path = &state.config.template_path;
    let template = tokio::fs::read(template_path).await.map_err(|e| {
        BusinessError::InternalError {
            message: format!("template workbook '{template_path}' is not available: {e}"),
        }
    })?;

    let output = tokio::task::spawn_blocking(move || convert(&csv_bytes, &form, &template))
        .await
        .map_err(|e| BusinessError::InternalError {
            message: format!("conversion task failed: {e}"),
        })??;
    Ok(output)
}

fn workbook_response(output: ConversionOutput, submission_id: Option<Uuid>) -> Response {
    let warnings = output.report.warnings.len();
    let mut response = (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(XLSM_CONTENT_TYPE)),
            (
                header::CONTENT_DISPOSITION,
                HeaderValue::from_static(
                    "attachment; filename=\"Updated_Line_Protection_Calculation_Sheet.xlsm\"",
                ),
            ),
        ],
        output.workbook,
    )
        .into_response();

    let headers = response.headers_mut();
    headers.insert(
        HeaderName::from_static(WARNINGS_HEADER),
        HeaderValue::from(warnings),
    );
    if let Some(id) = submission_id {
        if let Ok(value) = HeaderValue::from_str(&id.to_string()) {
            headers.insert(HeaderName::from_static(SUBMISSION_HEADER), value);
        }
    }
    response
}

#[utoipa::path(
    post,
    path = "/upload",
    request_body(
        content_type = "multipart/form-data",
        description = "`formData`: JSON object of form fields; `csvFile`: relay study CSV export",
    ),
    responses(
        (
            status = 200,
            description = "Populated calculation sheet",
            content_type = "application/vnd.ms-excel.sheet.macroEnabled.12",
            body = Vec<u8>,
            headers(
                ("x-conversion-warnings" = usize, description = "Number of non-fatal conversion warnings"),
                ("x-submission-id" = Uuid, description = "Recorded submission, when persistence is enabled")
            )
        ),
        (status = 400, description = "Malformed upload"),
        (status = 422, description = "CSV or template cannot be converted"),
        (status = 500, description = "Template unavailable or unreadable")
    )
)]
pub async fn upload(State(state): State<AppState>, multipart: Multipart) -> BusinessResult<Response> {
    let request = read_upload(multipart).await?;
    let form = FormFields::from_json(&request.form_json)
        .map_err(|e| validation_error!(FORM_DATA_FIELD, e))?;
    tracing::info!(
        "Received upload with {} form fields and {} CSV bytes",
        form.len(),
        request.csv_bytes.len()
    );

    // Recording is best effort; a database outage must not block conversions
    let submission_id = match &state.db {
        Some(db) => services::record_processing(
            db,
            &form,
            &request.form_json,
            request.csv_file_name.clone(),
        )
        .await
        .inspect_err(|e| tracing::warn!("Could not record submission: {e}"))
        .ok()
        .map(|submission| submission.id),
        None => None,
    };

    let result = run_conversion(&state, form, request.csv_bytes).await;

    if let (Some(db), Some(id)) = (&state.db, submission_id) {
        let update = match &result {
            Ok(_) => services::mark_success(db, id, GENERATED_FILE_NAME).await,
            Err(e) => services::mark_failed(db, id, &e.to_string()).await,
        };
        if let Err(e) = update {
            tracing::warn!("Could not update submission {id}: {e}");
        }
    }

    let output = result?;
    for warning in &output.report.warnings {
        tracing::warn!("Conversion warning: {warning}");
    }
    Ok(workbook_response(output, submission_id))
}

#[utoipa::path(
    get,
    path = "/api/submissions",
    params(SubmissionFilter),
    responses(
        (status = 200, description = "Most recent submissions", body = Vec<FormSubmission>),
        (status = 502, description = "Persistence disabled")
    )
)]
pub async fn list_submissions(
    State(state): State<AppState>,
    Query(filter): Query<SubmissionFilter>,
) -> BusinessResult<Json<Vec<FormSubmission>>> {
    let submissions = services::list_recent(state.db()?, &filter)
        .await
        .map_err(|e| e.to_business_error("form_submission"))?;
    Ok(Json(submissions.into_iter().map(FormSubmission::from).collect()))
}

#[utoipa::path(
    get,
    path = "/api/submissions/stats",
    responses(
        (status = 200, description = "Submission counts by status", body = SubmissionStats),
        (status = 502, description = "Persistence disabled")
    )
)]
pub async fn submission_stats(State(state): State<AppState>) -> BusinessResult<Json<SubmissionStats>> {
    let stats = services::status_counts(state.db()?)
        .await
        .map_err(|e| e.to_business_error("form_submission"))?;
    Ok(Json(stats))
}

#[utoipa::path(
    get,
    path = "/api/submissions/{id}",
    params(("id" = Uuid, Path, description = "Submission UUID")),
    responses(
        (status = 200, description = "The submission", body = FormSubmission),
        (status = 404, description = "No such submission"),
        (status = 502, description = "Persistence disabled")
    )
)]
pub async fn get_submission(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> BusinessResult<Json<FormSubmission>> {
    let submission = services::get_submission(state.db()?, id)
        .await
        .map_err(|e| e.to_business_error("form_submission"))?
        .ok_or_else(|| not_found!("Form submission", id))?;
    Ok(Json(submission.into()))
}

#[utoipa::path(
    delete,
    path = "/api/submissions",
    params(PurgeParams),
    responses(
        (status = 200, description = "Number of submissions deleted", body = PurgeResult),
        (status = 502, description = "Persistence disabled")
    )
)]
pub async fn purge_submissions(
    State(state): State<AppState>,
    Query(params): Query<PurgeParams>,
) -> BusinessResult<Json<PurgeResult>> {
    let deleted = services::purge_before(state.db()?, params.before)
        .await
        .map_err(|e| e.to_business_error("form_submission"))?;
    Ok(Json(PurgeResult { deleted }))
}
