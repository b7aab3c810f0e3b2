use super::models::{
    ActiveModel, Column, Entity, Model, SubmissionFilter, SubmissionStats, SubmissionStatus,
};
use crate::conversion::FormFields;
use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::sea_query::{Expr, Func, LikeExpr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Select,
};
use uuid::Uuid;

pub const DEFAULT_LIST_LIMIT: u64 = 10;

/// Form values worth storing: trimmed and non-blank
fn optional(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Record a new upload in the `processing` state
pub async fn record_processing(
    db: &DatabaseConnection,
    form: &FormFields,
    form_json: &str,
    csv_file_name: Option<String>,
) -> Result<Model, DbErr> {
    let submission = ActiveModel {
        id: Set(Uuid::new_v4()),
        relay_location: Set(optional(form.get("relayLocation"))),
        line_number: Set(optional(form.get("lineNumber"))),
        remote_location: Set(optional(form.get("remoteLocation"))),
        nominal_system_voltage: Set(optional(
            form.get_with_aliases("nominalSystemVoltage", &["noninalSystemVoltage"]),
        )),
        breaker_rating: Set(optional(form.get("breakerRating"))),
        conductor_rating: Set(optional(form.get("conductorRating"))),
        form_data_json: Set(Some(form_json.to_string())),
        csv_file_name: Set(csv_file_name),
        uploaded_at: Set(Utc::now()),
        generated_file_name: Set(None),
        status: Set(SubmissionStatus::Processing),
        error_message: Set(None),
    };
    submission.insert(db).await
}

pub async fn mark_success(
    db: &DatabaseConnection,
    id: Uuid,
    generated_file_name: &str,
) -> Result<Model, DbErr> {
    ActiveModel {
        id: Set(id),
        status: Set(SubmissionStatus::Success),
        generated_file_name: Set(Some(generated_file_name.to_string())),
        error_message: Set(None),
        ..Default::default()
    }
    .update(db)
    .await
}

pub async fn mark_failed(
    db: &DatabaseConnection,
    id: Uuid,
    error_message: &str,
) -> Result<Model, DbErr> {
    ActiveModel {
        id: Set(id),
        status: Set(SubmissionStatus::Failed),
        error_message: Set(Some(error_message.to_string())),
        ..Default::default()
    }
    .update(db)
    .await
}

fn contains_ignore_case(query: Select<Entity>, column: Column, needle: &str) -> Select<Entity> {
    let needle = needle.trim();
    if needle.is_empty() {
        return query;
    }
    // The needle is matched literally: LIKE wildcards in it are escaped
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.to_lowercase().chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');

    query.filter(
        Expr::expr(Func::lower(Expr::col(column))).like(LikeExpr::new(pattern).escape('\\')),
    )
}

/// Most recent submissions first, narrowed by the optional filters
pub async fn list_recent(
    db: &DatabaseConnection,
    filter: &SubmissionFilter,
) -> Result<Vec<Model>, DbErr> {
    let mut query = Entity::find();
    if let Some(relay_location) = &filter.relay_location {
        query = contains_ignore_case(query, Column::RelayLocation, relay_location);
    }
    if let Some(line_number) = &filter.line_number {
        query = contains_ignore_case(query, Column::LineNumber, line_number);
    }
    if let Some(status) = filter.status {
        query = query.filter(Column::Status.eq(status));
    }

    query
        .order_by_desc(Column::UploadedAt)
        .limit(filter.limit.unwrap_or(DEFAULT_LIST_LIMIT))
        .all(db)
        .await
}

pub async fn get_submission(db: &DatabaseConnection, id: Uuid) -> Result<Option<Model>, DbErr> {
    Entity::find_by_id(id).one(db).await
}

pub async fn status_counts(db: &DatabaseConnection) -> Result<SubmissionStats, DbErr> {
    let count = |status: SubmissionStatus| {
        Entity::find()
            .filter(Column::Status.eq(status))
            .count(db)
    };

    let processing = count(SubmissionStatus::Processing).await?;
    let success = count(SubmissionStatus::Success).await?;
    let failed = count(SubmissionStatus::Failed).await?;

    Ok(SubmissionStats {
        total: processing + success + failed,
        processing,
        success,
        failed,
    })
}

/// Delete submissions uploaded strictly before `before`, returning how many
/// were removed
pub async fn purge_before(db: &DatabaseConnection, before: DateTime<Utc>) -> Result<u64, DbErr> {
    let result = Entity::delete_many()
        .filter(Column::UploadedAt.lt(before))
        .exec(db)
        .await?;
    tracing::info!("Purged {} submissions uploaded before {before}", result.rows_affected);
    Ok(result.rows_affected)
}
