//! Record batch, reconcile and by-name handlers.

use crate::auth::AuthUser;
use crate::error::ServerError;
use crate::server::AppState;
use axum::extract::State;
use axum::{Extension, Json};
use chrono::Utc;
use strongbox_core::rpc::{
    Ack, NameRequest, ReconcileRequest, ReconcileResponse, RecordBatch, RecordContent, SummaryList,
};
use strongbox_core::sync::planner;
use strongbox_core::Record;

pub async fn create_batch(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Json(batch): Json<RecordBatch>,
) -> Result<Json<Ack>, ServerError> {
    let records = validate_batch(batch.records)?;
    let affected = state.storage.upsert_records(user_id, &records)?;
    tracing::debug!(user_id = %user_id, affected, "Stored new records");
    Ok(Json(Ack { affected }))
}

pub async fn update_batch(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Json(batch): Json<RecordBatch>,
) -> Result<Json<Ack>, ServerError> {
    let records = validate_batch(batch.records)?;
    let affected = state.storage.upsert_records(user_id, &records)?;
    tracing::debug!(user_id = %user_id, affected, "Stored updated records");
    Ok(Json(Ack { affected }))
}

pub async fn reconcile(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Json(req): Json<ReconcileRequest>,
) -> Result<Json<ReconcileResponse>, ServerError> {
    let records = state.storage.records_for_owner(user_id)?;
    let response = planner::plan(records, &req.digests);
    tracing::debug!(
        user_id = %user_id,
        digests = req.digests.len(),
        push_down = response.push_down.len(),
        pull_up = response.pull_up.len(),
        "Planned reconciliation"
    );
    Ok(Json(response))
}

pub async fn list(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> Result<Json<SummaryList>, ServerError> {
    let records = state.storage.summaries(user_id)?;
    Ok(Json(SummaryList { records }))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Json(req): Json<NameRequest>,
) -> Result<Json<RecordContent>, ServerError> {
    let content = state.storage.content_by_name(user_id, &req.name)?;
    Ok(Json(content))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Json(req): Json<NameRequest>,
) -> Result<Json<Ack>, ServerError> {
    let now = Utc::now().timestamp_millis();
    state.storage.delete_by_name(user_id, &req.name, now)?;
    tracing::debug!(user_id = %user_id, "Deleted record by name");
    Ok(Json(Ack { affected: 1 }))
}

/// Live records need a name and content; tombstones are stored bare.
fn validate_batch(records: Vec<Record>) -> Result<Vec<Record>, ServerError> {
    records
        .into_iter()
        .map(|mut record| {
            if record.deleted {
                record.name = None;
                record.content = None;
                return Ok(record);
            }
            match (&record.name, &record.content) {
                (Some(name), Some(_)) if !name.is_empty() => Ok(record),
                _ => Err(ServerError::BadRequest(format!(
                    "record {} needs a name and content",
                    record.id
                ))),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use strongbox_core::RecordKind;
    use uuid::Uuid;

    fn record(name: Option<&str>, content: Option<&[u8]>, deleted: bool) -> Record {
        Record {
            id: Uuid::new_v4(),
            name: name.map(str::to_string),
            kind: RecordKind::Text,
            content: content.map(<[u8]>::to_vec),
            updated_at: 1,
            deleted,
        }
    }

    #[test]
    fn tombstones_are_stripped() {
        let out = validate_batch(vec![record(Some("mail"), Some(b"x"), true)]).unwrap();
        assert_eq!(out[0].name, None);
        assert_eq!(out[0].content, None);
    }

    #[test]
    fn live_records_need_name_and_content() {
        assert!(validate_batch(vec![record(Some("mail"), Some(b"x"), false)]).is_ok());
        assert!(validate_batch(vec![record(None, Some(b"x"), false)]).is_err());
        assert!(validate_batch(vec![record(Some(""), Some(b"x"), false)]).is_err());
        assert!(validate_batch(vec![record(Some("mail"), None, false)]).is_err());
    }
}
