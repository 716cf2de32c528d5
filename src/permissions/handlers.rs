use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use serde_json::Value;
use tracing::{info, instrument, warn};

use super::dto::{PermissionList, PermissionPayload};
use super::repo_types::Permission;
use crate::{
    auth::jwt::AuthUser,
    criteria::{Criteria, ListQuery},
    error::{AppError, AppResult},
    extract::{ApiJson, ApiPath, ApiQuery},
    pagination::PageRequest,
    response::{respond, Envelope},
    state::AppState,
    validation::{Ruleset, ValidationError},
};

pub fn permission_routes() -> Router<AppState> {
    Router::new()
        .route("/permissions", get(index).post(store))
        .route(
            "/permissions/:id",
            get(show).put(update).patch(update).delete(destroy),
        )
}

#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> AppResult<Json<Envelope<PermissionList>>> {
    let criteria = Criteria::from_query::<Permission>(&query);
    let page = PageRequest::new(query.page, query.limit, state.config.per_page);
    let permissions = state.permissions.paginate(criteria.as_ref(), page).await?;
    Ok(respond("Permission list.", PermissionList { permissions }))
}

#[instrument(skip(state, payload))]
pub async fn store(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiJson(payload): ApiJson<Value>,
) -> AppResult<Json<Envelope<Permission>>> {
    let payload = validated(&state, &payload, Ruleset::Create, None).await?;
    let permission = state.permissions.create(&payload).await?;
    info!(permission_id = permission.id, name = %permission.name, %user_id, "permission created");
    Ok(respond("Permission created successfully!", permission))
}

#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<Json<Envelope<Permission>>> {
    let permission = state
        .permissions
        .find(id)
        .await?
        .ok_or_else(not_found)?;
    Ok(respond("Permission details.", permission))
}

#[instrument(skip(state, payload))]
pub async fn update(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(payload): ApiJson<Value>,
) -> AppResult<Json<Envelope<Permission>>> {
    let payload = validated(&state, &payload, Ruleset::Update, Some(id)).await?;
    let permission = state
        .permissions
        .update(&payload, id)
        .await?
        .ok_or_else(not_found)?;
    info!(permission_id = permission.id, %user_id, "permission updated");
    Ok(respond("Permission updated successfully!", permission))
}

#[instrument(skip(state))]
pub async fn destroy(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<Json<Envelope<bool>>> {
    let deleted = state.permissions.delete(id).await?;
    if deleted {
        info!(permission_id = id, %user_id, "permission deleted");
        Ok(respond("Permission deleted successfully!", true))
    } else {
        warn!(permission_id = id, "permission not deleted");
        Ok(respond("Permission can not be deleted!", false))
    }
}

/// Runs the rule set, then the uniqueness check against the store.
async fn validated(
    state: &AppState,
    raw: &Value,
    ruleset: Ruleset,
    except: Option<i64>,
) -> AppResult<PermissionPayload> {
    if let Err(e) = state.permission_validator.validate(raw, ruleset) {
        warn!(errors = ?e.messages(), "permission payload rejected");
        return Err(e.into());
    }
    let payload: PermissionPayload = serde_json::from_value(raw.clone())
        .map_err(|e| AppError::BadRequest(format!("Malformed permission payload: {e}")))?;
    if state
        .permissions
        .name_taken(payload.name(), payload.guard(), except)
        .await?
    {
        warn!(name = %payload.name(), "permission name taken");
        return Err(ValidationError::single("name", "The name has already been taken.").into());
    }
    Ok(payload)
}

fn not_found() -> AppError {
    AppError::NotFound("Permission not found.".into())
}
