use axum::{
    extract::{DefaultBodyLimit, State},
    routing::{get, post},
    Json, Router,
};
use serde_json::{Map, Value};
use tracing::{info, instrument, warn};

use super::dto::{ProfilePage, ProfileUpdated};
use crate::{
    auth::jwt::AuthUser,
    error::{AppError, AppResult},
    extract::{ApiMultipart, ApiPath},
    media::services::{attach_upload, collection_views, view, Upload, AVATAR_COLLECTION},
    response::{respond, Envelope},
    state::AppState,
    users::ProfileUpdate,
    validation::{registry::USER_PROFILE, ValidationError},
};

const IMAGE_FIELD: &str = "image";

pub fn read_routes() -> Router<AppState> {
    Router::new().route("/profile", get(index))
}

pub fn write_routes(upload_max_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/profile/:id", post(update))
        .layer(DefaultBodyLimit::max(upload_max_bytes))
}

#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<Envelope<ProfilePage>>> {
    let user = state
        .users
        .find(user_id)
        .await?
        .ok_or_else(user_not_found)?;
    let roles = state.users.role_names(user.id).await?;
    let avatar = collection_views(&state, user.id, AVATAR_COLLECTION).await?;
    let validation = state.rules.get(USER_PROFILE)?.describe();
    Ok(respond(
        "User profile.",
        ProfilePage {
            user,
            roles,
            avatar,
            validation,
        },
    ))
}

/// Multipart: `image` (file, required), `name`/`email` (text, optional).
#[instrument(skip(state, mp))]
pub async fn update(
    State(state): State<AppState>,
    AuthUser(auth_id): AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiMultipart(mut mp): ApiMultipart,
) -> AppResult<Json<Envelope<ProfileUpdated>>> {
    if auth_id != id {
        warn!(auth_id, id, "attempt to update another user's profile");
        return Err(AppError::Forbidden("You may only update your own profile.".into()));
    }

    let user = state.users.find(id).await?.ok_or_else(user_not_found)?;

    let mut fields = Map::new();
    let mut image: Option<Upload> = None;
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Malformed multipart body: {e}")))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        if name == IMAGE_FIELD {
            let file_name = field.file_name().unwrap_or("avatar").to_string();
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let body = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(format!("Unreadable upload: {e}")))?;
            if !body.is_empty() {
                image = Some(Upload {
                    file_name,
                    content_type,
                    body,
                });
            }
        } else {
            let text = field
                .text()
                .await
                .map_err(|e| AppError::BadRequest(format!("Unreadable field {name}: {e}")))?;
            fields.insert(name, Value::String(text));
        }
    }

    let payload = Value::Object(fields);
    let mut errors = match state.rules.get(USER_PROFILE)?.validate(&payload) {
        Ok(()) => Default::default(),
        Err(ValidationError(bag)) => bag,
    };
    if image.is_none() {
        errors.add(IMAGE_FIELD, "The image field is required.");
    }
    let changes = ProfileUpdate {
        name: text_field(&payload, "name"),
        email: text_field(&payload, "email").map(|e| e.to_lowercase()),
    };
    if let Some(email) = &changes.email {
        if state.users.email_taken(email, Some(id)).await? {
            errors.add("email", "The email has already been taken.");
        }
    }
    if let Err(e) = errors.into_result() {
        warn!(user_id = id, errors = ?e.messages(), "profile update rejected");
        return Err(e.into());
    }
    let Some(image) = image else {
        return Err(ValidationError::single(IMAGE_FIELD, "The image field is required.").into());
    };

    let media = attach_upload(&state, user.id, AVATAR_COLLECTION, image).await?;
    let user = if changes.is_empty() {
        user
    } else {
        state
            .users
            .update_profile(id, &changes)
            .await?
            .ok_or_else(user_not_found)?
    };

    info!(user_id = id, media_id = media.id, "profile updated");
    let avatar = view(&state, media).await?;
    Ok(respond(
        "Profile updated successfully!",
        ProfileUpdated { user, avatar },
    ))
}

fn text_field(payload: &Value, field: &str) -> Option<String> {
    payload
        .get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn user_not_found() -> AppError {
    AppError::NotFound("User not found.".into())
}
