use axum::{
    async_trait,
    extract::{DefaultBodyLimit, FromRequest, Multipart, Path, Request, State},
    http::{header::CONTENT_TYPE, Method},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tracing::instrument;

use super::{
    dto::{LoginRequest, RegisterRequest, UpdateRequest},
    error::UserResult,
    services,
};
use crate::{
    auth::AuthUser,
    images::services::UploadItem,
    response::Envelope,
    state::AppState,
    validation::{check, parse_object_id, reject, Schema, ValidatedJson},
};

const IMAGE_FIELD: &str = "image";

pub fn user_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/", get(all_users))
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(me))
        .route(
            "/:id",
            get(view_profile)
                .put(update)
                .layer(DefaultBodyLimit::max(max_upload_bytes))
                .delete(delete_user),
        )
}

fn reply<T: Serialize>(method: &Method, result: UserResult<T>, message: &str) -> Response {
    match result {
        Ok(data) => Envelope::ok(method, data, message).into_response(),
        Err(e) => e.respond(method),
    }
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    method: Method,
    ValidatedJson(payload): ValidatedJson<RegisterRequest>,
) -> Response {
    let result = services::register(&state, payload.into()).await;
    reply(&method, result, "Created New User!")
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    method: Method,
    ValidatedJson(payload): ValidatedJson<LoginRequest>,
) -> Response {
    let result = services::login(&state, payload.into()).await;
    reply(&method, result, "Login Successful!")
}

#[instrument(skip(state, form))]
pub async fn update(
    State(state): State<AppState>,
    method: Method,
    Path(user_id): Path<String>,
    form: UpdateForm,
) -> Response {
    let id = match parse_object_id(&user_id) {
        Ok(id) => id,
        Err(e) => return e.respond(&method),
    };
    let result = services::update(&state, id, form.changes, form.image).await;
    reply(&method, result, "User Updated Successfully!")
}

#[instrument(skip(state))]
pub async fn view_profile(
    State(state): State<AppState>,
    method: Method,
    Path(id): Path<String>,
) -> Response {
    let result = match parse_object_id(&id) {
        Ok(id) => services::view_profile(&state, id).await,
        Err(e) => Err(e),
    };
    reply(&method, result, "View Profile")
}

#[instrument(skip(state))]
pub async fn all_users(State(state): State<AppState>, method: Method) -> Response {
    let result = services::all_users(&state).await;
    reply(&method, result, "All users")
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    method: Method,
    Path(user_id): Path<String>,
) -> Response {
    let result = match parse_object_id(&user_id) {
        Ok(id) => services::delete(&state, id).await,
        Err(e) => Err(e),
    };
    reply(&method, result, "User Deleted Successfully")
}

#[instrument(skip(state))]
pub async fn me(State(state): State<AppState>, method: Method, caller: AuthUser) -> Response {
    tracing::debug!(user_id = %caller.id, admin = caller.is_admin, "profile by token");
    let result = services::view_profile(&state, caller.id).await;
    reply(&method, result, "View Profile")
}

/// Update payload from either a JSON body or a multipart form with an optional `image` file.
pub struct UpdateForm {
    pub changes: UpdateRequest,
    pub image: Option<UploadItem>,
}

#[async_trait]
impl<S> FromRequest<S> for UpdateForm
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let method = req.method().clone();
        let is_multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.starts_with("multipart/form-data"))
            .unwrap_or(false);

        let mut form = if is_multipart {
            let mp = Multipart::from_request(req, state)
                .await
                .map_err(|rejection| reject(&method, rejection.body_text()))?;
            read_multipart(mp).await.map_err(|msg| reject(&method, msg))?
        } else {
            let Json(changes) = Json::<UpdateRequest>::from_request(req, state)
                .await
                .map_err(|rejection| reject(&method, rejection.body_text()))?;
            UpdateForm {
                changes,
                image: None,
            }
        };

        form.changes.normalize();
        check(&form.changes).map_err(|e| e.respond(&method))?;
        Ok(form)
    }
}

async fn read_multipart(mut mp: Multipart) -> Result<UpdateForm, String> {
    let mut changes = UpdateRequest::default();
    let mut image = None;

    while let Some(field) = mp.next_field().await.map_err(|e| e.body_text())? {
        let name = field.name().unwrap_or_default().to_string();
        if name == IMAGE_FIELD {
            let content_type = field
                .content_type()
                .map(|s| s.to_string())
                .unwrap_or_else(|| "application/octet-stream".into());
            let body = field.bytes().await.map_err(|e| e.body_text())?;
            image = Some(UploadItem { body, content_type });
            continue;
        }

        let value = field.text().await.map_err(|e| e.body_text())?;
        match name.as_str() {
            "name" => changes.name = Some(value),
            "email" => changes.email = Some(value),
            "password" => changes.password = Some(value),
            "designation" => changes.designation = Some(value),
            "isAdmin" | "is_admin" => changes.is_admin = Some(parse_flag(&name, &value)?),
            "isPremium" | "is_premium" => changes.is_premium = Some(parse_flag(&name, &value)?),
            _ => {}
        }
    }

    Ok(UpdateForm { changes, image })
}

fn parse_flag(field: &str, value: &str) -> Result<bool, String> {
    match value.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(format!("{} must be a boolean", field)),
    }
}
