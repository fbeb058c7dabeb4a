use axum::{
    async_trait,
    extract::{FromRequest, Request},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use lazy_static::lazy_static;
use mongodb::bson::oid::ObjectId;
use regex::Regex;
use serde::de::DeserializeOwned;
use tracing::warn;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::{
    response::Envelope,
    users::error::{UserError, MSG_INVALID_ID},
};

lazy_static! {
    static ref OBJECT_ID_RE: Regex = Regex::new(r"^[0-9a-fA-F]{24}$").unwrap();
    static ref ALPHANUMERIC_RE: Regex = Regex::new(r"^[a-zA-Z0-9]*$").unwrap();
}

/// A request payload with a declared field order.
///
/// When several fields are invalid, the one listed first in `FIELDS` is reported.
pub trait Schema: Validate {
    const FIELDS: &'static [&'static str];

    /// Runs before validation.
    fn normalize(&mut self) {}
}

pub fn is_object_id(raw: &str) -> bool {
    OBJECT_ID_RE.is_match(raw)
}

/// Checks the identifier shape before any storage access.
pub fn parse_object_id(raw: &str) -> Result<ObjectId, UserError> {
    if !is_object_id(raw) {
        return Err(UserError::Validation(MSG_INVALID_ID.into()));
    }
    ObjectId::parse_str(raw).map_err(|_| UserError::Validation(MSG_INVALID_ID.into()))
}

pub fn alphanumeric(value: &str) -> Result<(), ValidationError> {
    if ALPHANUMERIC_RE.is_match(value) {
        return Ok(());
    }
    let mut err = ValidationError::new("alphanum");
    err.message = Some("must only contain alpha-numeric characters".into());
    Err(err)
}

/// Describe the first violation in schema order, e.g. `password length must be between 3 and 30`.
pub fn first_violation(errors: &ValidationErrors, order: &[&str]) -> String {
    let rank = |field: &str| order.iter().position(|f| *f == field).unwrap_or(order.len());

    let mut fields: Vec<(String, &Vec<ValidationError>)> = errors
        .field_errors()
        .into_iter()
        .map(|(field, errs)| (field.to_string(), errs))
        .collect();
    fields.sort_by(|(a, _), (b, _)| rank(a).cmp(&rank(b)).then_with(|| a.cmp(b)));

    let Some((field, errs)) = fields.first() else {
        return "invalid request body".into();
    };
    let detail = errs
        .first()
        .map(|e| {
            e.message
                .as_ref()
                .map(|m| m.to_string())
                .unwrap_or_else(|| format!("failed `{}` check", e.code))
        })
        .unwrap_or_else(|| "is invalid".into());
    format!("{} {}", field, detail)
}

pub fn check<T: Schema>(payload: &T) -> Result<(), UserError> {
    payload.validate().map_err(|errors| {
        let message = first_violation(&errors, T::FIELDS);
        warn!(%message, "payload rejected");
        UserError::Validation(message)
    })
}

/// JSON body that has passed its [`Schema`]. Rejects with a 400 envelope otherwise.
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: Schema + DeserializeOwned,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let method = req.method().clone();
        let Json(mut payload) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| reject(&method, rejection.body_text()))?;
        payload.normalize();
        check(&payload).map_err(|e| e.respond(&method))?;
        Ok(ValidatedJson(payload))
    }
}

pub fn reject(method: &Method, message: impl Into<String>) -> Response {
    Envelope::<()>::failure(method, StatusCode::BAD_REQUEST, message).into_response()
}
