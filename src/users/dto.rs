use serde::{Deserialize, Serialize};
use validator::Validate;

use super::repo_types::{User, UserListing};
use crate::validation::Schema;

/// Request body for user registration.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(
        required(message = "is required"),
        email(message = "must be a valid email")
    )]
    pub email: Option<String>,
    #[validate(
        required(message = "is required"),
        length(min = 1, message = "must not be empty")
    )]
    pub name: Option<String>,
    #[validate(
        required(message = "is required"),
        length(min = 3, max = 30, message = "length must be between 3 and 30 characters"),
        custom(function = "crate::validation::alphanumeric")
    )]
    pub password: Option<String>,
    #[validate(length(min = 1, message = "must not be empty"))]
    pub designation: Option<String>,
    #[serde(alias = "is_admin")]
    pub is_admin: Option<bool>,
    #[serde(alias = "is_premium")]
    pub is_premium: Option<bool>,
}

impl Schema for RegisterRequest {
    const FIELDS: &'static [&'static str] = &[
        "email",
        "name",
        "password",
        "designation",
        "is_admin",
        "is_premium",
    ];

    fn normalize(&mut self) {
        trim_email(&mut self.email);
    }
}

/// Partial profile update. Absent fields are left untouched.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequest {
    #[validate(email(message = "must be a valid email"))]
    pub email: Option<String>,
    #[validate(length(min = 1, message = "must not be empty"))]
    pub name: Option<String>,
    #[validate(
        length(min = 3, max = 30, message = "length must be between 3 and 30 characters"),
        custom(function = "crate::validation::alphanumeric")
    )]
    pub password: Option<String>,
    #[validate(length(min = 1, message = "must not be empty"))]
    pub designation: Option<String>,
    #[serde(alias = "is_admin")]
    pub is_admin: Option<bool>,
    #[serde(alias = "is_premium")]
    pub is_premium: Option<bool>,
}

impl Schema for UpdateRequest {
    const FIELDS: &'static [&'static str] = &[
        "email",
        "name",
        "password",
        "designation",
        "is_admin",
        "is_premium",
    ];

    fn normalize(&mut self) {
        trim_email(&mut self.email);
    }
}

/// Request body for login.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(
        required(message = "is required"),
        email(message = "must be a valid email")
    )]
    pub email: Option<String>,
    #[validate(
        required(message = "is required"),
        length(min = 3, max = 30, message = "length must be between 3 and 30 characters"),
        custom(function = "crate::validation::alphanumeric")
    )]
    pub password: Option<String>,
}

impl Schema for LoginRequest {
    const FIELDS: &'static [&'static str] = &["email", "password"];

    fn normalize(&mut self) {
        trim_email(&mut self.email);
    }
}

/// Accepted registration, with the email normalized.
#[derive(Debug)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub designation: Option<String>,
    pub is_admin: bool,
    pub is_premium: bool,
}

impl From<RegisterRequest> for NewUser {
    fn from(r: RegisterRequest) -> Self {
        Self {
            name: r.name.unwrap_or_default(),
            email: normalize_email(&r.email.unwrap_or_default()),
            password: r.password.unwrap_or_default(),
            designation: r.designation,
            is_admin: r.is_admin.unwrap_or(false),
            is_premium: r.is_premium.unwrap_or(false),
        }
    }
}

#[derive(Debug)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl From<LoginRequest> for Credentials {
    fn from(r: LoginRequest) -> Self {
        Self {
            email: normalize_email(&r.email.unwrap_or_default()),
            password: r.password.unwrap_or_default(),
        }
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn trim_email(email: &mut Option<String>) {
    if let Some(e) = email {
        *e = e.trim().to_string();
    }
}

/// Returned by register and login.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub token: String,
    pub id: String,
    pub name: String,
    pub email: String,
    pub admin: bool,
    pub premium: bool,
}

impl SessionResponse {
    pub fn new(token: String, user: &User) -> Self {
        Self {
            token,
            id: user.id.to_hex(),
            name: user.name.clone(),
            email: user.email.clone(),
            admin: user.is_admin,
            premium: user.is_premium,
        }
    }
}

/// Returned by update.
#[derive(Debug, Serialize, Deserialize)]
pub struct UpdatedUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub admin: bool,
    pub premium: bool,
    pub image: String,
}

impl From<&User> for UpdatedUser {
    fn from(u: &User) -> Self {
        Self {
            id: u.id.to_hex(),
            name: u.name.clone(),
            email: u.email.clone(),
            admin: u.is_admin,
            premium: u.is_premium,
            image: u.image.clone(),
        }
    }
}

/// Public part of the user returned to the client. Never carries the password hash.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfile {
    pub id: String,
    pub name: String,
    pub email: String,
    pub designation: Option<String>,
    pub admin: bool,
    pub premium: bool,
    pub image: String,
    pub image_id: Option<String>,
}

impl From<UserListing> for PublicProfile {
    fn from(u: UserListing) -> Self {
        Self {
            id: u.id.to_hex(),
            name: u.name,
            email: u.email,
            designation: u.designation,
            admin: u.is_admin,
            premium: u.is_premium,
            image: u.image,
            image_id: u.image_id,
        }
    }
}

impl From<&User> for PublicProfile {
    fn from(u: &User) -> Self {
        UserListing::from(u).into()
    }
}
