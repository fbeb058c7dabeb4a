use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// User document as stored in the `users` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    pub email: String,
    #[serde(rename = "password")]
    pub password_hash: String, // Argon2 PHC string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub designation: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub is_premium: bool,
    pub image: String,
    /// Present only while `image` points at an uploaded asset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
}

impl User {
    pub fn new(
        name: String,
        email: String,
        password_hash: String,
        designation: Option<String>,
        is_admin: bool,
        is_premium: bool,
        placeholder_image: String,
    ) -> Self {
        Self {
            id: ObjectId::new(),
            name,
            email,
            password_hash,
            designation,
            is_admin,
            is_premium,
            image: placeholder_image,
            image_id: None,
        }
    }

    /// Asset currently backing `image`, if it was uploaded rather than the placeholder.
    pub fn uploaded_asset(&self) -> Option<&str> {
        self.image_id.as_deref().filter(|id| !id.is_empty())
    }

    pub fn set_uploaded_image(&mut self, asset_id: String, url: String) {
        self.image_id = Some(asset_id);
        self.image = url;
    }
}

/// Projection of [`User`] without credentials, used for listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserListing {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub designation: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub is_premium: bool,
    pub image: String,
    #[serde(default)]
    pub image_id: Option<String>,
}

impl From<&User> for UserListing {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            name: u.name.clone(),
            email: u.email.clone(),
            designation: u.designation.clone(),
            is_admin: u.is_admin,
            is_premium: u.is_premium,
            image: u.image.clone(),
            image_id: u.image_id.clone(),
        }
    }
}
