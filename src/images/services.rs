use anyhow::Context;
use bytes::Bytes;
use mongodb::bson::oid::ObjectId;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::state::AppState;

pub struct UploadItem {
    pub body: Bytes,
    pub content_type: String,
}

/// Where an uploaded image lives at the media host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedAsset {
    pub asset_id: String,
    pub url: String,
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("no image data provided")]
    Empty,

    #[error("unsupported image type {0}")]
    UnsupportedType(String),

    #[error("media host: {0:#}")]
    Storage(#[from] anyhow::Error),
}

/// Store a profile image and return its permanent key and direct URL.
pub async fn upload_avatar(
    st: &AppState,
    user_id: ObjectId,
    item: UploadItem,
) -> Result<UploadedAsset, UploadError> {
    if item.body.is_empty() {
        return Err(UploadError::Empty);
    }
    let ext = ext_from_mime(&item.content_type)
        .ok_or_else(|| UploadError::UnsupportedType(item.content_type.clone()))?;

    let key = format!("avatars/{}/{}.{}", user_id.to_hex(), Uuid::new_v4(), ext);
    st.storage
        .put_object(&key, item.body, &item.content_type)
        .await
        .with_context(|| format!("put_object {}", key))?;

    info!(user_id = %user_id, asset_id = %key, "avatar uploaded");
    Ok(UploadedAsset {
        url: st.storage.object_url(&key),
        asset_id: key,
    })
}

/// Best-effort removal of a replaced asset. Failures are logged, never returned.
pub async fn discard_asset(st: &AppState, asset_id: &str) {
    match st.storage.delete_object(asset_id).await {
        Ok(()) => info!(asset_id, "previous avatar deleted"),
        Err(e) => warn!(error = %e, asset_id, "failed to delete previous avatar"),
    }
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        "image/heic" => Some("heic"),
        _ => None,
    }
}

#[cfg(test)]
mod image_tests {
    use std::sync::Arc;

    use super::*;
    use crate::storage::fake::FakeStorage;

    fn png(bytes: &'static [u8]) -> UploadItem {
        UploadItem {
            body: Bytes::from_static(bytes),
            content_type: "image/png".into(),
        }
    }

    #[test]
    fn test_ext_from_mime() {
        assert_eq!(ext_from_mime("image/jpeg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/jpg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/png"), Some("png"));
        assert_eq!(ext_from_mime("image/webp"), Some("webp"));
        assert_eq!(ext_from_mime("image/gif"), Some("gif"));
        assert_eq!(ext_from_mime("image/heic"), Some("heic"));
        assert_eq!(ext_from_mime("application/octet-stream"), None);
    }

    #[tokio::test]
    async fn upload_returns_key_and_direct_url() {
        let storage = Arc::new(FakeStorage::default());
        let state = AppState::fake_with(storage.clone());
        let user_id = ObjectId::new();

        let asset = upload_avatar(&state, user_id, png(b"\x89PNG")).await.unwrap();

        let prefix = format!("avatars/{}/", user_id.to_hex());
        assert!(asset.asset_id.starts_with(&prefix));
        assert!(asset.asset_id.ends_with(".png"));
        assert_eq!(asset.url, format!("https://fake.local/{}", asset.asset_id));
        assert_eq!(storage.put_keys(), vec![asset.asset_id]);
    }

    #[tokio::test]
    async fn upload_rejects_empty_and_non_images() {
        let storage = Arc::new(FakeStorage::default());
        let state = AppState::fake_with(storage.clone());

        let err = upload_avatar(&state, ObjectId::new(), png(b"")).await.unwrap_err();
        assert!(matches!(err, UploadError::Empty));

        let pdf = UploadItem {
            body: Bytes::from_static(b"%PDF"),
            content_type: "application/pdf".into(),
        };
        let err = upload_avatar(&state, ObjectId::new(), pdf).await.unwrap_err();
        assert!(matches!(err, UploadError::UnsupportedType(_)));
        assert!(storage.put_keys().is_empty());
    }

    #[tokio::test]
    async fn storage_failure_surfaces_as_upload_error() {
        let state = AppState::fake_with(Arc::new(FakeStorage::failing()));
        let err = upload_avatar(&state, ObjectId::new(), png(b"\x89PNG"))
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::Storage(_)));
    }

    #[tokio::test]
    async fn discard_records_delete() {
        let storage = Arc::new(FakeStorage::default());
        let state = AppState::fake_with(storage.clone());
        discard_asset(&state, "avatars/x/old.png").await;
        assert_eq!(storage.deleted_keys(), vec!["avatars/x/old.png".to_string()]);
    }
}
