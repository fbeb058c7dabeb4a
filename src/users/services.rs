use mongodb::bson::oid::ObjectId;
use tracing::{info, warn};

use super::{
    dto::{
        normalize_email, Credentials, NewUser, PublicProfile, SessionResponse, UpdateRequest,
        UpdatedUser,
    },
    error::{
        UserError, UserResult, MSG_BAD_CREDENTIALS, MSG_NO_USERS, MSG_UPDATE_TARGET_MISSING,
        MSG_USER_EXISTS, MSG_USER_NOT_FOUND,
    },
    repo_types::User,
};
use crate::{
    auth::{hash_password, verify_password, JwtKeys},
    images::services::{discard_asset, upload_avatar, UploadItem},
    state::AppState,
};

fn issue_session(st: &AppState, user: &User) -> UserResult<SessionResponse> {
    let token =
        JwtKeys::from(&st.config.jwt).issue(user.id, &user.name, &user.email, user.is_admin)?;
    Ok(SessionResponse::new(token, user))
}

pub async fn register(st: &AppState, input: NewUser) -> UserResult<SessionResponse> {
    if st.users.find_by_email(&input.email).await?.is_some() {
        warn!(email = %input.email, "email already registered");
        return Err(UserError::Conflict(MSG_USER_EXISTS));
    }

    let password_hash = hash_password(&input.password, &st.config.password)?;
    let user = User::new(
        input.name,
        input.email,
        password_hash,
        input.designation,
        input.is_admin,
        input.is_premium,
        st.config.default_avatar_url.clone(),
    );
    st.users.insert(&user).await?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    issue_session(st, &user)
}

pub async fn login(st: &AppState, creds: Credentials) -> UserResult<SessionResponse> {
    let Some(user) = st.users.find_by_email(&creds.email).await? else {
        warn!(email = %creds.email, "login unknown email");
        return Err(UserError::NotFound(MSG_BAD_CREDENTIALS));
    };

    if !verify_password(&creds.password, &user.password_hash)? {
        warn!(email = %creds.email, user_id = %user.id, "login invalid password");
        return Err(UserError::Auth(MSG_BAD_CREDENTIALS));
    }

    info!(user_id = %user.id, email = %user.email, "user logged in");
    issue_session(st, &user)
}

/// Apply the supplied fields and, if present, replace the profile image.
///
/// The new image is uploaded before the old asset is discarded, so a failed upload
/// leaves the stored record and its asset untouched. If the record cannot be saved,
/// the freshly uploaded image is discarded instead.
pub async fn update(
    st: &AppState,
    id: ObjectId,
    changes: UpdateRequest,
    image: Option<UploadItem>,
) -> UserResult<UpdatedUser> {
    let Some(mut user) = st.users.find_by_id(id).await? else {
        warn!(user_id = %id, "update target missing");
        return Err(UserError::Conflict(MSG_UPDATE_TARGET_MISSING));
    };

    if let Some(name) = changes.name {
        user.name = name;
    }
    if let Some(email) = changes.email {
        user.email = normalize_email(&email);
    }
    if let Some(password) = changes.password {
        user.password_hash = hash_password(&password, &st.config.password)?;
    }
    if let Some(designation) = changes.designation {
        user.designation = Some(designation);
    }
    if let Some(is_admin) = changes.is_admin {
        user.is_admin = is_admin;
    }
    if let Some(is_premium) = changes.is_premium {
        user.is_premium = is_premium;
    }

    let previous = user.uploaded_asset().map(str::to_owned);
    let uploaded = match image {
        Some(item) => {
            let asset = upload_avatar(st, user.id, item).await?;
            user.set_uploaded_image(asset.asset_id.clone(), asset.url);
            Some(asset.asset_id)
        }
        None => None,
    };

    let saved = match st.users.update(&user).await {
        Ok(true) => Ok(()),
        Ok(false) => {
            warn!(user_id = %id, "user vanished during update");
            Err(UserError::Conflict(MSG_UPDATE_TARGET_MISSING))
        }
        Err(e) => Err(e),
    };
    if let Err(e) = saved {
        if let Some(fresh) = uploaded {
            discard_asset(st, &fresh).await;
        }
        return Err(e);
    }

    if let (Some(_), Some(old)) = (&uploaded, previous) {
        discard_asset(st, &old).await;
    }

    info!(user_id = %id, "user updated");
    Ok(UpdatedUser::from(&user))
}

pub async fn view_profile(st: &AppState, id: ObjectId) -> UserResult<PublicProfile> {
    st.users
        .find_by_id(id)
        .await?
        .map(|u| PublicProfile::from(&u))
        .ok_or(UserError::NotFound(MSG_USER_NOT_FOUND))
}

pub async fn all_users(st: &AppState) -> UserResult<Vec<PublicProfile>> {
    let users = st.users.find_all().await?;
    if users.is_empty() {
        return Err(UserError::NotFound(MSG_NO_USERS));
    }
    Ok(users.into_iter().map(PublicProfile::from).collect())
}

/// Delete and return whoever remains.
pub async fn delete(st: &AppState, id: ObjectId) -> UserResult<Vec<PublicProfile>> {
    if st.users.find_by_id(id).await?.is_none() {
        return Err(UserError::NotFound(MSG_USER_NOT_FOUND));
    }
    if !st.users.delete(id).await? {
        return Err(UserError::NotFound(MSG_USER_NOT_FOUND));
    }
    info!(user_id = %id, "user deleted");

    let remaining = st.users.find_all().await?;
    Ok(remaining.into_iter().map(PublicProfile::from).collect())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bytes::Bytes;

    use super::*;
    use crate::{config::PLACEHOLDER_AVATAR_URL, storage::fake::FakeStorage};

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: "Ada".into(),
            email: email.into(),
            password: "secret1".into(),
            designation: None,
            is_admin: false,
            is_premium: false,
        }
    }

    fn png() -> UploadItem {
        UploadItem {
            body: Bytes::from_static(b"\x89PNG"),
            content_type: "image/png".into(),
        }
    }

    #[tokio::test]
    async fn register_defaults_flags_and_placeholder() {
        let st = AppState::fake();
        let session = register(&st, new_user("ada@example.com")).await.unwrap();
        assert!(!session.admin);
        assert!(!session.premium);

        let id = ObjectId::parse_str(&session.id).unwrap();
        let stored = st.users.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.image, PLACEHOLDER_AVATAR_URL);
        assert!(stored.image_id.is_none());
        assert_ne!(stored.password_hash, "secret1");
        assert!(!stored.password_hash.is_empty());
    }

    #[tokio::test]
    async fn register_twice_conflicts_and_keeps_first() {
        let st = AppState::fake();
        let first = register(&st, new_user("ada@example.com")).await.unwrap();

        let mut again = new_user("ada@example.com");
        again.name = "Impostor".into();
        let err = register(&st, again).await.unwrap_err();
        assert!(matches!(err, UserError::Conflict(MSG_USER_EXISTS)));

        let stored = st.users.find_by_email("ada@example.com").await.unwrap().unwrap();
        assert_eq!(stored.id.to_hex(), first.id);
        assert_eq!(stored.name, "Ada");
    }

    #[tokio::test]
    async fn login_distinguishes_unknown_email_and_bad_password() {
        let st = AppState::fake();
        register(&st, new_user("ada@example.com")).await.unwrap();

        let err = login(
            &st,
            Credentials {
                email: "nobody@example.com".into(),
                password: "secret1".into(),
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::NOT_FOUND);

        let err = login(
            &st,
            Credentials {
                email: "ada@example.com".into(),
                password: "wrong1".into(),
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn update_name_only_leaves_everything_else() {
        let st = AppState::fake();
        let session = register(&st, new_user("ada@example.com")).await.unwrap();
        let id = ObjectId::parse_str(&session.id).unwrap();
        let before = st.users.find_by_id(id).await.unwrap().unwrap();

        let changes = UpdateRequest {
            name: Some("Countess".into()),
            ..Default::default()
        };
        let updated = update(&st, id, changes, None).await.unwrap();
        assert_eq!(updated.name, "Countess");

        let after = st.users.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(after.email, before.email);
        assert_eq!(after.password_hash, before.password_hash);
        assert_eq!(after.is_admin, before.is_admin);
        assert_eq!(after.is_premium, before.is_premium);
        assert_eq!(after.image, before.image);
    }

    #[tokio::test]
    async fn update_applies_false_flags() {
        let st = AppState::fake();
        let mut input = new_user("ada@example.com");
        input.is_admin = true;
        let session = register(&st, input).await.unwrap();
        let id = ObjectId::parse_str(&session.id).unwrap();

        let changes = UpdateRequest {
            is_admin: Some(false),
            ..Default::default()
        };
        let updated = update(&st, id, changes, None).await.unwrap();
        assert!(!updated.admin);
    }

    #[tokio::test]
    async fn update_missing_user_conflicts() {
        let st = AppState::fake();
        let err = update(&st, ObjectId::new(), UpdateRequest::default(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, UserError::Conflict(MSG_UPDATE_TARGET_MISSING)));
    }

    #[tokio::test]
    async fn replacing_image_discards_previous_asset() {
        let storage = Arc::new(FakeStorage::default());
        let st = AppState::fake_with(storage.clone());
        let session = register(&st, new_user("ada@example.com")).await.unwrap();
        let id = ObjectId::parse_str(&session.id).unwrap();

        update(&st, id, UpdateRequest::default(), Some(png())).await.unwrap();
        assert!(storage.deleted_keys().is_empty());
        let first = st.users.find_by_id(id).await.unwrap().unwrap();
        let first_asset = first.image_id.clone().unwrap();

        let updated = update(&st, id, UpdateRequest::default(), Some(png())).await.unwrap();
        assert_eq!(storage.deleted_keys(), vec![first_asset.clone()]);
        assert_ne!(updated.image, first.image);
        let second = st.users.find_by_id(id).await.unwrap().unwrap();
        assert_ne!(second.image_id.unwrap(), first_asset);
    }

    #[tokio::test]
    async fn failed_upload_leaves_record_unchanged() {
        let storage = Arc::new(FakeStorage::failing());
        let st = AppState::fake_with(storage.clone());
        let session = register(&st, new_user("ada@example.com")).await.unwrap();
        let id = ObjectId::parse_str(&session.id).unwrap();

        let changes = UpdateRequest {
            name: Some("Renamed".into()),
            ..Default::default()
        };
        let err = update(&st, id, changes, Some(png())).await.unwrap_err();
        assert!(matches!(err, UserError::Upload(_)));

        let stored = st.users.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.name, "Ada");
        assert_eq!(stored.image, PLACEHOLDER_AVATAR_URL);
        assert!(stored.image_id.is_none());
        assert!(storage.deleted_keys().is_empty());
    }

    #[tokio::test]
    async fn update_to_taken_email_conflicts() {
        let st = AppState::fake();
        register(&st, new_user("ada@example.com")).await.unwrap();
        let bob = register(&st, new_user("bob@example.com")).await.unwrap();
        let id = ObjectId::parse_str(&bob.id).unwrap();

        let changes = UpdateRequest {
            email: Some("ADA@example.com".into()),
            ..Default::default()
        };
        let err = update(&st, id, changes, None).await.unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn rejected_save_discards_fresh_upload() {
        let storage = Arc::new(FakeStorage::default());
        let st = AppState::fake_with(storage.clone());
        register(&st, new_user("ada@example.com")).await.unwrap();
        let bob = register(&st, new_user("bob@example.com")).await.unwrap();
        let id = ObjectId::parse_str(&bob.id).unwrap();

        let changes = UpdateRequest {
            email: Some("ada@example.com".into()),
            ..Default::default()
        };
        let err = update(&st, id, changes, Some(png())).await.unwrap_err();
        assert!(matches!(err, UserError::Conflict(MSG_USER_EXISTS)));

        let puts = storage.put_keys();
        assert_eq!(puts.len(), 1);
        assert_eq!(storage.deleted_keys(), puts);

        let stored = st.users.find_by_id(id).await.unwrap().unwrap();
        assert!(stored.image_id.is_none());
        assert_eq!(stored.email, "bob@example.com");
    }

    #[tokio::test]
    async fn all_users_empty_is_not_found() {
        let st = AppState::fake();
        let err = all_users(&st).await.unwrap_err();
        assert!(matches!(err, UserError::NotFound(MSG_NO_USERS)));
    }

    #[tokio::test]
    async fn delete_returns_remaining_users() {
        let st = AppState::fake();
        let ada = register(&st, new_user("ada@example.com")).await.unwrap();
        register(&st, new_user("bob@example.com")).await.unwrap();

        let remaining = delete(&st, ObjectId::parse_str(&ada.id).unwrap()).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].email, "bob@example.com");

        let err = delete(&st, ObjectId::parse_str(&ada.id).unwrap()).await.unwrap_err();
        assert!(matches!(err, UserError::NotFound(MSG_USER_NOT_FOUND)));
    }
}
