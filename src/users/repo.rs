use axum::async_trait;
use futures_util::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId, Document},
    options::{FindOptions, IndexOptions},
    Collection, Database, IndexModel,
};
use tracing::{info, instrument};

use super::{
    error::UserResult,
    repo_types::{User, UserListing},
};

const COLLECTION: &str = "users";

/// Persistence port for users.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: ObjectId) -> UserResult<Option<User>>;
    async fn find_by_email(&self, email: &str) -> UserResult<Option<User>>;
    /// Every user, read through the public projection.
    async fn find_all(&self) -> UserResult<Vec<UserListing>>;
    async fn insert(&self, user: &User) -> UserResult<()>;
    /// Replace the stored record. Returns `false` if no record has `user.id`.
    async fn update(&self, user: &User) -> UserResult<bool>;
    /// Returns `false` if nothing was deleted.
    async fn delete(&self, id: ObjectId) -> UserResult<bool>;
}

pub struct MongoUserRepository {
    collection: Collection<User>,
}

impl MongoUserRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection::<User>(COLLECTION),
        }
    }

    /// Email uniqueness is enforced here, not by the find-then-insert in register.
    pub async fn init_indexes(&self) -> UserResult<()> {
        let email_unique = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("idx_email_unique".to_string())
                    .build(),
            )
            .build();
        self.collection.create_index(email_unique).await?;
        info!("user indexes ready");
        Ok(())
    }

    fn public_projection() -> Document {
        doc! { "password": 0 }
    }
}

#[async_trait]
impl UserRepository for MongoUserRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: ObjectId) -> UserResult<Option<User>> {
        Ok(self.collection.find_one(doc! { "_id": id }).await?)
    }

    #[instrument(skip(self))]
    async fn find_by_email(&self, email: &str) -> UserResult<Option<User>> {
        Ok(self.collection.find_one(doc! { "email": email }).await?)
    }

    #[instrument(skip(self))]
    async fn find_all(&self) -> UserResult<Vec<UserListing>> {
        let options = FindOptions::builder()
            .projection(Self::public_projection())
            .sort(doc! { "_id": 1 })
            .build();
        let cursor = self
            .collection
            .clone_with_type::<UserListing>()
            .find(doc! {})
            .with_options(options)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    #[instrument(skip(self, user), fields(user_id = %user.id))]
    async fn insert(&self, user: &User) -> UserResult<()> {
        self.collection.insert_one(user).await?;
        Ok(())
    }

    #[instrument(skip(self, user), fields(user_id = %user.id))]
    async fn update(&self, user: &User) -> UserResult<bool> {
        let result = self
            .collection
            .replace_one(doc! { "_id": user.id }, user)
            .await?;
        Ok(result.matched_count > 0)
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: ObjectId) -> UserResult<bool> {
        let result = self.collection.delete_one(doc! { "_id": id }).await?;
        Ok(result.deleted_count > 0)
    }
}


#[cfg(test)]
mod tests {
    use super::memory::InMemoryUserRepository;
    use super::*;

    fn user(email: &str) -> User {
        User::new(
            "Ada".into(),
            email.into(),
            "$argon2id$stub".into(),
            None,
            false,
            false,
            "https://placeholder.local/a.png".into(),
        )
    }

    #[test]
    fn public_projection_excludes_password() {
        let projection = MongoUserRepository::public_projection();
        assert_eq!(projection.get_i32("password").unwrap(), 0);
    }

    #[test]
    fn listing_document_has_no_password_field() {
        let listing = UserListing::from(&user("ada@example.com"));
        let doc = mongodb::bson::to_document(&listing).unwrap();
        assert!(!doc.contains_key("password"));
        assert!(doc.contains_key("_id"));
        assert!(doc.contains_key("isAdmin"));
    }

    #[tokio::test]
    async fn memory_repo_enforces_unique_email() {
        let repo = InMemoryUserRepository::default();
        repo.insert(&user("ada@example.com")).await.unwrap();
        let err = repo.insert(&user("ada@example.com")).await.unwrap_err();
        assert_eq!(err.to_string(), "User Already Exists!");
        assert_eq!(repo.count().await, 1);
    }

    #[tokio::test]
    async fn memory_repo_update_and_delete_report_misses() {
        let repo = InMemoryUserRepository::default();
        let ghost = user("ghost@example.com");
        assert!(!repo.update(&ghost).await.unwrap());
        assert!(!repo.delete(ghost.id).await.unwrap());

        repo.insert(&ghost).await.unwrap();
        assert!(repo.delete(ghost.id).await.unwrap());
        assert!(repo.find_by_id(ghost.id).await.unwrap().is_none());
    }
}
