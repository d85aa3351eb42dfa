//! Authenticated user views
//!
//! `Profile` is the slice of the users row carried through `ClientCtx` for
//! the duration of a request. Anything needing the password hash works
//! with the full entity model instead.

use crate::orm::users;
use sea_orm::{entity::*, query::*, DatabaseConnection};

/// A user as seen by templates and access checks.
#[derive(Clone, Debug)]
pub struct Profile {
    pub id: i32,
    pub name: String,
    pub created_at: chrono::NaiveDateTime,
}

impl From<users::Model> for Profile {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            name: model.username,
            created_at: model.created_at,
        }
    }
}

impl Profile {
    pub async fn get_by_id(
        db: &DatabaseConnection,
        id: i32,
    ) -> Result<Option<Self>, sea_orm::DbErr> {
        Ok(users::Entity::find_by_id(id)
            .one(db)
            .await?
            .map(Profile::from))
    }
}

/// Full user row by exact username, for credential verification.
pub async fn get_user_by_name(
    db: &DatabaseConnection,
    name: &str,
) -> Result<Option<users::Model>, sea_orm::DbErr> {
    users::Entity::find()
        .filter(users::Column::Username.eq(name))
        .one(db)
        .await
}
