//! Session and credential management
//!
//! Sessions live in the database and are mirrored in an in-memory map so
//! request authentication never waits on a query. The cookie layer only
//! stores the session UUID under the `token` key; everything else is
//! resolved server side.

use crate::db::get_db_pool;
use crate::orm::sessions;
use crate::user::Profile;
use actix_session::Session;
use argon2::Argon2;
use chrono::{NaiveDateTime, Utc};
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use sea_orm::{entity::*, query::*, ColumnTrait, DatabaseConnection, DbErr};
use sea_orm::prelude::Uuid;

/// Cached session row.
#[derive(Copy, Clone, Debug)]
pub struct SessionRecord {
    pub user_id: i32,
    pub expires_at: NaiveDateTime,
}

static SESSIONS: OnceCell<DashMap<Uuid, SessionRecord>> = OnceCell::new();
static ARGON2_SECRET: OnceCell<String> = OnceCell::new();
static ARGON2: OnceCell<Argon2<'static>> = OnceCell::new();

/// Warm the statics and log how the hasher is keyed. Called once at boot;
/// everything here is also safe to reach lazily from tests.
pub fn init() {
    if std::env::var("SALT").unwrap_or_default().is_empty() {
        log::warn!("SALT is unset; passwords are hashed without a pepper");
    }
    let _ = get_argon2();
    let _ = get_session_store();
}

/// The Argon2 instance used for hashing and verifying every password.
/// Keyed with the SALT environment secret when one is provided.
pub fn get_argon2() -> &'static Argon2<'static> {
    ARGON2.get_or_init(|| {
        let secret = ARGON2_SECRET.get_or_init(|| std::env::var("SALT").unwrap_or_default());
        if secret.is_empty() {
            Argon2::default()
        } else {
            Argon2::new_with_secret(
                secret.as_bytes(),
                argon2::Algorithm::Argon2id,
                argon2::Version::V0x13,
                argon2::Params::default(),
            )
            .expect("SALT secret rejected by argon2")
        }
    })
}

fn get_session_store() -> &'static DashMap<Uuid, SessionRecord> {
    SESSIONS.get_or_init(DashMap::new)
}

fn session_lifetime() -> chrono::Duration {
    chrono::Duration::minutes(crate::app_config::security().session_timeout_minutes as i64)
}

/// Load unexpired sessions into the cache and clear out expired rows.
/// Returns the number of live sessions.
pub async fn load_sessions(db: &DatabaseConnection) -> Result<usize, DbErr> {
    let now = Utc::now().naive_utc();
    let store = get_session_store();

    sessions::Entity::delete_many()
        .filter(sessions::Column::ExpiresAt.lte(now))
        .exec(db)
        .await?;

    let rows = sessions::Entity::find().all(db).await?;
    let count = rows.len();
    for row in rows {
        store.insert(
            row.id,
            SessionRecord {
                user_id: row.user_id,
                expires_at: row.expires_at,
            },
        );
    }

    Ok(count)
}

/// Create a session for the user and return its token.
pub async fn new_session(db: &DatabaseConnection, user_id: i32) -> Result<Uuid, DbErr> {
    let id = Uuid::new_v4();
    let expires_at = Utc::now().naive_utc() + session_lifetime();

    sessions::ActiveModel {
        id: Set(id),
        user_id: Set(user_id),
        expires_at: Set(expires_at),
    }
    .insert(db)
    .await?;

    get_session_store().insert(
        id,
        SessionRecord {
            user_id,
            expires_at,
        },
    );

    Ok(id)
}

/// Look a token up in the cache, expiring it on the spot if stale.
pub fn authenticate_by_uuid(id: &Uuid) -> Option<SessionRecord> {
    let store = get_session_store();
    let record = store.get(id).map(|r| *r.value())?;

    if record.expires_at <= Utc::now().naive_utc() {
        store.remove(id);
        return None;
    }

    Some(record)
}

/// Resolve the request's cookie session to a user profile, or None for
/// guests, bad tokens, and expired sessions.
pub async fn authenticate_client_by_session(session: &Session) -> Option<Profile> {
    let token = match session.get::<String>("token") {
        Ok(Some(token)) => token,
        Ok(None) => return None,
        Err(err) => {
            log::debug!("Unreadable session cookie: {}", err);
            return None;
        }
    };

    let uuid = match Uuid::parse_str(&token) {
        Ok(uuid) => uuid,
        Err(_) => return None,
    };

    let record = authenticate_by_uuid(&uuid)?;

    match Profile::get_by_id(get_db_pool(), record.user_id).await {
        Ok(profile) => profile,
        Err(err) => {
            log::error!("Failed to load profile for session {}: {}", uuid, err);
            None
        }
    }
}

/// Delete a session everywhere. Returns true if a row existed.
pub async fn remove_session(db: &DatabaseConnection, id: Uuid) -> Result<bool, DbErr> {
    get_session_store().remove(&id);

    let result = sessions::Entity::delete_by_id(id).exec(db).await?;
    Ok(result.rows_affected > 0)
}
