use super::redirect;
use crate::db::get_db_pool;
use crate::middleware::ClientCtx;
use crate::session::{self, get_argon2};
use crate::user::get_user_by_name;
use actix_web::{error, get, post, web, Error, Responder};
use argon2::password_hash::{PasswordHash, PasswordVerifier};
use askama::Template;
use askama_actix::TemplateToResponse;
use sea_orm::{DatabaseConnection, DbErr};
use serde::Deserialize;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(post_login).service(view_login);
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub client: ClientCtx,
}

#[derive(Deserialize)]
pub struct FormData {
    username: String,
    password: String,
}

#[derive(Debug)]
pub enum LoginResultStatus {
    Success,
    BadName,
    BadPassword,
}

pub struct LoginResult {
    pub result: LoginResultStatus,
    pub user_id: Option<i32>,
}

impl LoginResult {
    fn success(user_id: i32) -> Self {
        Self {
            result: LoginResultStatus::Success,
            user_id: Some(user_id),
        }
    }
    fn fail(result: LoginResultStatus) -> Self {
        Self {
            result,
            user_id: None,
        }
    }
}

/// Verify a username and password against the stored argon2 hash.
/// Surrounding whitespace on the username is ignored.
pub async fn login(
    db: &DatabaseConnection,
    name: &str,
    pass: &str,
) -> Result<LoginResult, DbErr> {
    let user = match get_user_by_name(db, name.trim()).await? {
        Some(user) => user,
        None => return Ok(LoginResult::fail(LoginResultStatus::BadName)),
    };

    let parsed_hash = PasswordHash::new(&user.password)
        .map_err(|e| DbErr::Custom(format!("Stored password hash is unreadable: {}", e)))?;

    if get_argon2()
        .verify_password(pass.as_bytes(), &parsed_hash)
        .is_err()
    {
        return Ok(LoginResult::fail(LoginResultStatus::BadPassword));
    }

    Ok(LoginResult::success(user.id))
}

#[post("/login")]
pub async fn post_login(
    cookies: actix_session::Session,
    form: web::Form<FormData>,
) -> Result<impl Responder, Error> {
    let result = login(get_db_pool(), &form.username, &form.password)
        .await
        .map_err(|e| {
            log::error!("login failed: {:?}", e);
            error::ErrorInternalServerError("DB error")
        })?;

    let user_id = match result.result {
        LoginResultStatus::Success => result.user_id.ok_or_else(|| {
            error::ErrorInternalServerError("login succeeded without a user id")
        })?,
        LoginResultStatus::BadName | LoginResultStatus::BadPassword => {
            log::debug!("login failure: {:?} for {}", result.result, form.username);
            // Use generic message to avoid username enumeration
            return Err(error::ErrorUnauthorized("Invalid username or password."));
        }
    };

    let uuid = session::new_session(get_db_pool(), user_id)
        .await
        .map_err(|e| {
            log::error!("session creation failed: {:?}", e);
            error::ErrorInternalServerError("DB error")
        })?
        .to_string();

    cookies
        .insert("logged_in", true)
        .map_err(|_| error::ErrorInternalServerError("middleware error"))?;

    cookies
        .insert("token", uuid)
        .map_err(|_| error::ErrorInternalServerError("middleware error"))?;

    // The role landing redirect sorts out which queue to show.
    Ok(redirect("/"))
}

#[get("/login")]
pub async fn view_login(client: ClientCtx) -> Result<impl Responder, Error> {
    Ok(LoginTemplate { client }.to_response())
}
