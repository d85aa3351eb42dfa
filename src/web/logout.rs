use crate::db::get_db_pool;
use crate::middleware::ClientCtx;
use crate::session::remove_session;
use actix_web::{get, Error, Responder};
use askama::Template;
use askama_actix::TemplateToResponse;
use sea_orm::prelude::Uuid;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_logout);
}

#[derive(Template)]
#[template(path = "logout.html")]
struct LogoutTemplate {
    client: ClientCtx,
}

#[get("/logout")]
pub async fn view_logout(cookies: actix_session::Session) -> Result<impl Responder, Error> {
    // Remove session from database and session cache
    match cookies.get::<String>("token") {
        Ok(Some(uuid)) => match Uuid::parse_str(&uuid) {
            Ok(uuid) => {
                if let Err(e) = remove_session(get_db_pool(), uuid).await {
                    log::error!("view_logout: remove_session() {}", e);
                }
            }
            Err(e) => {
                log::error!("view_logout: parse_str() {}", e);
            }
        },
        Ok(None) => {
            log::debug!("view_logout: missing token (already logged out?)");
        }
        Err(e) => {
            log::error!("view_logout: cookies.get() {}", e);
        }
    }

    // Remove session cookies
    cookies.remove("logged_in");
    cookies.remove("token");

    // Re-resolve the context so the page renders as a guest
    let guest_client = ClientCtx::from_session(&cookies).await;

    Ok(LogoutTemplate {
        client: guest_client,
    }
    .to_response())
}
