use super::redirect;
use crate::middleware::ClientCtx;
use crate::role::Role;
use actix_web::{get, Responder};

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_index);
}

/// Sends each visitor to the queue for their role.
#[get("/")]
async fn view_index(client: ClientCtx) -> impl Responder {
    if !client.is_user() {
        return redirect("/login");
    }

    match client.role() {
        Role::Manager => redirect("/tickets/manager/"),
        Role::Agent => redirect("/tickets/agent/"),
        Role::Student => redirect("/tickets/student/"),
    }
}
