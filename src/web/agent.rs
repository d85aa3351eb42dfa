//! Support agent queue.

use super::ticket::{build_ticket_rows, TicketRow};
use super::ticket_error;
use crate::db::get_db_pool;
use crate::middleware::ClientCtx;
use crate::tickets;
use actix_web::{get, Error, Responder};
use askama::Template;
use askama_actix::TemplateToResponse;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_agent_tickets);
}

#[derive(Template)]
#[template(path = "tickets/agent_list.html")]
pub struct AgentTicketListTemplate {
    pub client: ClientCtx,
    pub tickets: Vec<TicketRow>,
}

/// Tickets assigned to the signed-in agent, newest first.
#[get("/tickets/agent/")]
async fn view_agent_tickets(client: ClientCtx) -> Result<impl Responder, Error> {
    let requester = client.require_requester()?;
    let db = get_db_pool();

    let rows = tickets::list_for_agent(db, &requester)
        .await
        .map_err(ticket_error)?;
    let tickets = build_ticket_rows(db, rows).await?;

    Ok(AgentTicketListTemplate { client, tickets }.to_response())
}
