//! Manager queue, assignment, and duplication.

use super::ticket::{build_ticket_rows, TicketRow};
use super::{redirect, ticket_error};
use crate::db::get_db_pool;
use crate::group::{users_in_group, GROUP_SUPPORT_AGENT};
use crate::middleware::csrf::validate_csrf_token;
use crate::middleware::ClientCtx;
use crate::tickets;
use actix_session::Session;
use actix_web::{error, get, post, web, Error, HttpResponse, Responder};
use askama::Template;
use askama_actix::TemplateToResponse;
use sea_orm::EntityTrait;
use serde::Deserialize;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_manager_tickets)
        .service(view_assign_form)
        .service(assign_ticket)
        .service(duplicate_ticket);
}

#[derive(Template)]
#[template(path = "tickets/manager_list.html")]
pub struct ManagerTicketListTemplate {
    pub client: ClientCtx,
    pub tickets: Vec<TicketRow>,
}

/// Every ticket in the system, newest first.
#[get("/tickets/manager/")]
async fn view_manager_tickets(client: ClientCtx) -> Result<impl Responder, Error> {
    let requester = client.require_requester()?;
    let db = get_db_pool();

    let rows = tickets::list_all(db, &requester)
        .await
        .map_err(ticket_error)?;
    let tickets = build_ticket_rows(db, rows).await?;

    Ok(ManagerTicketListTemplate { client, tickets }.to_response())
}

struct AgentOption {
    id: i32,
    username: String,
    selected: bool,
}

#[derive(Template)]
#[template(path = "tickets/assign.html")]
struct AssignTicketTemplate {
    client: ClientCtx,
    ticket_pk: i32,
    ticket_id: String,
    subject: String,
    agents: Vec<AgentOption>,
}

#[get("/tickets/manager/{ticket_id}/assign/")]
async fn view_assign_form(client: ClientCtx, path: web::Path<i32>) -> Result<impl Responder, Error> {
    client.require_manager()?;
    let db = get_db_pool();

    let ticket = crate::orm::tickets::Entity::find_by_id(path.into_inner())
        .one(db)
        .await
        .map_err(error::ErrorInternalServerError)?
        .ok_or_else(|| error::ErrorNotFound("Ticket not found."))?;

    let agents = users_in_group(db, GROUP_SUPPORT_AGENT)
        .await
        .map_err(error::ErrorInternalServerError)?
        .into_iter()
        .map(|user| AgentOption {
            selected: ticket.assigned_agent_id == Some(user.id),
            id: user.id,
            username: user.username,
        })
        .collect();

    Ok(AssignTicketTemplate {
        client,
        ticket_pk: ticket.id,
        ticket_id: ticket.ticket_id,
        subject: ticket.subject,
        agents,
    }
    .to_response())
}

#[derive(Deserialize)]
pub struct AssignFormData {
    csrf_token: String,
    agent: i32,
}

/// Hands the ticket to an agent. Assignment always moves the ticket to
/// In Progress, whatever state it was in.
#[post("/tickets/manager/{ticket_id}/assign/")]
async fn assign_ticket(
    client: ClientCtx,
    session: Session,
    path: web::Path<i32>,
    form: web::Form<AssignFormData>,
) -> Result<impl Responder, Error> {
    let requester = client.require_requester()?;
    validate_csrf_token(&session, &form.csrf_token)?;

    let ticket_pk = path.into_inner();
    tickets::assign_ticket(get_db_pool(), &requester, ticket_pk, form.agent)
        .await
        .map_err(ticket_error)?;

    Ok(redirect(&format!("/tickets/{}/", ticket_pk)))
}

#[derive(Deserialize)]
pub struct DuplicateFormData {
    csrf_token: String,
}

/// Clones a ticket for fan-out to a second department or agent. The copy
/// lands on its own detail page.
#[post("/tickets/manager/{ticket_id}/duplicate/")]
async fn duplicate_ticket(
    client: ClientCtx,
    session: Session,
    path: web::Path<i32>,
    form: web::Form<DuplicateFormData>,
) -> Result<impl Responder, Error> {
    let requester = client.require_requester()?;
    validate_csrf_token(&session, &form.csrf_token)?;

    let copy = tickets::duplicate_ticket(get_db_pool(), &requester, path.into_inner())
        .await
        .map_err(ticket_error)?;

    Ok(redirect(&format!("/tickets/{}/", copy.id)))
}
