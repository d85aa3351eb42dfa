//! Ticket detail page and its mutations.

use super::{first_validation_message, redirect, ticket_error};
use crate::attachment::display_name;
use crate::db::get_db_pool;
use crate::middleware::csrf::validate_csrf_token;
use crate::middleware::ClientCtx;
use crate::orm::tickets::TicketStatus;
use crate::orm::{departments, users};
use crate::storage::{get_storage, StorageError};
use crate::tickets::{self, TicketDetail, TicketUpdate};
use actix_session::Session;
use actix_web::http::header;
use actix_web::{error, get, post, web, Error, HttpResponse, Responder};
use askama::Template;
use askama_actix::TemplateToResponse;
use chrono::NaiveDateTime;
use sea_orm::{entity::*, query::*, DatabaseConnection};
use serde::Deserialize;
use std::collections::HashMap;
use validator::Validate;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_ticket)
        .service(update_ticket)
        .service(create_comment)
        .service(view_attachment);
}

/// One row in a ticket queue. Shared by the student, agent, and manager
/// list pages.
pub struct TicketRow {
    pub id: i32,
    pub ticket_id: String,
    pub subject: String,
    pub status: &'static str,
    pub department: String,
    pub student: String,
    pub agent: Option<String>,
    pub created_at: NaiveDateTime,
}

/// Resolve the names a queue page displays, in two batched lookups
/// instead of one pair per row.
pub(super) async fn build_ticket_rows(
    db: &DatabaseConnection,
    rows: Vec<crate::orm::tickets::Model>,
) -> Result<Vec<TicketRow>, Error> {
    let mut user_ids: Vec<i32> = Vec::new();
    let mut department_ids: Vec<i32> = Vec::new();
    for ticket in &rows {
        user_ids.push(ticket.student_id);
        if let Some(agent_id) = ticket.assigned_agent_id {
            user_ids.push(agent_id);
        }
        department_ids.push(ticket.department_id);
    }
    user_ids.sort_unstable();
    user_ids.dedup();
    department_ids.sort_unstable();
    department_ids.dedup();

    let usernames: HashMap<i32, String> = if user_ids.is_empty() {
        HashMap::new()
    } else {
        users::Entity::find()
            .filter(users::Column::Id.is_in(user_ids))
            .all(db)
            .await
            .map_err(error::ErrorInternalServerError)?
            .into_iter()
            .map(|user| (user.id, user.username))
            .collect()
    };

    let department_names: HashMap<i32, String> = if department_ids.is_empty() {
        HashMap::new()
    } else {
        departments::Entity::find()
            .filter(departments::Column::Id.is_in(department_ids))
            .all(db)
            .await
            .map_err(error::ErrorInternalServerError)?
            .into_iter()
            .map(|department| (department.id, department.name))
            .collect()
    };

    Ok(rows
        .into_iter()
        .map(|ticket| TicketRow {
            id: ticket.id,
            ticket_id: ticket.ticket_id,
            subject: ticket.subject,
            status: ticket.status.label(),
            department: department_names
                .get(&ticket.department_id)
                .cloned()
                .unwrap_or_else(|| "Unknown".to_owned()),
            student: usernames
                .get(&ticket.student_id)
                .cloned()
                .unwrap_or_else(|| "Unknown".to_owned()),
            agent: ticket
                .assigned_agent_id
                .and_then(|id| usernames.get(&id).cloned()),
            created_at: ticket.created_at,
        })
        .collect())
}

struct TicketView {
    id: i32,
    ticket_id: String,
    subject: String,
    description: String,
    status: &'static str,
    department: String,
    student: String,
    agent: Option<String>,
    internal_notes: String,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

struct CommentView {
    author: String,
    message: String,
    is_internal: bool,
    created_at: NaiveDateTime,
}

struct AttachmentView {
    id: i32,
    filename: String,
}

struct SelectOption {
    id: i32,
    name: String,
    selected: bool,
}

struct StatusOption {
    value: &'static str,
    label: &'static str,
    selected: bool,
}

#[derive(Template)]
#[template(path = "tickets/detail.html")]
struct TicketDetailTemplate {
    client: ClientCtx,
    ticket: TicketView,
    comments: Vec<CommentView>,
    attachments: Vec<AttachmentView>,
    statuses: Vec<StatusOption>,
    departments: Vec<SelectOption>,
    agents: Vec<SelectOption>,
}

#[get("/tickets/{ticket_id}/")]
async fn view_ticket(client: ClientCtx, path: web::Path<i32>) -> Result<impl Responder, Error> {
    let requester = client.require_requester()?;
    let db = get_db_pool();

    let TicketDetail {
        ticket,
        comments,
        attachments,
        assignable_agents,
    } = tickets::get_detail(db, &requester, path.into_inner())
        .await
        .map_err(ticket_error)?;

    let department = departments::Entity::find_by_id(ticket.department_id)
        .one(db)
        .await
        .map_err(error::ErrorInternalServerError)?
        .map(|department| department.name)
        .unwrap_or_else(|| "Unknown".to_owned());

    let student = users::Entity::find_by_id(ticket.student_id)
        .one(db)
        .await
        .map_err(error::ErrorInternalServerError)?
        .map(|user| user.username)
        .unwrap_or_else(|| "Unknown".to_owned());

    let agent = match ticket.assigned_agent_id {
        Some(agent_id) => users::Entity::find_by_id(agent_id)
            .one(db)
            .await
            .map_err(error::ErrorInternalServerError)?
            .map(|user| user.username),
        None => None,
    };

    let statuses = TicketStatus::ALL
        .iter()
        .map(|status| StatusOption {
            value: status.as_str(),
            label: status.label(),
            selected: *status == ticket.status,
        })
        .collect();

    // The full edit form is rendered for managers only, so the selects
    // stay empty for everyone else.
    let department_options = if client.is_manager() {
        departments::Entity::find()
            .order_by_asc(departments::Column::Name)
            .all(db)
            .await
            .map_err(error::ErrorInternalServerError)?
            .into_iter()
            .map(|d| SelectOption {
                selected: d.id == ticket.department_id,
                id: d.id,
                name: d.name,
            })
            .collect()
    } else {
        Vec::new()
    };

    let agent_options = assignable_agents
        .into_iter()
        .map(|user| SelectOption {
            selected: ticket.assigned_agent_id == Some(user.id),
            id: user.id,
            name: user.username,
        })
        .collect();

    let comments = comments
        .into_iter()
        .map(|(comment, author)| CommentView {
            author: author
                .map(|user| user.username)
                .unwrap_or_else(|| "Deleted user".to_owned()),
            message: comment.message,
            is_internal: comment.is_internal,
            created_at: comment.created_at,
        })
        .collect();

    let attachments = attachments
        .into_iter()
        .map(|attachment| AttachmentView {
            id: attachment.id,
            filename: display_name(&attachment.file_path).to_owned(),
        })
        .collect();

    Ok(TicketDetailTemplate {
        client,
        ticket: TicketView {
            id: ticket.id,
            ticket_id: ticket.ticket_id,
            subject: ticket.subject,
            description: ticket.description,
            status: ticket.status.label(),
            department,
            student,
            agent,
            internal_notes: ticket.internal_notes,
            created_at: ticket.created_at,
            updated_at: ticket.updated_at,
        },
        comments,
        attachments,
        statuses,
        departments: department_options,
        agents: agent_options,
    }
    .to_response())
}

#[derive(Deserialize, Validate)]
pub struct UpdateTicketForm {
    csrf_token: String,
    #[validate(length(
        min = 1,
        max = 200,
        message = "Subject must be between 1 and 200 characters."
    ))]
    subject: Option<String>,
    #[validate(length(min = 1, message = "Description cannot be empty."))]
    description: Option<String>,
    department: Option<i32>,
    /// Agent user id as text; an empty string clears the assignment.
    assigned_agent: Option<String>,
    status: Option<String>,
    internal_notes: Option<String>,
}

/// Partial ticket update. The manager form posts every field; the agent
/// form posts only status and internal notes. Field-level policy is
/// enforced by the lifecycle service against the fresh row.
#[post("/tickets/{ticket_id}/update/")]
async fn update_ticket(
    client: ClientCtx,
    session: Session,
    path: web::Path<i32>,
    form: web::Form<UpdateTicketForm>,
) -> Result<impl Responder, Error> {
    let requester = client.require_requester()?;
    validate_csrf_token(&session, &form.csrf_token)?;

    form.validate()
        .map_err(|errors| error::ErrorBadRequest(first_validation_message(&errors)))?;

    let form = form.into_inner();

    let status = match form.status.as_deref() {
        Some(value) => Some(
            TicketStatus::from_form_value(value)
                .ok_or_else(|| error::ErrorBadRequest("Select a valid status."))?,
        ),
        None => None,
    };

    let assigned_agent_id = match form.assigned_agent.as_deref() {
        None => None,
        Some("") => Some(None),
        Some(raw) => Some(Some(raw.parse::<i32>().map_err(|_| {
            error::ErrorBadRequest("Select a valid agent.")
        })?)),
    };

    let ticket_pk = path.into_inner();
    tickets::update_ticket(
        get_db_pool(),
        &requester,
        ticket_pk,
        TicketUpdate {
            subject: form.subject,
            description: form.description,
            department_id: form.department,
            assigned_agent_id,
            status,
            internal_notes: form.internal_notes,
        },
    )
    .await
    .map_err(ticket_error)?;

    Ok(redirect(&format!("/tickets/{}/", ticket_pk)))
}

#[derive(Deserialize)]
pub struct CommentForm {
    csrf_token: String,
    message: String,
    /// Checkbox; present means requested. Students never get internal
    /// comments persisted whatever this says.
    is_internal: Option<String>,
}

#[post("/tickets/{ticket_id}/comment/")]
async fn create_comment(
    client: ClientCtx,
    session: Session,
    path: web::Path<i32>,
    form: web::Form<CommentForm>,
) -> Result<impl Responder, Error> {
    let requester = client.require_requester()?;
    validate_csrf_token(&session, &form.csrf_token)?;

    let ticket_pk = path.into_inner();
    tickets::add_comment(
        get_db_pool(),
        &requester,
        ticket_pk,
        &form.message,
        form.is_internal.is_some(),
    )
    .await
    .map_err(ticket_error)?;

    Ok(redirect(&format!("/tickets/{}/", ticket_pk)))
}

/// Streams an attachment to any caller who may view its ticket.
#[get("/tickets/{ticket_id}/attachments/{attachment_id}/")]
async fn view_attachment(
    client: ClientCtx,
    path: web::Path<(i32, i32)>,
) -> Result<HttpResponse, Error> {
    let requester = client.require_requester()?;
    let (ticket_pk, attachment_id) = path.into_inner();

    let attachment = tickets::get_attachment(get_db_pool(), &requester, ticket_pk, attachment_id)
        .await
        .map_err(ticket_error)?;

    let object = get_storage()
        .get_object(&attachment.file_path)
        .await
        .map_err(|err| match err {
            StorageError::NotFound(_) => error::ErrorNotFound("Attachment not found."),
            other => {
                log::error!("Attachment {} unreadable: {}", attachment.file_path, other);
                error::ErrorInternalServerError("Storage error.")
            }
        })?;

    let mut builder = HttpResponse::Ok();
    builder.insert_header((
        header::CONTENT_DISPOSITION,
        format!(
            "inline; filename=\"{}\"",
            display_name(&attachment.file_path)
        ),
    ));
    if let Some(content_type) = object.content_type {
        builder.content_type(content_type);
    }
    if let Some(length) = object.content_length {
        builder.no_chunking(length as u64);
    }

    Ok(builder.streaming(object.body))
}
