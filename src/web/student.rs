//! Student queue and the ticket submission form.

use super::ticket::{build_ticket_rows, TicketRow};
use super::{first_validation_message, redirect, ticket_error};
use crate::attachment::{max_attachment_bytes, UploadedFile};
use crate::db::get_db_pool;
use crate::middleware::csrf::validate_csrf_token;
use crate::middleware::ClientCtx;
use crate::orm::departments;
use crate::tickets::{self, NewTicket, TicketError};
use actix_multipart::{Field, Multipart};
use actix_web::{error, get, post, Error, HttpResponse, Responder};
use askama::Template;
use askama_actix::TemplateToResponse;
use futures::{StreamExt, TryStreamExt};
use sea_orm::{entity::*, query::*};
use validator::Validate;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_student_tickets)
        .service(view_ticket_create)
        .service(create_ticket);
}

#[derive(Template)]
#[template(path = "tickets/student_list.html")]
pub struct StudentTicketListTemplate {
    pub client: ClientCtx,
    pub tickets: Vec<TicketRow>,
}

/// The requester's own tickets, newest first. Open to any signed-in
/// account; an agent's or manager's personal tickets live here too.
#[get("/tickets/student/")]
async fn view_student_tickets(client: ClientCtx) -> Result<impl Responder, Error> {
    let requester = client.require_requester()?;
    let db = get_db_pool();

    let rows = tickets::list_for_student(db, &requester)
        .await
        .map_err(ticket_error)?;
    let tickets = build_ticket_rows(db, rows).await?;

    Ok(StudentTicketListTemplate { client, tickets }.to_response())
}

struct DepartmentOption {
    id: i32,
    name: String,
    selected: bool,
}

#[derive(Template)]
#[template(path = "tickets/create.html")]
struct TicketCreateTemplate {
    client: ClientCtx,
    departments: Vec<DepartmentOption>,
    error: Option<String>,
    subject: String,
    description: String,
}

async fn render_create_form(
    client: ClientCtx,
    error: Option<String>,
    subject: String,
    description: String,
    selected_department: Option<i32>,
) -> Result<HttpResponse, Error> {
    let departments = departments::Entity::find()
        .order_by_asc(departments::Column::Name)
        .all(get_db_pool())
        .await
        .map_err(error::ErrorInternalServerError)?
        .into_iter()
        .map(|d| DepartmentOption {
            selected: selected_department == Some(d.id),
            id: d.id,
            name: d.name,
        })
        .collect();

    Ok(TicketCreateTemplate {
        client,
        departments,
        error,
        subject,
        description,
    }
    .to_response())
}

#[get("/tickets/create/")]
async fn view_ticket_create(client: ClientCtx) -> Result<HttpResponse, Error> {
    client.require_login()?;
    render_create_form(client, None, String::new(), String::new(), None).await
}

/// Streams a text field to an owned string.
async fn read_text(field: &mut Field) -> Result<String, Error> {
    let mut buf: Vec<u8> = Vec::with_capacity(65536);
    while let Some(chunk) = field.next().await {
        let bytes = chunk.map_err(|e| {
            log::error!("create_ticket: multipart read error: {}", e);
            error::ErrorBadRequest("Error interpreting user input.")
        })?;
        buf.extend_from_slice(&bytes);
    }
    String::from_utf8(buf).map_err(|_| error::ErrorBadRequest("Form text was not valid UTF-8."))
}

/// Buffers a file field. At most one chunk past the attachment size cap
/// is kept, so an oversize upload still trips the size rule without the
/// whole stream sitting in memory.
async fn read_file(field: &mut Field) -> Result<Vec<u8>, Error> {
    let cap = max_attachment_bytes();
    let mut buf: Vec<u8> = Vec::new();
    while let Some(chunk) = field.next().await {
        let bytes = chunk.map_err(|e| {
            log::error!("create_ticket: multipart read error: {}", e);
            error::ErrorBadRequest("Error interpreting user input.")
        })?;
        if buf.len() <= cap {
            buf.extend_from_slice(&bytes);
        }
    }
    Ok(buf)
}

#[derive(Validate)]
struct CreateTicketForm {
    #[validate(length(
        min = 1,
        max = 200,
        message = "Subject must be between 1 and 200 characters."
    ))]
    subject: String,
    #[validate(length(min = 1, message = "Description cannot be empty."))]
    description: String,
}

/// Multipart submission: text fields plus zero or more attachments.
///
/// Validation failures re-render the form with the submitted values and
/// the violated rule; nothing is written in that case, not a ticket row,
/// not an attachment row, not a stored file.
#[post("/tickets/create/")]
async fn create_ticket(
    client: ClientCtx,
    cookies: actix_session::Session,
    multipart: Option<Multipart>,
) -> Result<HttpResponse, Error> {
    let requester = client.require_requester()?;

    let mut csrf_token: Option<String> = None;
    let mut subject = String::new();
    let mut description = String::new();
    let mut department_raw = String::new();
    let mut files: Vec<UploadedFile> = Vec::new();

    // Interpret user input, iterating over the multipart stream.
    if let Some(mut fields) = multipart {
        while let Ok(Some(mut field)) = fields.try_next().await {
            if let Some(field_name) = field.content_disposition().get_name() {
                match field_name {
                    "csrf_token" => csrf_token = Some(read_text(&mut field).await?),
                    "subject" => subject = read_text(&mut field).await?,
                    "description" => description = read_text(&mut field).await?,
                    "department" => department_raw = read_text(&mut field).await?,
                    "attachments" => {
                        let filename = field
                            .content_disposition()
                            .get_filename()
                            .map(str::to_owned)
                            .unwrap_or_default();
                        let content_type = field
                            .content_type()
                            .map(|mime| mime.essence_str().to_owned())
                            .unwrap_or_default();
                        let data = read_file(&mut field).await?;

                        // A file input submitted without a selection
                        // arrives as one empty part; it is not an upload.
                        if filename.is_empty() && data.is_empty() {
                            continue;
                        }

                        files.push(UploadedFile {
                            filename,
                            content_type,
                            data,
                        });
                    }
                    _ => {
                        return Err(error::ErrorBadRequest(format!(
                            "Unrecognized field '{}'",
                            field_name,
                        )));
                    }
                }
            }
        }
    }

    let token = csrf_token.ok_or_else(|| error::ErrorBadRequest("CSRF token missing"))?;
    validate_csrf_token(&cookies, &token)?;

    let form = CreateTicketForm {
        subject: subject.trim().to_owned(),
        description: description.trim().to_owned(),
    };
    if let Err(errors) = form.validate() {
        return render_create_form(
            client,
            Some(first_validation_message(&errors)),
            form.subject,
            form.description,
            department_raw.trim().parse().ok(),
        )
        .await;
    }

    let department_id = match department_raw.trim().parse::<i32>() {
        Ok(id) => id,
        Err(_) => {
            return render_create_form(
                client,
                Some("Select a valid department.".to_owned()),
                form.subject,
                form.description,
                None,
            )
            .await;
        }
    };

    let created = tickets::create_ticket(
        get_db_pool(),
        &requester,
        NewTicket {
            department_id,
            subject: form.subject.clone(),
            description: form.description.clone(),
        },
        files,
    )
    .await;

    match created {
        Ok(ticket) => Ok(redirect(&format!("/tickets/{}/", ticket.id))),
        Err(TicketError::Validation(rule)) => {
            render_create_form(
                client,
                Some(rule),
                form.subject,
                form.description,
                Some(department_id),
            )
            .await
        }
        Err(other) => Err(ticket_error(other)),
    }
}
