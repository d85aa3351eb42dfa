pub mod agent;
pub mod error;
pub mod index;
pub mod login;
pub mod logout;
pub mod manager;
pub mod student;
pub mod ticket;

use crate::tickets::TicketError;
use actix_web::http::header;
use actix_web::{error as web_error, Error, HttpResponse};

/// Configures the web app by adding services from each web file.
///
/// @see https://docs.rs/actix-web/4.0.1/actix_web/struct.App.html#method.configure
pub fn configure(conf: &mut actix_web::web::ServiceConfig) {
    // Descending order. Order is important.
    // Route resolution will stop at the first match.
    index::configure(conf);
    login::configure(conf);
    logout::configure(conf);
    student::configure(conf);
    agent::configure(conf);
    manager::configure(conf);
    ticket::configure(conf);
}

/// 302 redirect to another route.
pub(super) fn redirect(to: &str) -> HttpResponse {
    HttpResponse::Found()
        .append_header((header::LOCATION, to))
        .finish()
}

/// Maps a ticket service failure onto the HTTP status the client sees.
///
/// Validation problems are the caller's fault (400), denials carry the policy
/// message (403), and anything the database or storage coughed up is logged
/// and reduced to a plain 500.
pub(super) fn ticket_error(err: TicketError) -> Error {
    match err {
        TicketError::Validation(rule) => web_error::ErrorBadRequest(rule),
        TicketError::AccessDenied(msg) => {
            log::warn!("Ticket access denied: {}", msg);
            web_error::ErrorForbidden(msg)
        }
        TicketError::NotFound(what) => web_error::ErrorNotFound(what),
        TicketError::Integrity(err) => {
            log::error!("Ticket operation rejected by the database: {}", err);
            web_error::ErrorInternalServerError("The database rejected the operation.")
        }
        TicketError::Db(err) => {
            log::error!("Ticket operation failed: {}", err);
            web_error::ErrorInternalServerError("Database error.")
        }
        TicketError::Storage(err) => {
            log::error!("Attachment storage failed: {}", err);
            web_error::ErrorInternalServerError("Storage error.")
        }
    }
}

/// First human-readable message out of a `validator` failure.
pub(super) fn first_validation_message(errors: &validator::ValidationErrors) -> String {
    errors
        .field_errors()
        .values()
        .flat_map(|errors| errors.iter())
        .filter_map(|error| error.message.as_ref().map(|message| message.to_string()))
        .next()
        .unwrap_or_else(|| "Invalid form input.".to_owned())
}
