//! HTML pages for error responses.

use actix_web::dev::ServiceResponse;
use actix_web::middleware::ErrorHandlerResponse;
use actix_web::{HttpResponse, Result};
use askama::Template;

#[derive(Template)]
#[template(path = "error.html")]
struct ErrorTemplate<'a> {
    code: u16,
    title: &'a str,
    message: String,
}

/// Replaces a plain-text error response with the rendered error page.
/// The original error's message is preserved so policy denials read the
/// same in the browser as they do in tests.
fn render_error<B>(res: ServiceResponse<B>, title: &str) -> Result<ErrorHandlerResponse<B>> {
    let status = res.status();
    let message = res
        .response()
        .error()
        .map(|err| err.to_string())
        .unwrap_or_else(|| title.to_owned());

    let page = ErrorTemplate {
        code: status.as_u16(),
        title,
        message,
    }
    .render()
    .unwrap_or_else(|_| title.to_owned());

    let (req, _) = res.into_parts();
    let response = HttpResponse::build(status)
        .content_type("text/html; charset=utf-8")
        .body(page);

    Ok(ErrorHandlerResponse::Response(
        ServiceResponse::new(req, response).map_into_right_body(),
    ))
}

pub fn render_400<B>(res: ServiceResponse<B>) -> Result<ErrorHandlerResponse<B>> {
    render_error(res, "Bad Request")
}

pub fn render_404<B>(res: ServiceResponse<B>) -> Result<ErrorHandlerResponse<B>> {
    render_error(res, "Not Found")
}

pub fn render_500<B>(res: ServiceResponse<B>) -> Result<ErrorHandlerResponse<B>> {
    render_error(res, "Internal Server Error")
}
