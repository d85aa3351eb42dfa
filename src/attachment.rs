//! Attachment ingestion rules
//!
//! Every uploaded file is checked against the content-type allow list and
//! the size cap before any row is written; one bad file aborts the whole
//! submission. The stored key is `tickets/{ticket_id}/{filename}` with the
//! filename reduced to a safe basename.

use crate::constants::ALLOWED_ATTACHMENT_TYPES;

/// One file pulled out of a multipart submission, fully buffered.
/// The size cap keeps buffering bounded.
#[derive(Clone, Debug)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Per-file size cap in bytes.
pub fn max_attachment_bytes() -> usize {
    crate::app_config::limits().max_upload_size_mb as usize * 1024 * 1024
}

fn is_allowed_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    ALLOWED_ATTACHMENT_TYPES.contains(&essence.as_str())
}

/// Validate one upload. The Err value is the rule text shown to the user.
pub fn validate_upload(file: &UploadedFile) -> Result<(), String> {
    if !is_allowed_type(&file.content_type) {
        return Err("Only PDF and image files are allowed.".to_string());
    }

    if file.data.len() > max_attachment_bytes() {
        return Err(format!(
            "Each file must be <= {}MB.",
            crate::app_config::limits().max_upload_size_mb
        ));
    }

    Ok(())
}

/// Reduce a client-supplied filename to a safe basename: path separators
/// are stripped, spaces become underscores, and anything outside
/// `[A-Za-z0-9._-]` is dropped.
pub fn sanitize_filename(raw: &str) -> String {
    let base = raw
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or_default();

    let cleaned: String = base
        .trim()
        .chars()
        .map(|c| if c == ' ' { '_' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();

    // Dotfiles and fully-stripped names fall back to a neutral name.
    if cleaned.trim_matches('.').is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

/// Storage key for an attachment of the given ticket.
pub fn attachment_key(ticket_id: &str, filename: &str) -> String {
    format!("tickets/{}/{}", ticket_id, sanitize_filename(filename))
}

/// The filename shown for a stored key.
pub fn display_name(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}
