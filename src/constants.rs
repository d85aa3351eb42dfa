//! Application-wide constants
//!
//! This module contains constants used throughout the application.

/// Prefix for public ticket identifiers.
/// Combined with an 8 character hex suffix this yields an 11 character id
/// such as `TCK1A2B3C4D`.
pub const TICKET_ID_PREFIX: &str = "TCK";

/// Number of hex characters appended to the ticket id prefix.
pub const TICKET_ID_SUFFIX_LEN: usize = 8;

/// Subject prefix applied when a manager duplicates a ticket.
pub const DUPLICATE_SUBJECT_PREFIX: &str = "[Duplicate] ";

/// Maximum length for a ticket subject in characters.
/// Mirrors the column width; longer subjects are rejected at the form layer.
pub const MAX_SUBJECT_LENGTH: usize = 200;

/// Content types accepted for ticket attachments.
/// Anything else is rejected before any row is written.
pub const ALLOWED_ATTACHMENT_TYPES: [&str; 5] = [
    "application/pdf",
    "image/png",
    "image/jpeg",
    "image/jpg",
    "image/webp",
];

/// Default username displayed for unauthenticated users
/// This string will be replaced with localized versions when i18n is implemented
pub const GUEST_USERNAME: &str = "Guest";
