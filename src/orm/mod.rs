//! SeaORM entities, one module per table.

pub mod agent_profiles;
pub mod departments;
pub mod groups;
pub mod sessions;
pub mod student_profiles;
pub mod ticket_attachments;
pub mod ticket_comments;
pub mod tickets;
pub mod user_groups;
pub mod users;
