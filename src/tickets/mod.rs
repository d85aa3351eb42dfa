//! Ticket lifecycle service
//!
//! Every operation here takes the database handle and the [`Requester`]
//! resolved by the middleware, so the role precedence is decided exactly
//! once per request and this module only enforces it. Writes follow
//! validate-all-then-create: nothing is persisted until every input has
//! passed, and multi-row writes run inside one transaction.
//!
//! There is deliberately no status transition graph. Any role allowed to
//! write `status` may move a ticket between any two states; the only
//! automatic transition is assignment forcing `IN_PROGRESS`. Concurrent
//! updates are last-write-wins, with no version stamp.

use crate::attachment::{self, UploadedFile};
use crate::constants::{DUPLICATE_SUBJECT_PREFIX, MAX_SUBJECT_LENGTH};
use crate::constants::{TICKET_ID_PREFIX, TICKET_ID_SUFFIX_LEN};
use crate::group::{self, GROUP_SUPPORT_AGENT};
use crate::orm::tickets::TicketStatus;
use crate::orm::{departments, ticket_attachments, ticket_comments, tickets, users};
use crate::role::{Requester, Role};
use crate::storage::{get_storage, StorageError};
use chrono::Utc;
use sea_orm::{entity::*, query::*, ActiveValue::Set, DatabaseConnection, DbErr, TransactionTrait};
use uuid::Uuid;

/// Failure of a lifecycle operation. Each operation either succeeds or
/// returns one of these within a single invocation; there are no retries.
#[derive(Debug)]
pub enum TicketError {
    /// Input failed a validation rule. The text names the violated rule
    /// and is shown to the caller.
    Validation(String),
    /// The caller's role does not grant the operation.
    AccessDenied(&'static str),
    /// Unknown ticket, agent, or attachment.
    NotFound(&'static str),
    /// The database rejected the write (unique or foreign key violation).
    Integrity(DbErr),
    Db(DbErr),
    Storage(StorageError),
}

impl std::fmt::Display for TicketError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TicketError::Validation(rule) => f.write_str(rule),
            TicketError::AccessDenied(msg) => f.write_str(msg),
            TicketError::NotFound(what) => f.write_str(what),
            TicketError::Integrity(e) => write!(f, "Integrity violation: {}", e),
            TicketError::Db(e) => write!(f, "Database error: {}", e),
            TicketError::Storage(e) => write!(f, "Storage error: {}", e),
        }
    }
}

impl std::error::Error for TicketError {}

impl From<DbErr> for TicketError {
    fn from(err: DbErr) -> Self {
        let text = err.to_string();
        if text.contains("duplicate key") || text.contains("violates foreign key") {
            TicketError::Integrity(err)
        } else {
            TicketError::Db(err)
        }
    }
}

impl From<StorageError> for TicketError {
    fn from(err: StorageError) -> Self {
        TicketError::Storage(err)
    }
}

/// Generate a public ticket identifier: `TCK` followed by the first 8 hex
/// characters of a v4 UUID, uppercased. Always 11 characters. Uniqueness
/// is backed by the column's unique index; a collision surfaces as an
/// integrity error rather than being retried.
pub fn generate_ticket_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!(
        "{}{}",
        TICKET_ID_PREFIX,
        hex[..TICKET_ID_SUFFIX_LEN].to_uppercase()
    )
}

/// Fields for a new ticket submission.
#[derive(Clone, Debug)]
pub struct NewTicket {
    pub department_id: i32,
    pub subject: String,
    pub description: String,
}

/// A partial ticket update. `None` leaves the column untouched; for the
/// assignment, `Some(None)` clears it.
#[derive(Clone, Debug, Default)]
pub struct TicketUpdate {
    pub subject: Option<String>,
    pub description: Option<String>,
    pub department_id: Option<i32>,
    pub assigned_agent_id: Option<Option<i32>>,
    pub status: Option<TicketStatus>,
    pub internal_notes: Option<String>,
}

impl TicketUpdate {
    /// True when the update touches anything outside the agent-writable
    /// subset (status and internal notes).
    pub fn touches_manager_fields(&self) -> bool {
        self.subject.is_some()
            || self.description.is_some()
            || self.department_id.is_some()
            || self.assigned_agent_id.is_some()
    }
}

/// Everything the detail page needs, already gated for the requester.
pub struct TicketDetail {
    pub ticket: tickets::Model,
    /// Oldest first. Internal comments are absent for student requesters.
    pub comments: Vec<(ticket_comments::Model, Option<users::Model>)>,
    pub attachments: Vec<ticket_attachments::Model>,
    /// Reassignment candidates from the SupportAgent group. Populated for
    /// managers, empty for everyone else.
    pub assignable_agents: Vec<users::Model>,
}

async fn find_ticket(db: &DatabaseConnection, ticket_pk: i32) -> Result<tickets::Model, TicketError> {
    tickets::Entity::find_by_id(ticket_pk)
        .one(db)
        .await?
        .ok_or(TicketError::NotFound("Ticket not found."))
}

/// The shared view gate: managers see everything, agents see their
/// assigned tickets, students see their own.
fn check_view_access(ticket: &tickets::Model, requester: &Requester) -> Result<(), TicketError> {
    match requester.role {
        Role::Manager => Ok(()),
        Role::Agent if ticket.assigned_agent_id == Some(requester.user_id) => Ok(()),
        Role::Agent => Err(TicketError::AccessDenied(
            "You can only view your assigned tickets.",
        )),
        Role::Student if ticket.student_id == requester.user_id => Ok(()),
        Role::Student => Err(TicketError::AccessDenied(
            "You can only view your own tickets.",
        )),
    }
}

fn validate_subject(subject: &str) -> Result<(), TicketError> {
    if subject.trim().is_empty() {
        return Err(TicketError::Validation("Subject cannot be empty.".to_string()));
    }
    if subject.chars().count() > MAX_SUBJECT_LENGTH {
        return Err(TicketError::Validation(format!(
            "Subject must be at most {} characters.",
            MAX_SUBJECT_LENGTH
        )));
    }
    Ok(())
}

async fn validate_department(db: &DatabaseConnection, department_id: i32) -> Result<(), TicketError> {
    departments::Entity::find_by_id(department_id)
        .one(db)
        .await?
        .map(|_| ())
        .ok_or_else(|| TicketError::Validation("Select a valid department.".to_string()))
}

/// Create a ticket for the requester with zero or more attachments.
///
/// Every file is validated against the content-type allow list and the
/// size cap before anything is written; the first violation rejects the
/// whole submission. On success the ticket row and one attachment row per
/// file are inserted in a single transaction, with the file bytes handed
/// to the storage backend before the transaction commits.
pub async fn create_ticket(
    db: &DatabaseConnection,
    requester: &Requester,
    input: NewTicket,
    files: Vec<UploadedFile>,
) -> Result<tickets::Model, TicketError> {
    let subject = input.subject.trim().to_string();
    validate_subject(&subject)?;

    let description = input.description.trim().to_string();
    if description.is_empty() {
        return Err(TicketError::Validation(
            "Description cannot be empty.".to_string(),
        ));
    }

    validate_department(db, input.department_id).await?;

    // Validate-all-then-create. No ticket, attachment row, or stored
    // object may exist if any file is rejected.
    for file in &files {
        if let Err(rule) = attachment::validate_upload(file) {
            log::warn!(
                "Rejected attachment {:?} from user {}: {}",
                file.filename,
                requester.user_id,
                rule
            );
            return Err(TicketError::Validation(rule));
        }
    }

    let now = Utc::now().naive_utc();
    let txn = db.begin().await?;

    let ticket = tickets::ActiveModel {
        ticket_id: Set(generate_ticket_id()),
        student_id: Set(requester.user_id),
        department_id: Set(input.department_id),
        assigned_agent_id: Set(None),
        subject: Set(subject),
        description: Set(description),
        status: Set(TicketStatus::New),
        internal_notes: Set(String::new()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    for file in files {
        let key = attachment::attachment_key(&ticket.ticket_id, &file.filename);
        get_storage().put_object(file.data, &key).await?;

        ticket_attachments::ActiveModel {
            ticket_id: Set(ticket.id),
            file_path: Set(key),
            uploaded_by_id: Set(Some(requester.user_id)),
            uploaded_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
    }

    txn.commit().await?;

    log::info!(
        "Ticket {} created by user {}",
        ticket.ticket_id,
        requester.user_id
    );
    Ok(ticket)
}

/// Tickets owned by the requester, newest first. Any authenticated caller
/// may list their own tickets, whatever their role.
pub async fn list_for_student(
    db: &DatabaseConnection,
    requester: &Requester,
) -> Result<Vec<tickets::Model>, TicketError> {
    tickets::Entity::find()
        .filter(tickets::Column::StudentId.eq(requester.user_id))
        .order_by_desc(tickets::Column::CreatedAt)
        .all(db)
        .await
        .map_err(TicketError::from)
}

/// Every ticket, newest first. Managers only.
pub async fn list_all(
    db: &DatabaseConnection,
    requester: &Requester,
) -> Result<Vec<tickets::Model>, TicketError> {
    if !requester.role.is_manager() {
        return Err(TicketError::AccessDenied("Managers only."));
    }

    tickets::Entity::find()
        .order_by_desc(tickets::Column::CreatedAt)
        .all(db)
        .await
        .map_err(TicketError::from)
}

/// Tickets assigned to the requester, newest first. Agents only; note
/// that a caller classified Manager is not an agent here.
pub async fn list_for_agent(
    db: &DatabaseConnection,
    requester: &Requester,
) -> Result<Vec<tickets::Model>, TicketError> {
    if !requester.role.is_agent() {
        return Err(TicketError::AccessDenied("Support agents only."));
    }

    tickets::Entity::find()
        .filter(tickets::Column::AssignedAgentId.eq(requester.user_id))
        .order_by_desc(tickets::Column::CreatedAt)
        .all(db)
        .await
        .map_err(TicketError::from)
}

/// Load a ticket with its comments and attachments, applying the view
/// gate. Students do not receive internal comments; managers also receive
/// the reassignment candidate list.
pub async fn get_detail(
    db: &DatabaseConnection,
    requester: &Requester,
    ticket_pk: i32,
) -> Result<TicketDetail, TicketError> {
    let ticket = find_ticket(db, ticket_pk).await?;
    check_view_access(&ticket, requester)?;

    let mut comment_query = ticket_comments::Entity::find()
        .filter(ticket_comments::Column::TicketId.eq(ticket.id))
        .order_by_asc(ticket_comments::Column::CreatedAt);

    // Internal comments are never shown to the owning student.
    if requester.role.is_student() {
        comment_query = comment_query.filter(ticket_comments::Column::IsInternal.eq(false));
    }

    let comments = comment_query
        .find_also_related(users::Entity)
        .all(db)
        .await?;

    let attachments = ticket_attachments::Entity::find()
        .filter(ticket_attachments::Column::TicketId.eq(ticket.id))
        .order_by_asc(ticket_attachments::Column::Id)
        .all(db)
        .await?;

    let assignable_agents = if requester.role.is_manager() {
        group::users_in_group(db, GROUP_SUPPORT_AGENT).await?
    } else {
        Vec::new()
    };

    Ok(TicketDetail {
        ticket,
        comments,
        attachments,
        assignable_agents,
    })
}

/// Apply a partial update, enforcing the per-role writable field sets.
///
/// Managers may write every field, including the assignment. Agents may
/// write only status and internal notes, and only on tickets assigned to
/// them right now; assignment is re-read from the fresh row so a stale
/// detail view cannot bypass the check. Students may never update.
/// Reassignment through an update does not touch status.
pub async fn update_ticket(
    db: &DatabaseConnection,
    requester: &Requester,
    ticket_pk: i32,
    update: TicketUpdate,
) -> Result<tickets::Model, TicketError> {
    let ticket = find_ticket(db, ticket_pk).await?;

    match requester.role {
        Role::Manager => {}
        Role::Agent => {
            if ticket.assigned_agent_id != Some(requester.user_id) {
                return Err(TicketError::AccessDenied(
                    "You can only update your assigned tickets.",
                ));
            }
            if update.touches_manager_fields() {
                return Err(TicketError::AccessDenied(
                    "You can only update status and internal notes.",
                ));
            }
        }
        Role::Student => {
            return Err(TicketError::AccessDenied("You cannot update tickets."));
        }
    }

    if let Some(subject) = &update.subject {
        validate_subject(subject)?;
    }
    if let Some(description) = &update.description {
        if description.trim().is_empty() {
            return Err(TicketError::Validation(
                "Description cannot be empty.".to_string(),
            ));
        }
    }
    if let Some(department_id) = update.department_id {
        validate_department(db, department_id).await?;
    }
    if let Some(Some(agent_id)) = update.assigned_agent_id {
        users::Entity::find_by_id(agent_id)
            .one(db)
            .await?
            .ok_or(TicketError::NotFound("Agent not found."))?;
    }

    let mut active: tickets::ActiveModel = ticket.into();
    if let Some(subject) = update.subject {
        active.subject = Set(subject.trim().to_string());
    }
    if let Some(description) = update.description {
        active.description = Set(description.trim().to_string());
    }
    if let Some(department_id) = update.department_id {
        active.department_id = Set(department_id);
    }
    if let Some(assigned_agent_id) = update.assigned_agent_id {
        active.assigned_agent_id = Set(assigned_agent_id);
    }
    if let Some(status) = update.status {
        active.status = Set(status);
    }
    if let Some(internal_notes) = update.internal_notes {
        active.internal_notes = Set(internal_notes);
    }
    active.updated_at = Set(Utc::now().naive_utc());

    active.update(db).await.map_err(TicketError::from)
}

/// Add a comment under the same gate as viewing the ticket. A requester
/// classified Student always persists `is_internal = false`, whatever the
/// submitted value said; this is a security invariant, not a default.
pub async fn add_comment(
    db: &DatabaseConnection,
    requester: &Requester,
    ticket_pk: i32,
    message: &str,
    is_internal_requested: bool,
) -> Result<ticket_comments::Model, TicketError> {
    let ticket = find_ticket(db, ticket_pk).await?;
    check_view_access(&ticket, requester)?;

    let message = message.trim();
    if message.is_empty() {
        return Err(TicketError::Validation(
            "Comment message cannot be empty.".to_string(),
        ));
    }

    let is_internal = is_internal_requested && !requester.role.is_student();

    ticket_comments::ActiveModel {
        ticket_id: Set(ticket.id),
        author_id: Set(Some(requester.user_id)),
        message: Set(message.to_string()),
        is_internal: Set(is_internal),
        created_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(TicketError::from)
}

/// Assign the ticket to an agent. Managers only. Assignment always lands
/// the ticket in `IN_PROGRESS`, even when it was `RESOLVED` or `CLOSED`;
/// this is the one automatic status transition in the system.
pub async fn assign_ticket(
    db: &DatabaseConnection,
    requester: &Requester,
    ticket_pk: i32,
    agent_user_id: i32,
) -> Result<tickets::Model, TicketError> {
    if !requester.role.is_manager() {
        return Err(TicketError::AccessDenied("Managers only."));
    }

    let ticket = find_ticket(db, ticket_pk).await?;

    let agent = users::Entity::find_by_id(agent_user_id)
        .one(db)
        .await?
        .ok_or(TicketError::NotFound("Agent not found."))?;

    let public_id = ticket.ticket_id.clone();
    let mut active: tickets::ActiveModel = ticket.into();
    active.assigned_agent_id = Set(Some(agent.id));
    active.status = Set(TicketStatus::InProgress);
    active.updated_at = Set(Utc::now().naive_utc());
    let updated = active.update(db).await?;

    log::info!(
        "Ticket {} assigned to user {} by manager {}",
        public_id,
        agent.id,
        requester.user_id
    );
    Ok(updated)
}

/// Duplicate a ticket. Managers only.
///
/// The copy keeps the student, department, and description; the subject
/// gains the `[Duplicate] ` prefix; status resets to `NEW` and the copy
/// starts unassigned with empty internal notes. Attachment rows are
/// copied by reference, pointing at the same stored object and attributed
/// to the duplicating manager. One internal comment naming the original
/// ticket is appended, authored by the manager.
pub async fn duplicate_ticket(
    db: &DatabaseConnection,
    requester: &Requester,
    ticket_pk: i32,
) -> Result<tickets::Model, TicketError> {
    if !requester.role.is_manager() {
        return Err(TicketError::AccessDenied("Managers only."));
    }

    let original = find_ticket(db, ticket_pk).await?;
    let attachments = original
        .find_related(ticket_attachments::Entity)
        .all(db)
        .await?;

    let now = Utc::now().naive_utc();
    let txn = db.begin().await?;

    let copy = tickets::ActiveModel {
        ticket_id: Set(generate_ticket_id()),
        student_id: Set(original.student_id),
        department_id: Set(original.department_id),
        assigned_agent_id: Set(None),
        subject: Set(format!("{}{}", DUPLICATE_SUBJECT_PREFIX, original.subject)),
        description: Set(original.description.clone()),
        status: Set(TicketStatus::New),
        internal_notes: Set(String::new()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    for attachment in &attachments {
        ticket_attachments::ActiveModel {
            ticket_id: Set(copy.id),
            file_path: Set(attachment.file_path.clone()),
            uploaded_by_id: Set(Some(requester.user_id)),
            uploaded_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
    }

    ticket_comments::ActiveModel {
        ticket_id: Set(copy.id),
        author_id: Set(Some(requester.user_id)),
        message: Set(format!("Duplicated from {}.", original.ticket_id)),
        is_internal: Set(true),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;

    log::info!(
        "Ticket {} duplicated as {} by manager {}",
        original.ticket_id,
        copy.ticket_id,
        requester.user_id
    );
    Ok(copy)
}

/// Fetch one attachment row under the detail view gate. The attachment
/// must belong to the named ticket.
pub async fn get_attachment(
    db: &DatabaseConnection,
    requester: &Requester,
    ticket_pk: i32,
    attachment_id: i32,
) -> Result<ticket_attachments::Model, TicketError> {
    let ticket = find_ticket(db, ticket_pk).await?;
    check_view_access(&ticket, requester)?;

    let attachment = ticket_attachments::Entity::find_by_id(attachment_id)
        .one(db)
        .await?
        .ok_or(TicketError::NotFound("Attachment not found."))?;

    if attachment.ticket_id != ticket.id {
        return Err(TicketError::NotFound("Attachment not found."));
    }

    Ok(attachment)
}
