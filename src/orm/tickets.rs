//! SeaORM Entity for tickets table

use sea_orm::entity::prelude::*;

/// Workflow state of a ticket, stored as its wire string in a varchar
/// column. There is no transition graph: any writable role may move a
/// ticket between any two states, and assignment forces `InProgress`.
#[derive(Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(None)")]
pub enum TicketStatus {
    #[sea_orm(string_value = "NEW")]
    New,
    #[sea_orm(string_value = "IN_PROGRESS")]
    InProgress,
    #[sea_orm(string_value = "WAITING_STUDENT")]
    WaitingStudent,
    #[sea_orm(string_value = "RESOLVED")]
    Resolved,
    #[sea_orm(string_value = "CLOSED")]
    Closed,
}

impl TicketStatus {
    /// Every state, in the order select elements list them.
    pub const ALL: [TicketStatus; 5] = [
        TicketStatus::New,
        TicketStatus::InProgress,
        TicketStatus::WaitingStudent,
        TicketStatus::Resolved,
        TicketStatus::Closed,
    ];

    /// Human readable label for list and detail pages.
    pub fn label(&self) -> &'static str {
        match self {
            TicketStatus::New => "New",
            TicketStatus::InProgress => "In Progress",
            TicketStatus::WaitingStudent => "Waiting for Student",
            TicketStatus::Resolved => "Resolved",
            TicketStatus::Closed => "Closed",
        }
    }

    /// The wire value stored in the column and posted by forms.
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::New => "NEW",
            TicketStatus::InProgress => "IN_PROGRESS",
            TicketStatus::WaitingStudent => "WAITING_STUDENT",
            TicketStatus::Resolved => "RESOLVED",
            TicketStatus::Closed => "CLOSED",
        }
    }

    /// Parse a posted wire value.
    pub fn from_form_value(value: &str) -> Option<Self> {
        match value {
            "NEW" => Some(TicketStatus::New),
            "IN_PROGRESS" => Some(TicketStatus::InProgress),
            "WAITING_STUDENT" => Some(TicketStatus::WaitingStudent),
            "RESOLVED" => Some(TicketStatus::Resolved),
            "CLOSED" => Some(TicketStatus::Closed),
            _ => None,
        }
    }
}

impl Default for TicketStatus {
    fn default() -> Self {
        TicketStatus::New
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "tickets")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    /// Public identifier, `TCK` + 8 uppercase hex chars. Generated once at
    /// creation and never rewritten.
    pub ticket_id: String,
    pub student_id: i32,
    pub department_id: i32,
    pub assigned_agent_id: Option<i32>,
    pub subject: String,
    pub description: String,
    pub status: TicketStatus,
    pub internal_notes: String,
    pub created_at: chrono::NaiveDateTime,
    pub updated_at: chrono::NaiveDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::StudentId",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Student,
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::AssignedAgentId",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "SetNull"
    )]
    AssignedAgent,
    #[sea_orm(
        belongs_to = "super::departments::Entity",
        from = "Column::DepartmentId",
        to = "super::departments::Column::Id",
        on_update = "NoAction",
        on_delete = "Restrict"
    )]
    Department,
    #[sea_orm(has_many = "super::ticket_comments::Entity")]
    Comments,
    #[sea_orm(has_many = "super::ticket_attachments::Entity")]
    Attachments,
}

impl Related<super::departments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Department.def()
    }
}

impl Related<super::ticket_comments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Comments.def()
    }
}

impl Related<super::ticket_attachments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Attachments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
