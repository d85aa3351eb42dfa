/// Integration tests for ticket creation and the full lifecycle
/// Student files a ticket, manager assigns, agent works it
mod common;
use serial_test::serial;

use common::{database::*, fixtures::*};
use helpdesk::attachment::{max_attachment_bytes, UploadedFile};
use helpdesk::orm::tickets::TicketStatus;
use helpdesk::orm::{ticket_attachments, tickets};
use helpdesk::role::Role;
use helpdesk::storage::get_storage;
use helpdesk::tickets::{
    add_comment, assign_ticket, create_ticket, get_detail, list_all, list_for_agent,
    list_for_student, update_ticket, NewTicket, TicketError, TicketUpdate,
};
use sea_orm::{entity::*, query::*, ActiveValue::Set, DatabaseConnection};

fn pdf_upload(name: &str) -> UploadedFile {
    UploadedFile {
        filename: name.to_string(),
        content_type: "application/pdf".to_string(),
        data: b"%PDF-1.4 test payload".to_vec(),
    }
}

fn png_upload(name: &str) -> UploadedFile {
    UploadedFile {
        filename: name.to_string(),
        content_type: "image/png".to_string(),
        data: vec![0x89, 0x50, 0x4e, 0x47],
    }
}

async fn ticket_count(db: &DatabaseConnection) -> usize {
    tickets::Entity::find()
        .count(db)
        .await
        .expect("Failed to count tickets")
}

async fn attachment_count(db: &DatabaseConnection) -> usize {
    ticket_attachments::Entity::find()
        .count(db)
        .await
        .expect("Failed to count attachments")
}

#[actix_rt::test]
#[serial]
async fn create_ticket_persists_rows_and_files() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    cleanup_test_data(&db).await.expect("Failed to cleanup");

    let department = create_test_department(&db, "IT Support")
        .await
        .expect("Failed to create department");
    let student = create_test_student(&db, "maria")
        .await
        .expect("Failed to create student");
    let requester = student.requester(Role::Student);

    let ticket = create_ticket(
        &db,
        &requester,
        NewTicket {
            department_id: department.id,
            subject: "  Wifi drops in dorm 4  ".to_string(),
            description: "Connection dies every few minutes.".to_string(),
        },
        vec![pdf_upload("diagnostics.pdf"), png_upload("screenshot.png")],
    )
    .await
    .expect("Ticket creation should succeed");

    // Public id: TCK + 8 uppercase hex characters
    assert_eq!(ticket.ticket_id.len(), 11);
    assert!(ticket.ticket_id.starts_with("TCK"));
    assert_eq!(ticket.subject, "Wifi drops in dorm 4");
    assert_eq!(ticket.status, TicketStatus::New);
    assert_eq!(ticket.student_id, student.id);
    assert!(ticket.assigned_agent_id.is_none());
    assert_eq!(ticket.internal_notes, "");

    let attachments = ticket_attachments::Entity::find()
        .filter(ticket_attachments::Column::TicketId.eq(ticket.id))
        .all(&db)
        .await
        .expect("Failed to load attachments");
    assert_eq!(attachments.len(), 2);

    for row in &attachments {
        assert_eq!(row.uploaded_by_id, Some(student.id));
        assert!(row.file_path.starts_with(&format!("tickets/{}/", ticket.ticket_id)));
        assert!(get_storage()
            .exists(&row.file_path)
            .await
            .expect("Storage lookup failed"));
    }

    cleanup_test_data(&db).await.expect("Failed to cleanup");
}

#[actix_rt::test]
#[serial]
async fn create_rejects_disallowed_type_without_partial_writes() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    cleanup_test_data(&db).await.expect("Failed to cleanup");

    let department = create_test_department(&db, "IT Support")
        .await
        .expect("Failed to create department");
    let student = create_test_student(&db, "maria")
        .await
        .expect("Failed to create student");
    let requester = student.requester(Role::Student);

    // One good file and one bad file: the whole submission dies
    let result = create_ticket(
        &db,
        &requester,
        NewTicket {
            department_id: department.id,
            subject: "Lab machine infected".to_string(),
            description: "Popups everywhere.".to_string(),
        },
        vec![
            pdf_upload("notes.pdf"),
            UploadedFile {
                filename: "cleaner.exe".to_string(),
                content_type: "application/x-msdownload".to_string(),
                data: vec![0x4d, 0x5a],
            },
        ],
    )
    .await;

    match result {
        Err(TicketError::Validation(rule)) => {
            assert_eq!(rule, "Only PDF and image files are allowed.");
        }
        other => panic!("Expected a validation failure, got {:?}", other),
    }

    assert_eq!(ticket_count(&db).await, 0);
    assert_eq!(attachment_count(&db).await, 0);

    cleanup_test_data(&db).await.expect("Failed to cleanup");
}

#[actix_rt::test]
#[serial]
async fn create_rejects_oversize_file() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    cleanup_test_data(&db).await.expect("Failed to cleanup");

    let department = create_test_department(&db, "IT Support")
        .await
        .expect("Failed to create department");
    let student = create_test_student(&db, "maria")
        .await
        .expect("Failed to create student");
    let requester = student.requester(Role::Student);

    let oversize = UploadedFile {
        filename: "scan.pdf".to_string(),
        content_type: "application/pdf".to_string(),
        data: vec![0u8; max_attachment_bytes() + 1],
    };

    let result = create_ticket(
        &db,
        &requester,
        NewTicket {
            department_id: department.id,
            subject: "Scanner output".to_string(),
            description: "Attached the scan.".to_string(),
        },
        vec![oversize],
    )
    .await;

    match result {
        Err(TicketError::Validation(rule)) => {
            assert_eq!(rule, "Each file must be <= 10MB.");
        }
        other => panic!("Expected a validation failure, got {:?}", other),
    }

    assert_eq!(ticket_count(&db).await, 0);
    assert_eq!(attachment_count(&db).await, 0);

    cleanup_test_data(&db).await.expect("Failed to cleanup");
}

#[actix_rt::test]
#[serial]
async fn create_validates_text_fields_before_writing() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    cleanup_test_data(&db).await.expect("Failed to cleanup");

    let department = create_test_department(&db, "IT Support")
        .await
        .expect("Failed to create department");
    let student = create_test_student(&db, "maria")
        .await
        .expect("Failed to create student");
    let requester = student.requester(Role::Student);

    struct Case {
        subject: String,
        description: String,
        department_id: i32,
        rule: String,
    }

    let cases = vec![
        Case {
            subject: "   ".to_string(),
            description: "Something broke.".to_string(),
            department_id: department.id,
            rule: "Subject cannot be empty.".to_string(),
        },
        Case {
            subject: "x".repeat(201),
            description: "Something broke.".to_string(),
            department_id: department.id,
            rule: "Subject must be at most 200 characters.".to_string(),
        },
        Case {
            subject: "Broken".to_string(),
            description: "  ".to_string(),
            department_id: department.id,
            rule: "Description cannot be empty.".to_string(),
        },
        Case {
            subject: "Broken".to_string(),
            description: "Something broke.".to_string(),
            department_id: department.id + 999,
            rule: "Select a valid department.".to_string(),
        },
    ];

    for case in cases {
        let result = create_ticket(
            &db,
            &requester,
            NewTicket {
                department_id: case.department_id,
                subject: case.subject,
                description: case.description,
            },
            Vec::new(),
        )
        .await;

        match result {
            Err(TicketError::Validation(rule)) => assert_eq!(rule, case.rule),
            other => panic!("Expected '{}', got {:?}", case.rule, other),
        }
    }

    assert_eq!(ticket_count(&db).await, 0);

    cleanup_test_data(&db).await.expect("Failed to cleanup");
}

#[actix_rt::test]
#[serial]
async fn lists_come_back_newest_first() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    cleanup_test_data(&db).await.expect("Failed to cleanup");

    let department = create_test_department(&db, "Facilities")
        .await
        .expect("Failed to create department");
    let student = create_test_student(&db, "maria")
        .await
        .expect("Failed to create student");
    let manager = create_test_manager(&db, "boss")
        .await
        .expect("Failed to create manager");

    let older = create_test_ticket(&db, student.id, department.id, "First report")
        .await
        .expect("Failed to create ticket");
    let newer = create_test_ticket(&db, student.id, department.id, "Second report")
        .await
        .expect("Failed to create ticket");

    // Push the first row firmly into the past so ordering is decided by
    // created_at, not insertion luck.
    let mut age: tickets::ActiveModel = older.clone().into();
    age.created_at = Set(older.created_at - chrono::Duration::hours(2));
    age.update(&db).await.expect("Failed to age ticket");

    let mine = list_for_student(&db, &student.requester(Role::Student))
        .await
        .expect("Student list failed");
    assert_eq!(mine.len(), 2);
    assert_eq!(mine[0].id, newer.id);
    assert_eq!(mine[1].id, older.id);

    let all = list_all(&db, &manager.requester(Role::Manager))
        .await
        .expect("Manager list failed");
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].id, newer.id);

    cleanup_test_data(&db).await.expect("Failed to cleanup");
}

#[actix_rt::test]
#[serial]
async fn ticket_lifecycle_end_to_end() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    cleanup_test_data(&db).await.expect("Failed to cleanup");

    let department = create_test_department(&db, "IT Support")
        .await
        .expect("Failed to create department");
    let student = create_test_student(&db, "maria")
        .await
        .expect("Failed to create student");
    let agent = create_test_agent(&db, "agent_kim", department.id)
        .await
        .expect("Failed to create agent");
    let manager = create_test_manager(&db, "boss")
        .await
        .expect("Failed to create manager");

    let student_req = student.requester(Role::Student);
    let agent_req = agent.requester(Role::Agent);
    let manager_req = manager.requester(Role::Manager);

    // Student files a ticket with a PDF attached
    let ticket = create_ticket(
        &db,
        &student_req,
        NewTicket {
            department_id: department.id,
            subject: "Wifi drops in dorm 4".to_string(),
            description: "Connection dies every few minutes.".to_string(),
        },
        vec![pdf_upload("diagnostics.pdf")],
    )
    .await
    .expect("Ticket creation should succeed");

    // Manager sees it; the agent queue is still empty
    let all = list_all(&db, &manager_req).await.expect("Manager list failed");
    assert_eq!(all.len(), 1);
    assert!(list_for_agent(&db, &agent_req)
        .await
        .expect("Agent list failed")
        .is_empty());

    // Manager hands it to the agent; status is forced to In Progress
    let assigned = assign_ticket(&db, &manager_req, ticket.id, agent.id)
        .await
        .expect("Assignment should succeed");
    assert_eq!(assigned.status, TicketStatus::InProgress);
    assert_eq!(assigned.assigned_agent_id, Some(agent.id));

    let queue = list_for_agent(&db, &agent_req)
        .await
        .expect("Agent list failed");
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].id, ticket.id);

    // Agent works it: status and internal notes only
    let updated = update_ticket(
        &db,
        &agent_req,
        ticket.id,
        TicketUpdate {
            status: Some(TicketStatus::WaitingStudent),
            internal_notes: Some("Asked for the MAC address.".to_string()),
            ..Default::default()
        },
    )
    .await
    .expect("Agent update should succeed");
    assert_eq!(updated.status, TicketStatus::WaitingStudent);
    assert_eq!(updated.internal_notes, "Asked for the MAC address.");

    // Agent leaves an internal remark, student replies publicly
    add_comment(&db, &agent_req, ticket.id, "Student unreachable by phone.", true)
        .await
        .expect("Agent comment should succeed");
    add_comment(&db, &student_req, ticket.id, "MAC is AA:BB:CC:DD:EE:FF", false)
        .await
        .expect("Student comment should succeed");

    // Student sees one comment and the attachment; the agent sees both
    let student_view = get_detail(&db, &student_req, ticket.id)
        .await
        .expect("Student detail failed");
    assert_eq!(student_view.comments.len(), 1);
    assert!(!student_view.comments[0].0.is_internal);
    assert_eq!(student_view.attachments.len(), 1);

    let agent_view = get_detail(&db, &agent_req, ticket.id)
        .await
        .expect("Agent detail failed");
    assert_eq!(agent_view.comments.len(), 2);

    // The ticket stays in the student's list, but they cannot update it
    let mine = list_for_student(&db, &student_req)
        .await
        .expect("Student list failed");
    assert_eq!(mine.len(), 1);

    let denied = update_ticket(
        &db,
        &student_req,
        ticket.id,
        TicketUpdate {
            status: Some(TicketStatus::Closed),
            ..Default::default()
        },
    )
    .await;
    assert!(matches!(
        denied,
        Err(TicketError::AccessDenied("You cannot update tickets."))
    ));

    cleanup_test_data(&db).await.expect("Failed to cleanup");
}
