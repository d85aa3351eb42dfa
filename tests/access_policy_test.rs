/// Integration tests for role classification and the per-role gates
/// on listing, viewing, and updating tickets
mod common;
use serial_test::serial;

use common::{database::*, fixtures::*};
use helpdesk::group::{get_group_names_for_user, GROUP_MANAGER, GROUP_STUDENT, GROUP_SUPPORT_AGENT};
use helpdesk::orm::tickets::TicketStatus;
use helpdesk::role::Role;
use helpdesk::tickets::{
    assign_ticket, get_detail, list_all, list_for_agent, update_ticket, TicketError, TicketUpdate,
};

fn expect_denied<T>(result: Result<T, TicketError>, message: &str) {
    match result {
        Err(TicketError::AccessDenied(m)) => assert_eq!(m, message),
        Err(other) => panic!("Expected denial '{}', got {:?}", message, other),
        Ok(_) => panic!("Expected denial '{}', got success", message),
    }
}

#[actix_rt::test]
#[serial]
async fn group_membership_resolves_with_manager_precedence() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    cleanup_test_data(&db).await.expect("Failed to cleanup");

    // Member of all three groups: classified Manager
    let everything = create_test_user(&db, "dept_head", "password123")
        .await
        .expect("Failed to create user");
    add_user_to_group(&db, everything.id, GROUP_STUDENT)
        .await
        .expect("Failed to add group");
    add_user_to_group(&db, everything.id, GROUP_SUPPORT_AGENT)
        .await
        .expect("Failed to add group");
    add_user_to_group(&db, everything.id, GROUP_MANAGER)
        .await
        .expect("Failed to add group");

    let names = get_group_names_for_user(&db, everything.id)
        .await
        .expect("Failed to load groups");
    assert_eq!(Role::resolve(&names), Role::Manager);

    // Agent plus student: classified Agent
    let moonlighter = create_test_user(&db, "moonlighter", "password123")
        .await
        .expect("Failed to create user");
    add_user_to_group(&db, moonlighter.id, GROUP_STUDENT)
        .await
        .expect("Failed to add group");
    add_user_to_group(&db, moonlighter.id, GROUP_SUPPORT_AGENT)
        .await
        .expect("Failed to add group");

    let names = get_group_names_for_user(&db, moonlighter.id)
        .await
        .expect("Failed to load groups");
    assert_eq!(Role::resolve(&names), Role::Agent);

    // No recognized group at all: classified Student
    let fresh = create_test_user(&db, "fresh", "password123")
        .await
        .expect("Failed to create user");
    let names = get_group_names_for_user(&db, fresh.id)
        .await
        .expect("Failed to load groups");
    assert!(names.is_empty());
    assert_eq!(Role::resolve(&names), Role::Student);

    cleanup_test_data(&db).await.expect("Failed to cleanup");
}

#[actix_rt::test]
#[serial]
async fn list_endpoints_enforce_role_gates() {
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

    expect_denied(
        list_all(&db, &student.requester(Role::Student)).await,
        "Managers only.",
    );
    expect_denied(
        list_all(&db, &agent.requester(Role::Agent)).await,
        "Managers only.",
    );

    expect_denied(
        list_for_agent(&db, &student.requester(Role::Student)).await,
        "Support agents only.",
    );
    // A manager is not an agent; the queue stays agent-only.
    expect_denied(
        list_for_agent(&db, &manager.requester(Role::Manager)).await,
        "Support agents only.",
    );

    cleanup_test_data(&db).await.expect("Failed to cleanup");
}

#[actix_rt::test]
#[serial]
async fn detail_view_gates_by_ownership_and_assignment() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    cleanup_test_data(&db).await.expect("Failed to cleanup");

    let department = create_test_department(&db, "IT Support")
        .await
        .expect("Failed to create department");
    let owner = create_test_student(&db, "maria")
        .await
        .expect("Failed to create student");
    let bystander = create_test_student(&db, "jakub")
        .await
        .expect("Failed to create student");
    let agent = create_test_agent(&db, "agent_kim", department.id)
        .await
        .expect("Failed to create agent");
    let manager = create_test_manager(&db, "boss")
        .await
        .expect("Failed to create manager");

    let ticket = create_test_ticket(&db, owner.id, department.id, "Projector dead in B12")
        .await
        .expect("Failed to create ticket");

    // Owner and manager see it
    get_detail(&db, &owner.requester(Role::Student), ticket.id)
        .await
        .expect("Owner should view their own ticket");
    get_detail(&db, &manager.requester(Role::Manager), ticket.id)
        .await
        .expect("Manager should view any ticket");

    // Another student and an unassigned agent do not
    expect_denied(
        get_detail(&db, &bystander.requester(Role::Student), ticket.id).await,
        "You can only view your own tickets.",
    );
    expect_denied(
        get_detail(&db, &agent.requester(Role::Agent), ticket.id).await,
        "You can only view your assigned tickets.",
    );

    // Assignment opens the agent's view
    assign_ticket(&db, &manager.requester(Role::Manager), ticket.id, agent.id)
        .await
        .expect("Assignment should succeed");
    get_detail(&db, &agent.requester(Role::Agent), ticket.id)
        .await
        .expect("Assigned agent should view the ticket");

    // Unknown ticket is a not-found, not a denial
    let missing = get_detail(&db, &manager.requester(Role::Manager), ticket.id + 999).await;
    assert!(matches!(
        missing,
        Err(TicketError::NotFound("Ticket not found."))
    ));

    cleanup_test_data(&db).await.expect("Failed to cleanup");
}

#[actix_rt::test]
#[serial]
async fn students_can_never_update() {
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
    let ticket = create_test_ticket(&db, student.id, department.id, "Projector dead in B12")
        .await
        .expect("Failed to create ticket");

    // Not even on their own ticket, and not even a harmless field
    expect_denied(
        update_ticket(
            &db,
            &student.requester(Role::Student),
            ticket.id,
            TicketUpdate {
                status: Some(TicketStatus::Closed),
                ..Default::default()
            },
        )
        .await,
        "You cannot update tickets.",
    );

    cleanup_test_data(&db).await.expect("Failed to cleanup");
}

#[actix_rt::test]
#[serial]
async fn agents_update_only_their_assignment_within_their_fields() {
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
    let assigned = create_test_agent(&db, "agent_kim", department.id)
        .await
        .expect("Failed to create agent");
    let other_agent = create_test_agent(&db, "agent_lee", department.id)
        .await
        .expect("Failed to create agent");
    let manager = create_test_manager(&db, "boss")
        .await
        .expect("Failed to create manager");

    let ticket = create_test_ticket(&db, student.id, department.id, "Projector dead in B12")
        .await
        .expect("Failed to create ticket");
    assign_ticket(&db, &manager.requester(Role::Manager), ticket.id, assigned.id)
        .await
        .expect("Assignment should succeed");

    let status_and_notes = TicketUpdate {
        status: Some(TicketStatus::Resolved),
        internal_notes: Some("Swapped the bulb.".to_string()),
        ..Default::default()
    };

    // The agent it is not assigned to gets the assignment denial
    expect_denied(
        update_ticket(
            &db,
            &other_agent.requester(Role::Agent),
            ticket.id,
            status_and_notes.clone(),
        )
        .await,
        "You can only update your assigned tickets.",
    );

    // The assigned agent may not reach outside status and notes
    for outside in [
        TicketUpdate {
            subject: Some("Renamed".to_string()),
            ..Default::default()
        },
        TicketUpdate {
            description: Some("Rewritten".to_string()),
            ..Default::default()
        },
        TicketUpdate {
            department_id: Some(department.id),
            ..Default::default()
        },
        TicketUpdate {
            assigned_agent_id: Some(Some(other_agent.id)),
            ..Default::default()
        },
    ] {
        expect_denied(
            update_ticket(&db, &assigned.requester(Role::Agent), ticket.id, outside).await,
            "You can only update status and internal notes.",
        );
    }

    // Status and notes go through
    let updated = update_ticket(
        &db,
        &assigned.requester(Role::Agent),
        ticket.id,
        status_and_notes,
    )
    .await
    .expect("Agent update should succeed");
    assert_eq!(updated.status, TicketStatus::Resolved);
    assert_eq!(updated.internal_notes, "Swapped the bulb.");

    cleanup_test_data(&db).await.expect("Failed to cleanup");
}
