//! Test fixtures for creating test data
#![allow(dead_code)]
#![allow(clippy::needless_update)]

use argon2::password_hash::{rand_core::OsRng, PasswordHasher, SaltString};
use chrono::Utc;
use helpdesk::group::{GROUP_MANAGER, GROUP_STUDENT, GROUP_SUPPORT_AGENT};
use helpdesk::orm::tickets::TicketStatus;
use helpdesk::orm::{
    agent_profiles, departments, groups, student_profiles, tickets, user_groups, users,
};
use helpdesk::role::{Requester, Role};
use sea_orm::{entity::*, query::*, ActiveValue::Set, DatabaseConnection, DbErr};

/// Test user fixture
pub struct TestUser {
    pub id: i32,
    pub username: String,
    pub password: String, // Plain text password for testing
}

impl TestUser {
    pub fn requester(&self, role: Role) -> Requester {
        Requester::new(self.id, role)
    }
}

/// Create a test user with known credentials
pub async fn create_test_user(
    db: &DatabaseConnection,
    username: &str,
    password: &str,
) -> Result<TestUser, DbErr> {
    // Hash the password using the same Argon2 instance that login uses
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = helpdesk::session::get_argon2()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| DbErr::Custom(format!("Password hashing failed: {}", e)))?
        .to_string();

    let user = users::ActiveModel {
        username: Set(username.to_string()),
        email: Set(Some(format!("{}@test.com", username))),
        password: Set(password_hash),
        created_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    };
    let user_model = user.insert(db).await?;

    Ok(TestUser {
        id: user_model.id,
        username: username.to_string(),
        password: password.to_string(),
    })
}

/// Find or create a group by name
pub async fn ensure_group(db: &DatabaseConnection, name: &str) -> Result<groups::Model, DbErr> {
    if let Some(group) = groups::Entity::find()
        .filter(groups::Column::Name.eq(name))
        .one(db)
        .await?
    {
        return Ok(group);
    }

    groups::ActiveModel {
        name: Set(name.to_string()),
        ..Default::default()
    }
    .insert(db)
    .await
}

/// Put a user into a group by name, creating the group if needed
pub async fn add_user_to_group(
    db: &DatabaseConnection,
    user_id: i32,
    group_name: &str,
) -> Result<(), DbErr> {
    let group = ensure_group(db, group_name).await?;
    user_groups::ActiveModel {
        user_id: Set(user_id),
        group_id: Set(group.id),
    }
    .insert(db)
    .await?;
    Ok(())
}

/// Create a user classified as a student, with a student profile row
pub async fn create_test_student(
    db: &DatabaseConnection,
    username: &str,
) -> Result<TestUser, DbErr> {
    let user = create_test_user(db, username, "password123").await?;
    add_user_to_group(db, user.id, GROUP_STUDENT).await?;

    student_profiles::ActiveModel {
        user_id: Set(user.id),
        student_id: Set(format!("S-{:06}", user.id)),
        phone: Set(String::new()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    Ok(user)
}

/// Create a user classified as a support agent, homed in a department
pub async fn create_test_agent(
    db: &DatabaseConnection,
    username: &str,
    department_id: i32,
) -> Result<TestUser, DbErr> {
    let user = create_test_user(db, username, "password123").await?;
    add_user_to_group(db, user.id, GROUP_SUPPORT_AGENT).await?;

    agent_profiles::ActiveModel {
        user_id: Set(user.id),
        department_id: Set(department_id),
        ..Default::default()
    }
    .insert(db)
    .await?;

    Ok(user)
}

/// Create a user classified as a manager
pub async fn create_test_manager(
    db: &DatabaseConnection,
    username: &str,
) -> Result<TestUser, DbErr> {
    let user = create_test_user(db, username, "password123").await?;
    add_user_to_group(db, user.id, GROUP_MANAGER).await?;
    Ok(user)
}

/// Create a department
pub async fn create_test_department(
    db: &DatabaseConnection,
    name: &str,
) -> Result<departments::Model, DbErr> {
    departments::ActiveModel {
        name: Set(name.to_string()),
        ..Default::default()
    }
    .insert(db)
    .await
}

/// Insert a ticket row directly, bypassing the lifecycle service
pub async fn create_test_ticket(
    db: &DatabaseConnection,
    student_id: i32,
    department_id: i32,
    subject: &str,
) -> Result<tickets::Model, DbErr> {
    let now = Utc::now().naive_utc();
    tickets::ActiveModel {
        ticket_id: Set(helpdesk::tickets::generate_ticket_id()),
        student_id: Set(student_id),
        department_id: Set(department_id),
        assigned_agent_id: Set(None),
        subject: Set(subject.to_string()),
        description: Set("Test description".to_string()),
        status: Set(TicketStatus::New),
        internal_notes: Set(String::new()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
}
