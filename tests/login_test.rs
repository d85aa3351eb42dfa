/// Integration tests for credential checks and session handling
mod common;
use serial_test::serial;

use common::{database::*, fixtures::*};
use helpdesk::session::{authenticate_by_uuid, new_session, remove_session};
use helpdesk::web::login::{login, LoginResultStatus};

#[actix_rt::test]
#[serial]
async fn test_valid_credentials_accepted() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    cleanup_test_data(&db).await.expect("Failed to cleanup");

    let user = create_test_user(&db, "validuser", "ValidPass123!")
        .await
        .expect("Failed to create test user");

    let result = login(&db, "validuser", "ValidPass123!")
        .await
        .expect("Login function failed");

    assert!(
        matches!(result.result, LoginResultStatus::Success),
        "Valid credentials should be accepted"
    );
    assert_eq!(result.user_id, Some(user.id));

    cleanup_test_data(&db).await.expect("Failed to cleanup");
}

#[actix_rt::test]
#[serial]
async fn test_unknown_username_rejected() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    cleanup_test_data(&db).await.expect("Failed to cleanup");

    let result = login(&db, "nobody", "password123")
        .await
        .expect("Login function failed");

    assert!(matches!(result.result, LoginResultStatus::BadName));
    assert!(result.user_id.is_none());

    cleanup_test_data(&db).await.expect("Failed to cleanup");
}

#[actix_rt::test]
#[serial]
async fn test_wrong_password_rejected() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    cleanup_test_data(&db).await.expect("Failed to cleanup");

    create_test_user(&db, "validuser", "ValidPass123!")
        .await
        .expect("Failed to create test user");

    let result = login(&db, "validuser", "not-the-password")
        .await
        .expect("Login function failed");

    assert!(matches!(result.result, LoginResultStatus::BadPassword));
    assert!(result.user_id.is_none());

    cleanup_test_data(&db).await.expect("Failed to cleanup");
}

#[actix_rt::test]
#[serial]
async fn test_username_whitespace_trimmed() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    cleanup_test_data(&db).await.expect("Failed to cleanup");

    create_test_user(&db, "testuser", "password123")
        .await
        .expect("Failed to create test user");

    let result = login(&db, "  testuser  ", "password123")
        .await
        .expect("Login function failed");

    assert!(
        matches!(result.result, LoginResultStatus::Success),
        "Whitespace should be trimmed from username"
    );

    cleanup_test_data(&db).await.expect("Failed to cleanup");
}

#[actix_rt::test]
#[serial]
async fn test_sessions_round_trip_through_store_and_db() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    cleanup_test_data(&db).await.expect("Failed to cleanup");

    let user = create_test_user(&db, "sessionuser", "password123")
        .await
        .expect("Failed to create test user");

    let token = new_session(&db, user.id)
        .await
        .expect("Failed to create session");

    let record = authenticate_by_uuid(&token).expect("Fresh session should authenticate");
    assert_eq!(record.user_id, user.id);

    let removed = remove_session(&db, token)
        .await
        .expect("Failed to remove session");
    assert!(removed);
    assert!(authenticate_by_uuid(&token).is_none());

    // Removing a session twice reports that nothing was there
    let removed_again = remove_session(&db, token)
        .await
        .expect("Failed to remove session");
    assert!(!removed_again);

    cleanup_test_data(&db).await.expect("Failed to cleanup");
}
