use passline::{
    repositories::user_repository::SqliteUserRepository,
    services::user_service::{UserService, UserServiceError},
    test_utils::test_helpers,
};
use std::sync::Arc;

#[tokio::test]
async fn test_create_user_success() {
    // Create isolated test database
    let pool = test_helpers::create_test_db().await.unwrap();
    let repository = Arc::new(SqliteUserRepository::new(pool));
    let service = UserService::new(repository);

    let user = service
        .create_user(" test@example.com ", false)
        .await
        .unwrap();

    assert_eq!(user.email, "test@example.com");
    assert!(!user.email_verified);
    assert!(user.created_at.is_some());
}

#[tokio::test]
async fn test_create_user_duplicate_email() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let repository = Arc::new(SqliteUserRepository::new(pool.clone()));
    let service = UserService::new(repository);

    service
        .create_user("duplicate@example.com", false)
        .await
        .unwrap();

    // Try to create second user with same email
    let result = service.create_user("duplicate@example.com", true).await;
    assert!(matches!(result, Err(UserServiceError::EmailTaken)));
}

#[tokio::test]
async fn test_signup_by_email_is_idempotent() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let repository = Arc::new(SqliteUserRepository::new(pool.clone()));
    let service = UserService::new(repository);

    let first = service.signup_by_email("once@example.com").await.unwrap();
    let second = service.signup_by_email("once@example.com").await.unwrap();

    assert_eq!(first.id, second.id);
    assert!(first.email_verified);
    assert_eq!(service.list_users(None, None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_signup_by_email_returns_preexisting_unverified_user() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let id = test_helpers::insert_test_user(&pool, "old@example.com", false)
        .await
        .unwrap();
    let service = UserService::new(Arc::new(SqliteUserRepository::new(pool)));

    let user = service.signup_by_email("old@example.com").await.unwrap();

    assert_eq!(user.id, id);
    assert!(!user.email_verified);
}

#[tokio::test]
async fn test_verify_user_email() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let service = UserService::new(Arc::new(SqliteUserRepository::new(pool)));

    let user = service
        .create_user("verify@example.com", false)
        .await
        .unwrap();
    service.verify_user_email(user.id).await.unwrap();

    let reloaded = service.find_user_by_id(user.id).await.unwrap().unwrap();
    assert!(reloaded.email_verified);

    let missing = service.verify_user_email(9999).await;
    assert!(matches!(missing, Err(UserServiceError::UserNotFound)));
}

#[tokio::test]
async fn test_list_users() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let repository = Arc::new(SqliteUserRepository::new(pool.clone()));
    let service = UserService::new(repository);

    // Create multiple users
    for i in 0..5 {
        service
            .create_user(&format!("user{}@example.com", i), false)
            .await
            .unwrap();
    }

    // List all users
    let users = service.list_users(None, None).await.unwrap();
    assert_eq!(users.len(), 5);

    // List with limit
    let limited_users = service.list_users(Some(3), None).await.unwrap();
    assert_eq!(limited_users.len(), 3);

    // List with offset
    let offset_users = service.list_users(Some(10), Some(2)).await.unwrap();
    assert_eq!(offset_users.len(), 3);
}

#[tokio::test]
async fn test_delete_user() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let repository = Arc::new(SqliteUserRepository::new(pool.clone()));
    let service = UserService::new(repository);

    let user = service
        .create_user("delete_me@example.com", false)
        .await
        .unwrap();

    // Delete user
    let result = service.delete_user(user.id).await;
    assert!(result.is_ok());

    // Verify user is deleted
    let find_result = service.find_user_by_id(user.id).await.unwrap();
    assert!(find_result.is_none());

    let again = service.delete_user(user.id).await;
    assert!(matches!(again, Err(UserServiceError::UserNotFound)));
}
