use chrono::{Duration, TimeZone, Utc};
use passline::{
    clock::Clock,
    crypto::get_token_hash,
    repositories::{MagicLinkRepository, SqliteMagicLinkRepository},
    services::MagicLinkError,
    test_utils::test_helpers::{self, TEST_SECRET},
};

#[tokio::test]
async fn test_request() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let (state, clock, email) = test_helpers::create_test_state(pool.clone());

    let (magic_link, token) = state
        .magic_link_service
        .request("user@example.com")
        .await
        .unwrap();

    assert_eq!(magic_link.user_email, "user@example.com");
    assert_eq!(magic_link.user_id, None);
    assert_eq!(magic_link.token_hash, get_token_hash(&token, TEST_SECRET));
    assert_eq!(magic_link.created_at, clock.now());
    assert_eq!(
        magic_link.expires_at,
        clock.now() + Duration::minutes(30)
    );

    // Issuing never sends and never stores the raw token.
    assert!(email.sent().is_empty());
    let stored_token: Option<String> =
        sqlx::query_scalar("SELECT token_hash FROM magic_links WHERE token_hash = ?")
            .bind(&token)
            .fetch_optional(&pool)
            .await
            .unwrap();
    assert!(stored_token.is_none());
}

#[tokio::test]
async fn test_request_links_existing_user() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let user_id = test_helpers::insert_test_user(&pool, "known@example.com", true)
        .await
        .unwrap();
    let (state, _clock, _email) = test_helpers::create_test_state(pool);

    let (magic_link, _token) = state
        .magic_link_service
        .request("known@example.com")
        .await
        .unwrap();

    assert_eq!(magic_link.user_id, Some(user_id));
}

#[tokio::test]
async fn test_request_then_authenticate_new_email() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let (state, _clock, _email) = test_helpers::create_test_state(pool.clone());
    let service = &state.magic_link_service;

    let (magic_link, token) = service.request("a@x.com").await.unwrap();
    assert_eq!(magic_link.user_email, "a@x.com");
    assert_eq!(magic_link.user_id, None);
    assert_eq!(magic_link.token_hash, get_token_hash(&token, TEST_SECRET));

    let user = service.authenticate(&token).await.unwrap();
    assert_eq!(user.email, "a@x.com");
    assert!(user.email_verified);

    let deleted = SqliteMagicLinkRepository::new(pool.clone())
        .find_by_id(&magic_link.id)
        .await
        .unwrap();
    assert!(deleted.is_none());

    let stored_user = state
        .user_service
        .find_user_by_email("a@x.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored_user.id, user.id);
}

#[tokio::test]
async fn test_authenticate_invalid_token() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let (state, _clock, _email) = test_helpers::create_test_state(pool);

    let result = state.magic_link_service.authenticate("INVALID_TOKEN").await;
    assert!(matches!(result, Err(MagicLinkError::InvalidOrExpiredToken)));

    let result = state.magic_link_service.authenticate("").await;
    assert!(matches!(result, Err(MagicLinkError::InvalidOrExpiredToken)));
}

#[tokio::test]
async fn test_authenticate_expired_token() {
    let now = test_helpers::test_now();
    let expiries = [
        Utc.with_ymd_and_hms(1900, 1, 1, 0, 0, 0).unwrap(),
        now - Duration::seconds(1),
        now,
    ];

    for expires_at in expiries {
        let pool = test_helpers::create_test_db().await.unwrap();
        let (state, _clock, _email) = test_helpers::create_test_state(pool.clone());

        let (magic_link, token) =
            test_helpers::insert_magic_link(&pool, "user@example.com", None, Some(expires_at))
                .await
                .unwrap();

        let result = state.magic_link_service.authenticate(&token).await;
        assert!(
            matches!(result, Err(MagicLinkError::InvalidOrExpiredToken)),
            "token expiring at {} must be rejected",
            expires_at
        );

        // A rejected token is left in place for later cleanup.
        let still_there = SqliteMagicLinkRepository::new(pool.clone())
            .find_by_id(&magic_link.id)
            .await
            .unwrap();
        assert!(still_there.is_some());
        assert!(state
            .user_service
            .find_user_by_email("user@example.com")
            .await
            .unwrap()
            .is_none());
    }
}

#[tokio::test]
async fn test_authenticate_just_before_expiry() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let (state, clock, _email) = test_helpers::create_test_state(pool.clone());

    let (_magic_link, token) = state
        .magic_link_service
        .request("late@example.com")
        .await
        .unwrap();

    clock.advance(Duration::minutes(30) - Duration::milliseconds(1));
    assert!(state.magic_link_service.authenticate(&token).await.is_ok());
}

#[tokio::test]
async fn test_token_expires_as_clock_advances() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let (state, clock, _email) = test_helpers::create_test_state(pool.clone());

    let (_magic_link, token) = state
        .magic_link_service
        .request("slow@example.com")
        .await
        .unwrap();

    clock.advance(Duration::minutes(30));
    let result = state.magic_link_service.authenticate(&token).await;
    assert!(matches!(result, Err(MagicLinkError::InvalidOrExpiredToken)));
}

#[tokio::test]
async fn test_authenticate_is_single_use() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let (state, _clock, _email) = test_helpers::create_test_state(pool.clone());

    let (_magic_link, token) = state
        .magic_link_service
        .request("once@example.com")
        .await
        .unwrap();

    assert!(state.magic_link_service.authenticate(&token).await.is_ok());

    let second = state.magic_link_service.authenticate(&token).await;
    assert!(matches!(second, Err(MagicLinkError::InvalidOrExpiredToken)));
    assert_eq!(test_helpers::count_magic_links(&pool).await.unwrap(), 0);
}

#[tokio::test]
async fn test_authenticate_existing_user() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let user_id = test_helpers::insert_test_user(&pool, "user@example.com", true)
        .await
        .unwrap();
    let (state, _clock, _email) = test_helpers::create_test_state(pool.clone());

    let (magic_link, token) =
        test_helpers::insert_magic_link(&pool, "user@example.com", Some(user_id), None)
            .await
            .unwrap();

    let authenticated_user = state.magic_link_service.authenticate(&token).await.unwrap();
    assert_eq!(authenticated_user.id, user_id);

    let deleted = SqliteMagicLinkRepository::new(pool.clone())
        .find_by_id(&magic_link.id)
        .await
        .unwrap();
    assert!(deleted.is_none());
}

#[tokio::test]
async fn test_authenticate_existing_user_unlinked_from_magic_token() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let (state, _clock, _email) = test_helpers::create_test_state(pool.clone());

    // Link issued before the account existed.
    let (magic_link, token) = state
        .magic_link_service
        .request("user@example.com")
        .await
        .unwrap();
    assert_eq!(magic_link.user_id, None);

    let user_id = test_helpers::insert_test_user(&pool, "user@example.com", true)
        .await
        .unwrap();

    let authenticated_user = state.magic_link_service.authenticate(&token).await.unwrap();
    assert_eq!(authenticated_user.id, user_id);
    assert_eq!(
        state.user_service.list_users(None, None).await.unwrap().len(),
        1,
        "no duplicate user is created"
    );

    let deleted = SqliteMagicLinkRepository::new(pool.clone())
        .find_by_id(&magic_link.id)
        .await
        .unwrap();
    assert!(deleted.is_none());
}

#[tokio::test]
async fn test_authenticate_marks_unverified_user_verified() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let user_id = test_helpers::insert_test_user(&pool, "pending@example.com", false)
        .await
        .unwrap();
    let (state, _clock, _email) = test_helpers::create_test_state(pool.clone());

    let (_magic_link, token) = state
        .magic_link_service
        .request("pending@example.com")
        .await
        .unwrap();

    let user = state.magic_link_service.authenticate(&token).await.unwrap();
    assert_eq!(user.id, user_id);
    assert!(user.email_verified);

    let reloaded = state
        .user_service
        .find_user_by_id(user_id)
        .await
        .unwrap()
        .unwrap();
    assert!(reloaded.email_verified);
}

#[tokio::test]
async fn test_concurrent_authenticate_succeeds_once() {
    let (pool, _db_file) = test_helpers::create_test_db_file().await.unwrap();
    let (state, _clock, _email) = test_helpers::create_test_state(pool.clone());

    let (_magic_link, token) = state
        .magic_link_service
        .request("race@example.com")
        .await
        .unwrap();

    let service = state.magic_link_service.clone();
    let attempts = (0..4).map(|_| {
        let service = service.clone();
        let token = token.clone();
        tokio::spawn(async move { service.authenticate(&token).await })
    });

    let mut successes = 0;
    let mut rejections = 0;
    for handle in attempts.collect::<Vec<_>>() {
        match handle.await.unwrap() {
            Ok(user) => {
                assert_eq!(user.email, "race@example.com");
                successes += 1;
            }
            Err(MagicLinkError::InvalidOrExpiredToken) => rejections += 1,
            Err(other) => panic!("unexpected error: {}", other),
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(rejections, 3);
    assert_eq!(
        state.user_service.list_users(None, None).await.unwrap().len(),
        1
    );
}

#[tokio::test]
async fn test_send() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let (state, _clock, email) = test_helpers::create_test_state(pool.clone());

    let (magic_link, _token) =
        test_helpers::insert_magic_link(&pool, "user@example.com", None, None)
            .await
            .unwrap();

    state
        .magic_link_service
        .send(&magic_link, "TOKEN")
        .await
        .unwrap();

    let sent = email.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to_email, "user@example.com");
    assert_eq!(sent[0].subject, "Sign in to Passline");
    assert!(sent[0]
        .html_body
        .contains("http://localhost:3000/magic-link/authenticate?token=TOKEN"));
    assert!(sent[0].html_body.contains("expire in 30 minutes"));
}

#[tokio::test]
async fn test_purge_expired() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let (state, clock, _email) = test_helpers::create_test_state(pool.clone());
    let now = test_helpers::test_now();

    test_helpers::insert_magic_link(&pool, "old@example.com", None, Some(now - Duration::days(1)))
        .await
        .unwrap();
    test_helpers::insert_magic_link(&pool, "edge@example.com", None, Some(now))
        .await
        .unwrap();
    let (live, _token) =
        test_helpers::insert_magic_link(&pool, "live@example.com", None, None)
            .await
            .unwrap();

    let removed = state.magic_link_service.purge_expired().await.unwrap();
    assert_eq!(removed, 2);
    assert_eq!(test_helpers::count_magic_links(&pool).await.unwrap(), 1);

    let remaining = SqliteMagicLinkRepository::new(pool.clone())
        .find_by_id(&live.id)
        .await
        .unwrap();
    assert!(remaining.is_some());

    clock.advance(Duration::hours(1));
    assert_eq!(state.magic_link_service.purge_expired().await.unwrap(), 1);
}
