//! Tests for study access grants and login session resolution.

mod helpers;

use helpers::{grant_access, seed_admin, seed_study, seed_user};
use scanboard::data::users;
use scanboard::web::auth::session::SessionCache;
use sqlx::PgPool;

#[sqlx::test]
async fn access_requires_a_grant(pool: PgPool) {
    let study_id = seed_study(&pool, "ABC", "Alphabet Study").await;
    let user_id = seed_user(&pool, "Jane Doe").await;
    let user = users::get(&pool, user_id).await.unwrap().unwrap();

    assert!(!users::has_study_access(&pool, &user, study_id).await.unwrap());

    grant_access(&pool, study_id, user_id, false).await;
    assert!(users::has_study_access(&pool, &user, study_id).await.unwrap());
}

#[sqlx::test]
async fn dashboard_admins_see_every_study(pool: PgPool) {
    let study_id = seed_study(&pool, "ABC", "Alphabet Study").await;
    let admin_id = seed_admin(&pool, "Head Admin").await;
    let admin = users::get(&pool, admin_id).await.unwrap().unwrap();

    assert!(users::has_study_access(&pool, &admin, study_id).await.unwrap());
    assert!(users::is_study_admin(&pool, &admin, study_id).await.unwrap());
}

#[sqlx::test]
async fn plain_grants_do_not_confer_study_admin(pool: PgPool) {
    let study_id = seed_study(&pool, "ABC", "Alphabet Study").await;
    let user_id = seed_user(&pool, "Jane Doe").await;
    let user = users::get(&pool, user_id).await.unwrap().unwrap();

    grant_access(&pool, study_id, user_id, false).await;
    assert!(!users::is_study_admin(&pool, &user, study_id).await.unwrap());

    users::revoke_access(&pool, study_id, user_id).await.unwrap();
    grant_access(&pool, study_id, user_id, true).await;
    assert!(users::is_study_admin(&pool, &user, study_id).await.unwrap());
}

#[sqlx::test]
async fn revoking_all_access_clears_every_grant(pool: PgPool) {
    let first = seed_study(&pool, "ABC", "Alphabet Study").await;
    let second = seed_study(&pool, "XYZ", "Other Study").await;
    let user_id = seed_user(&pool, "Jane Doe").await;

    grant_access(&pool, first, user_id, false).await;
    grant_access(&pool, second, user_id, true).await;

    let revoked = users::revoke_all_access(&pool, user_id).await.unwrap();
    assert_eq!(revoked, 2);

    let grants = users::list_grants(&pool, user_id).await.unwrap();
    assert!(grants.is_empty());
}

#[sqlx::test]
async fn visible_studies_follow_grants(pool: PgPool) {
    let first = seed_study(&pool, "ABC", "Alphabet Study").await;
    let _second = seed_study(&pool, "XYZ", "Other Study").await;
    let user_id = seed_user(&pool, "Jane Doe").await;
    let user = users::get(&pool, user_id).await.unwrap().unwrap();

    grant_access(&pool, first, user_id, false).await;

    let studies = users::get_studies(&pool, &user).await.unwrap();
    assert_eq!(studies.len(), 1);
    assert_eq!(studies[0].nickname, "ABC");
}

#[sqlx::test]
async fn session_tokens_resolve_until_destroyed(pool: PgPool) {
    let user_id = seed_user(&pool, "Jane Doe").await;
    let cache = SessionCache::new(pool.clone());

    let token = cache.create(user_id).await.expect("create failed");
    let resolved = cache.resolve(&token).await.expect("resolve failed");
    assert_eq!(resolved.map(|u| u.id), Some(user_id));

    cache.destroy(&token).await.expect("destroy failed");
    let resolved = cache.resolve(&token).await.expect("resolve failed");
    assert!(resolved.is_none());
}

#[sqlx::test]
async fn unknown_session_tokens_resolve_to_nobody(pool: PgPool) {
    let cache = SessionCache::new(pool.clone());
    let resolved = cache.resolve("not-a-real-token").await.expect("resolve failed");
    assert!(resolved.is_none());
}
