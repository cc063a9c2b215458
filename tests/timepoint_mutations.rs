//! Tests for timepoint and session mutations: deletes, comments, sign-off,
//! and error-flag dismissals.

mod helpers;

use helpers::{seed_admin, seed_session, seed_site, seed_study, seed_timepoint, seed_user};
use scanboard::data::{sessions, timepoints};
use sqlx::PgPool;

async fn seed_basic_timepoint(pool: &PgPool) -> (i32, String) {
    let study_id = seed_study(pool, "ABC", "Alphabet Study").await;
    let site_id = seed_site(pool, "CMH").await;
    let timepoint_id = "ABC_CMH_0001_01";
    seed_timepoint(pool, timepoint_id, study_id, site_id).await;
    (study_id, timepoint_id.to_string())
}

#[sqlx::test]
async fn deleted_timepoint_is_gone_on_refetch(pool: PgPool) {
    let (study_id, timepoint_id) = seed_basic_timepoint(&pool).await;
    seed_session(&pool, &timepoint_id, 1, "ABC_CMH_0001_01_01").await;

    let fetched = timepoints::get(&pool, study_id, &timepoint_id)
        .await
        .expect("fetch failed");
    assert!(fetched.is_some(), "timepoint should exist before deletion");

    timepoints::delete(&pool, &timepoint_id)
        .await
        .expect("delete failed");

    let fetched = timepoints::get(&pool, study_id, &timepoint_id)
        .await
        .expect("fetch failed");
    assert!(fetched.is_none(), "deleted timepoint should not be found");

    // Sessions cascade with their timepoint.
    let session = sessions::get_by_name(&pool, "ABC_CMH_0001_01_01")
        .await
        .expect("fetch failed");
    assert!(session.is_none(), "sessions should cascade on delete");
}

#[sqlx::test]
async fn timepoint_is_not_addressable_through_another_study(pool: PgPool) {
    let (_study_id, timepoint_id) = seed_basic_timepoint(&pool).await;
    let other_study = seed_study(&pool, "XYZ", "Other Study").await;

    let fetched = timepoints::get(&pool, other_study, &timepoint_id)
        .await
        .expect("fetch failed");
    assert!(
        fetched.is_none(),
        "composite key fetch must not cross studies"
    );
}

#[sqlx::test]
async fn updating_a_comment_with_invalid_id_changes_nothing(pool: PgPool) {
    let (_study_id, timepoint_id) = seed_basic_timepoint(&pool).await;
    let user_id = seed_user(&pool, "Jane Doe").await;

    let comment = timepoints::add_comment(&pool, &timepoint_id, user_id, "first impression")
        .await
        .expect("add failed");

    let result =
        timepoints::update_comment(&pool, &timepoint_id, comment.id + 999, user_id, "edited").await;
    assert!(result.is_err(), "bogus comment id should fail");

    let comments = timepoints::list_comments(&pool, &timepoint_id)
        .await
        .expect("list failed");
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].comment, "first impression");
}

#[sqlx::test]
async fn only_the_author_may_update_a_comment(pool: PgPool) {
    let (_study_id, timepoint_id) = seed_basic_timepoint(&pool).await;
    let author = seed_user(&pool, "Jane Doe").await;
    let other = seed_user(&pool, "John Smith").await;

    let comment = timepoints::add_comment(&pool, &timepoint_id, author, "original")
        .await
        .expect("add failed");

    let result =
        timepoints::update_comment(&pool, &timepoint_id, comment.id, other, "hijacked").await;
    assert!(result.is_err(), "non-author update should fail");

    let result =
        timepoints::update_comment(&pool, &timepoint_id, comment.id, author, "clarified").await;
    assert!(result.is_ok(), "author update should succeed");

    let comments = timepoints::list_comments(&pool, &timepoint_id)
        .await
        .expect("list failed");
    assert_eq!(comments[0].comment, "clarified");
}

#[sqlx::test]
async fn deleting_a_comment_removes_only_that_comment(pool: PgPool) {
    let (_study_id, timepoint_id) = seed_basic_timepoint(&pool).await;
    let user_id = seed_user(&pool, "Jane Doe").await;

    let first = timepoints::add_comment(&pool, &timepoint_id, user_id, "keep me")
        .await
        .expect("add failed");
    let second = timepoints::add_comment(&pool, &timepoint_id, user_id, "delete me")
        .await
        .expect("add failed");

    timepoints::delete_comment(&pool, &timepoint_id, second.id)
        .await
        .expect("delete failed");

    let comments = timepoints::list_comments(&pool, &timepoint_id)
        .await
        .expect("list failed");
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].id, first.id);
}

#[sqlx::test]
async fn sign_off_records_the_reviewer(pool: PgPool) {
    let (_study_id, timepoint_id) = seed_basic_timepoint(&pool).await;
    let reviewer = seed_admin(&pool, "QC Lead").await;
    let session_id = seed_session(&pool, &timepoint_id, 1, "ABC_CMH_0001_01_01").await;

    sessions::sign_off(&pool, session_id, reviewer)
        .await
        .expect("sign off failed");

    let session = sessions::get(&pool, session_id)
        .await
        .expect("fetch failed")
        .expect("session should exist");
    assert_eq!(session.signed_off_by, Some(reviewer));
    assert!(session.signed_off_at.is_some());
}

#[sqlx::test]
async fn dismissing_survey_error_flags_the_session(pool: PgPool) {
    let (_study_id, timepoint_id) = seed_basic_timepoint(&pool).await;
    let session_id = seed_session(&pool, &timepoint_id, 2, "ABC_CMH_0001_01_02").await;

    timepoints::dismiss_redcap_error(&pool, &timepoint_id, 2)
        .await
        .expect("dismiss failed");

    let session = sessions::get(&pool, session_id)
        .await
        .expect("fetch failed")
        .expect("session should exist");
    assert!(session.redcap_dismissed);
}

#[sqlx::test]
async fn ignoring_missing_scans_records_who_and_why(pool: PgPool) {
    let (_study_id, timepoint_id) = seed_basic_timepoint(&pool).await;
    let admin = seed_admin(&pool, "QC Lead").await;
    let session_id = seed_session(&pool, &timepoint_id, 1, "ABC_CMH_0001_01_01").await;

    timepoints::ignore_missing_scans(&pool, &timepoint_id, 1, admin, "phantom run, no subject")
        .await
        .expect("ignore failed");

    let session = sessions::get(&pool, session_id)
        .await
        .expect("fetch failed")
        .expect("session should exist");
    assert_eq!(session.missing_scans_ignored_by, Some(admin));
    assert_eq!(
        session.missing_scans_comment.as_deref(),
        Some("phantom run, no subject")
    );
}

#[sqlx::test]
async fn dismissals_reject_unknown_session_numbers(pool: PgPool) {
    let (_study_id, timepoint_id) = seed_basic_timepoint(&pool).await;
    let admin = seed_admin(&pool, "QC Lead").await;

    assert!(timepoints::dismiss_redcap_error(&pool, &timepoint_id, 9)
        .await
        .is_err());
    assert!(
        timepoints::ignore_missing_scans(&pool, &timepoint_id, 9, admin, "nope")
            .await
            .is_err()
    );
}
