//! Integration tests for the demo-session reset cycle
//!
//! Every test drives a `DemoSession` over an in-memory platform that requires
//! a logged-in session for data calls, the same way the hosted backend does.

use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use vox_backend::{DocumentStore, Fault, FaultKind, MemoryBackend, Operation};
use vox_core::{
    change_fields, pref_keys, ChangeTarget, DemoState, DocumentRef, TrackedChange,
    DEFAULT_FOLLOWED_ASSOCIATION, DEMO_EMAIL,
};
use vox_demo::{DemoConfig, DemoError, DemoNotice, DemoSession, Platform};

const DEMO_PASSWORD: &str = "demo-password";
const STUDENT_EMAIL: &str = "student@voxcampus.app";
const STUDENT_PASSWORD: &str = "student-password";
const DB: &str = "voxcampus";

async fn create_test_backend(latency: Option<Duration>) -> Arc<MemoryBackend> {
    let backend = match latency {
        Some(latency) => MemoryBackend::new().with_latency(latency),
        None => MemoryBackend::new(),
    };
    backend
        .register_account(DEMO_EMAIL, DEMO_PASSWORD, Some("Demo Visitor"))
        .await;
    backend
        .register_account(STUDENT_EMAIL, STUDENT_PASSWORD, Some("Student"))
        .await;
    backend.set_require_session(true).await;
    Arc::new(backend)
}

fn create_test_session(backend: &Arc<MemoryBackend>) -> DemoSession {
    DemoSession::new(Platform::from_backend(backend.clone()), DemoConfig::test())
}

fn body(text: &str) -> Map<String, Value> {
    let mut data = Map::new();
    data.insert("body".into(), json!(text));
    data
}

async fn tracked_count(backend: &MemoryBackend, demo: &DemoSession) -> usize {
    backend
        .document_count(DB, demo.tracking_store().collection())
        .await
}

// ============ Undo Tests ============

#[tokio::test]
async fn test_reset_is_idempotent() {
    let backend = create_test_backend(None).await;
    let demo = create_test_session(&backend);
    demo.login(DEMO_EMAIL, DEMO_PASSWORD).await.unwrap();

    let mutations = demo.mutations(DEMO_EMAIL);
    mutations
        .create_document(DB, "posts", None, body("first"))
        .await
        .unwrap();
    mutations
        .create_document(DB, "comments", None, body("second"))
        .await
        .unwrap();
    assert_eq!(tracked_count(&backend, &demo).await, 2);

    let first = demo.reset_demo_user_session().await;
    assert!(first.is_complete());
    assert_eq!(first.targets_deleted, 2);
    assert_eq!(tracked_count(&backend, &demo).await, 0);

    let second = demo.reset_demo_user_session().await;
    assert!(second.is_complete());
    assert!(second.errors.is_empty());
    assert_eq!(second.fetched, 0);
    assert_eq!(demo.state().await.unwrap(), DemoState::Clean);
}

#[tokio::test]
async fn test_already_absent_target_still_clears_record() {
    let backend = create_test_backend(None).await;
    let demo = create_test_session(&backend);
    demo.login(DEMO_EMAIL, DEMO_PASSWORD).await.unwrap();

    let doc = demo
        .mutations(DEMO_EMAIL)
        .create_document(DB, "posts", Some("gone"), body("x"))
        .await
        .unwrap();
    backend.delete_document(DB, "posts", &doc.id).await.unwrap();

    let report = demo.reset_demo_user_session().await;

    assert!(report.is_complete());
    assert_eq!(report.already_absent, 1);
    assert_eq!(report.records_deleted, 1);
    assert_eq!(tracked_count(&backend, &demo).await, 0);
}

#[tokio::test]
async fn test_failed_target_keeps_record_for_next_reset() {
    let backend = create_test_backend(None).await;
    let demo = create_test_session(&backend);
    demo.login(DEMO_EMAIL, DEMO_PASSWORD).await.unwrap();

    demo.mutations(DEMO_EMAIL)
        .create_document(DB, "posts", Some("sticky"), body("x"))
        .await
        .unwrap();
    backend
        .inject(Fault::new(Operation::DeleteDocument, FaultKind::RateLimited).on("posts"))
        .await;

    let report = demo.reset_demo_user_session().await;
    assert_eq!(report.target_failures, 1);
    assert_eq!(report.rate_limited, 1);
    assert!(!report.is_complete());
    assert_eq!(demo.state().await.unwrap(), DemoState::Dirty { outstanding: 1 });

    backend.clear_faults().await;
    let retry = demo.reset_demo_user_session().await;
    assert!(retry.is_complete());
    assert_eq!(backend.document_count(DB, "posts").await, 0);
    assert_eq!(tracked_count(&backend, &demo).await, 0);
}

#[tokio::test]
async fn test_unrecognized_kind_is_skipped_and_consumed() {
    let backend = create_test_backend(None).await;
    let demo = create_test_session(&backend);
    demo.login(DEMO_EMAIL, DEMO_PASSWORD).await.unwrap();

    let mutations = demo.mutations(DEMO_EMAIL);
    for text in ["first", "second"] {
        mutations
            .create_document(DB, "posts", None, body(text))
            .await
            .unwrap();
    }

    // A record written by a newer client with a kind this one does not know
    let mut fields = TrackedChange::new(
        ChangeTarget::Document(DocumentRef::new(DB, "posts", "elsewhere")),
        DEMO_EMAIL,
    )
    .to_fields();
    fields.insert(change_fields::CHANGE_KIND.into(), json!("hologram"));
    backend
        .create_document(DB, demo.tracking_store().collection(), "hologram-1", fields)
        .await
        .unwrap();

    let report = demo.reset_demo_user_session().await;

    assert!(report.is_complete());
    assert_eq!(report.fetched, 3);
    assert_eq!(report.targets_deleted, 2);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.records_deleted, 3);
    assert_eq!(backend.document_count(DB, "posts").await, 0);
    assert_eq!(tracked_count(&backend, &demo).await, 0);
}

#[tokio::test]
async fn test_failed_record_delete_does_not_abort_batch() {
    let backend = create_test_backend(None).await;
    let demo = create_test_session(&backend);
    demo.login(DEMO_EMAIL, DEMO_PASSWORD).await.unwrap();

    let mutations = demo.mutations(DEMO_EMAIL);
    for text in ["one", "two", "three"] {
        mutations
            .create_document(DB, "posts", None, body(text))
            .await
            .unwrap();
    }
    backend
        .inject(
            Fault::new(Operation::DeleteDocument, FaultKind::Network)
                .on(demo.tracking_store().collection())
                .times(1),
        )
        .await;

    let report = demo.reset_demo_user_session().await;

    assert_eq!(report.fetched, 3);
    assert_eq!(report.targets_deleted, 3);
    assert_eq!(report.records_deleted, 2);
    assert_eq!(report.record_failures, 1);
    assert!(!report.is_complete());
    assert_eq!(backend.document_count(DB, "posts").await, 0);
    assert_eq!(tracked_count(&backend, &demo).await, 1);

    // The leftover record points at a target that is already gone
    let retry = demo.reset_demo_user_session().await;
    assert!(retry.is_complete());
    assert_eq!(retry.already_absent, 1);
    assert_eq!(tracked_count(&backend, &demo).await, 0);
}

#[tokio::test]
async fn test_tracking_failure_does_not_fail_mutation() {
    let backend = create_test_backend(None).await;
    let demo = create_test_session(&backend);
    demo.login(DEMO_EMAIL, DEMO_PASSWORD).await.unwrap();

    backend
        .inject(
            Fault::new(Operation::CreateDocument, FaultKind::Network)
                .on(demo.tracking_store().collection()),
        )
        .await;

    let doc = demo
        .mutations(DEMO_EMAIL)
        .create_document(DB, "posts", Some("kept"), body("x"))
        .await
        .unwrap();

    assert_eq!(doc.id, "kept");
    assert_eq!(backend.document_count(DB, "posts").await, 1);
    assert_eq!(tracked_count(&backend, &demo).await, 0);
}

#[tokio::test]
async fn test_preference_reset_replaces_whole_bag() {
    let backend = create_test_backend(None).await;
    let demo = create_test_session(&backend);
    demo.login(DEMO_EMAIL, DEMO_PASSWORD).await.unwrap();

    let mutations = demo.mutations(DEMO_EMAIL);
    mutations
        .update_preference("testPreference", json!("x"))
        .await
        .unwrap();
    mutations.follow_association("chess_club").await.unwrap();

    assert!(demo.reset_preferences().await);

    let prefs = backend.prefs_of(DEMO_EMAIL).await.unwrap();
    assert!(!prefs.contains_key("testPreference"));
    assert!(prefs.followed_associations().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_undo_deletes_strictly_one_at_a_time() {
    let backend = create_test_backend(Some(Duration::from_millis(20))).await;
    let demo = create_test_session(&backend);
    demo.login(DEMO_EMAIL, DEMO_PASSWORD).await.unwrap();

    let mutations = demo.mutations(DEMO_EMAIL);
    for i in 0..3 {
        mutations
            .create_document(DB, "posts", Some(&format!("post{}", i)), body("x"))
            .await
            .unwrap();
    }
    for i in 0..2 {
        mutations
            .upload_file("avatars", &format!("file{}", i), "a.png", vec![0u8; 4])
            .await
            .unwrap();
    }

    backend.clear_calls().await;
    let report = demo.reset_demo_user_session().await;

    assert!(report.is_complete());
    assert_eq!(report.groups, 2);
    assert_eq!(report.targets_deleted, 5);
    assert_eq!(report.records_deleted, 5);
    assert_eq!(backend.document_count(DB, "posts").await, 0);
    assert!(!backend.has_file("avatars", "file0").await);

    let deletes: Vec<_> = backend
        .calls()
        .await
        .into_iter()
        .filter(|c| c.op.is_delete())
        .collect();
    assert_eq!(deletes.len(), 10);
    for (i, a) in deletes.iter().enumerate() {
        for b in &deletes[i + 1..] {
            assert!(!a.overlaps(b), "{:?} overlaps {:?}", a, b);
        }
    }
    assert_eq!(backend.max_in_flight(), 1);
}

// ============ Lifecycle Tests ============

#[tokio::test]
async fn test_end_to_end_demo_cycle() {
    let backend = create_test_backend(None).await;
    let demo = create_test_session(&backend);

    let login = demo.login(DEMO_EMAIL, DEMO_PASSWORD).await.unwrap();
    assert!(login.is_demo);
    assert_eq!(login.notice, Some(DemoNotice::Ephemeral));

    let mutations = demo.mutations(DEMO_EMAIL);
    mutations.follow_association("test_assoc_1").await.unwrap();
    mutations.follow_association("test_assoc_2").await.unwrap();
    let followed = backend
        .prefs_of(DEMO_EMAIL)
        .await
        .unwrap()
        .followed_associations();
    assert!(followed.contains(&"test_assoc_1".to_string()));
    assert!(followed.contains(&"test_assoc_2".to_string()));

    let connection = mutations
        .create_relation(DB, "connections", None, body("hello"), "connection")
        .await
        .unwrap();

    let logout = demo.logout(DEMO_EMAIL).await;
    assert!(logout.is_demo);
    assert!(logout.session_terminated);
    assert!(logout.undo.as_ref().is_some_and(|u| u.is_complete()));
    assert!(backend
        .prefs_of(DEMO_EMAIL)
        .await
        .unwrap()
        .followed_associations()
        .is_empty());
    assert!(!backend.has_session().await);

    demo.login(DEMO_EMAIL, DEMO_PASSWORD).await.unwrap();

    let prefs = backend.prefs_of(DEMO_EMAIL).await.unwrap();
    let followed = prefs.followed_associations();
    assert!(!followed.contains(&"test_assoc_1".to_string()));
    assert!(!followed.contains(&"test_assoc_2".to_string()));
    assert_eq!(followed, vec![DEFAULT_FOLLOWED_ASSOCIATION.to_string()]);
    assert!(prefs.contains_key(pref_keys::NOTIFICATIONS));

    let fetched = backend
        .get_document(DB, "connections", &connection.id)
        .await;
    assert!(fetched.is_err_and(|e| e.is_not_found()));
    assert_eq!(demo.state().await.unwrap(), DemoState::Clean);
}

#[tokio::test]
async fn test_non_demo_identity_is_never_tracked() {
    let backend = create_test_backend(None).await;
    let demo = create_test_session(&backend);

    let login = demo.login(STUDENT_EMAIL, STUDENT_PASSWORD).await.unwrap();
    assert!(!login.is_demo);
    assert!(login.notice.is_none());

    let mutations = demo.mutations(STUDENT_EMAIL);
    assert!(!mutations.is_tracked());
    for i in 0..4 {
        mutations
            .create_document(DB, "posts", None, body(&format!("post {}", i)))
            .await
            .unwrap();
    }
    mutations.follow_association("chess_club").await.unwrap();
    mutations
        .upload_file("avatars", "student_avatar", "me.png", vec![1, 2, 3])
        .await
        .unwrap();
    assert_eq!(tracked_count(&backend, &demo).await, 0);

    backend.clear_calls().await;
    let logout = demo.logout(STUDENT_EMAIL).await;

    assert!(!logout.is_demo);
    assert!(logout.undo.is_none());
    assert!(logout.session_terminated);
    assert_eq!(backend.calls().await.len(), 1);
    assert_eq!(backend.document_count(DB, "posts").await, 4);
}

#[tokio::test]
async fn test_login_rejects_bad_credentials() {
    let backend = create_test_backend(None).await;
    let demo = create_test_session(&backend);

    let err = demo.login(DEMO_EMAIL, "wrong").await.unwrap_err();
    assert!(matches!(err, DemoError::AuthenticationFailed(_)));
    assert!(!backend.has_session().await);
}

#[tokio::test]
async fn test_login_degrades_instead_of_failing() {
    let backend = create_test_backend(None).await;
    let demo = create_test_session(&backend);
    backend
        .inject(Fault::new(Operation::UpdatePrefs, FaultKind::Network))
        .await;

    let login = demo.login(DEMO_EMAIL, DEMO_PASSWORD).await.unwrap();

    assert!(login.is_demo);
    let notice = login.notice.unwrap();
    assert!(notice.is_degraded());
    assert!(!login.seed.unwrap().is_usable());
    assert!(!login.undo.unwrap().preferences_reset);
}

#[tokio::test]
async fn test_logout_reports_termination_failure() {
    let backend = create_test_backend(None).await;
    let demo = create_test_session(&backend);
    demo.login(DEMO_EMAIL, DEMO_PASSWORD).await.unwrap();
    demo.mutations(DEMO_EMAIL)
        .create_document(DB, "posts", None, body("x"))
        .await
        .unwrap();
    backend
        .inject(Fault::new(Operation::DeleteSession, FaultKind::Network))
        .await;

    let logout = demo.logout(DEMO_EMAIL).await;

    assert!(logout.access_logged);
    assert!(logout.undo.is_some_and(|u| u.targets_deleted == 1));
    assert!(!logout.session_terminated);
    assert!(logout.termination_error.is_some());
    assert_eq!(backend.document_count(DB, "demo_access_logs").await, 2);
}

#[tokio::test]
async fn test_init_tracking_creates_missing_store() {
    let backend = create_test_backend(None).await;
    backend.set_strict_collections(true).await;
    let demo = create_test_session(&backend);

    let login = demo.login(DEMO_EMAIL, DEMO_PASSWORD).await.unwrap();
    assert_eq!(login.store_status, Some(vox_demo::StoreStatus::Created));
    assert!(backend
        .has_collection(DB, demo.tracking_store().collection())
        .await);
    assert_eq!(
        demo.init_demo_session_tracking().await,
        vox_demo::StoreStatus::Ready
    );
}
