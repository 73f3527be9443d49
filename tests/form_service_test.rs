mod common;

use bytes::Bytes;
use common::{
    CountingPreviews, FlakyRecords, MockStorage, doc_input, init_tracing, png_upload, test_config,
    vehicle_input,
};
use showroom_backend::config::{AppConfig, CloseBehavior};
use showroom_backend::models::{NewDocumentation, NewVehicle, RecordFields, RecordKind};
use showroom_backend::services::form_service::{
    FormError, FormService, ImageView, SessionState, UploadedFile,
};
use showroom_backend::services::records::RecordStore;
use showroom_backend::staging::StagingError;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

struct Harness {
    forms: Arc<FormService>,
    records: Arc<FlakyRecords>,
    storage: Arc<MockStorage>,
    previews: Arc<CountingPreviews>,
}

fn harness_with(storage: MockStorage, config: AppConfig) -> Harness {
    init_tracing();
    let records = Arc::new(FlakyRecords::new());
    let storage = Arc::new(storage);
    let previews = Arc::new(CountingPreviews::new());
    let forms = Arc::new(FormService::new(
        records.clone(),
        storage.clone(),
        previews.clone(),
        config,
    ));
    Harness {
        forms,
        records,
        storage,
        previews,
    }
}

fn harness() -> Harness {
    harness_with(MockStorage::new(), test_config())
}

async fn seed_documentation(records: &FlakyRecords, owner: &str, urls: &[&str]) -> String {
    let record = NewDocumentation::from_input(
        owner,
        doc_input("Week 1"),
        urls.iter().map(|u| u.to_string()).collect(),
    );
    records.inner.insert_documentation(record).await.unwrap().id
}

fn doc_fields(title: &str) -> RecordFields {
    RecordFields::Documentation(doc_input(title))
}

#[tokio::test]
async fn test_new_documentation_submit_uploads_and_inserts() {
    let h = harness();
    let view = h
        .forms
        .open("alice", RecordKind::Documentation, None)
        .await
        .unwrap();
    assert_eq!(view.max_images, 5);
    assert_eq!(view.remaining_slots, 5);

    let view = h
        .forms
        .add_files("alice", view.session_id, vec![png_upload("a.png"), png_upload("b.png")])
        .await
        .unwrap();
    assert_eq!(view.images.len(), 2);
    match &view.images[0] {
        ImageView::Local {
            preview_url,
            filename,
            width,
            ..
        } => {
            assert!(preview_url.starts_with("/previews/"));
            assert_eq!(filename, "a.png");
            assert_eq!(*width, Some(1));
        }
        other => panic!("expected a local image, got {:?}", other),
    }

    let record = h
        .forms
        .submit("alice", view.session_id, doc_fields("Day 1"))
        .await
        .unwrap();

    assert_eq!(h.storage.upload_count(), 2);
    for path in h.storage.paths() {
        assert!(path.starts_with("ojt-documentations/alice/"));
    }
    let docs = h.records.inner.list_documentations("alice").await.unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].id, record.id());
    assert_eq!(docs[0].image_urls.len(), 2);

    // Submit closes the form and releases its previews
    assert_eq!(h.forms.session_count(), 0);
    h.previews.assert_balanced();
    assert!(matches!(
        h.forms.view("alice", view.session_id).await,
        Err(FormError::SessionNotFound)
    ));
}

#[tokio::test]
async fn test_edit_remove_existing_then_submit_without_uploads() {
    let h = harness();
    let id = seed_documentation(&h.records, "alice", &["url1", "url2"]).await;

    let view = h
        .forms
        .open("alice", RecordKind::Documentation, Some(&id))
        .await
        .unwrap();
    assert_eq!(view.remaining_slots, 3);

    h.forms
        .remove_image("alice", view.session_id, 0)
        .await
        .unwrap();
    h.forms
        .submit("alice", view.session_id, doc_fields("Week 1 revised"))
        .await
        .unwrap();

    assert_eq!(h.storage.call_count(), 0);
    let doc = h
        .records
        .inner
        .get_documentation("alice", &id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(doc.image_urls, vec!["url2".to_string()]);
    assert_eq!(doc.title, "Week 1 revised");
}

#[tokio::test]
async fn test_upload_failure_leaves_record_untouched() {
    let h = harness_with(MockStorage::failing_on(1), test_config());
    let id = seed_documentation(&h.records, "alice", &["url1"]).await;

    let view = h
        .forms
        .open("alice", RecordKind::Documentation, Some(&id))
        .await
        .unwrap();
    h.forms
        .add_files("alice", view.session_id, vec![png_upload("fileA.png")])
        .await
        .unwrap();

    let err = h
        .forms
        .submit("alice", view.session_id, doc_fields("Changed"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        FormError::Staging(StagingError::UploadFailure { .. })
    ));

    let doc = h
        .records
        .inner
        .get_documentation("alice", &id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(doc.image_urls, vec!["url1".to_string()]);
    assert_eq!(doc.title, "Week 1");
    assert_eq!(h.records.writes.load(Ordering::SeqCst), 0);

    // The form stays open with the message, ready for a retry
    let view = h.forms.view("alice", view.session_id).await.unwrap();
    assert_eq!(view.state, SessionState::Open);
    assert_eq!(view.images.len(), 2);
    assert!(view.error.unwrap().contains("Failed to upload"));
    assert_eq!(h.previews.live(), 1);
}

#[tokio::test]
async fn test_record_write_failure_keeps_form_open() {
    let h = harness();
    let view = h
        .forms
        .open("alice", RecordKind::Documentation, None)
        .await
        .unwrap();
    h.forms
        .add_files("alice", view.session_id, vec![png_upload("a.png")])
        .await
        .unwrap();

    h.records.fail_writes.store(true, Ordering::SeqCst);
    let err = h
        .forms
        .submit("alice", view.session_id, doc_fields("Day 2"))
        .await
        .unwrap_err();
    assert!(matches!(err, FormError::RecordWriteFailure(_)));
    // Blob was stored before the write failed
    assert_eq!(h.storage.upload_count(), 1);

    let view = h.forms.view("alice", view.session_id).await.unwrap();
    assert_eq!(view.state, SessionState::Open);
    assert!(view.error.is_some());

    h.records.fail_writes.store(false, Ordering::SeqCst);
    h.forms
        .submit("alice", view.session_id, doc_fields("Day 2"))
        .await
        .unwrap();
    assert_eq!(h.storage.upload_count(), 2);
    h.previews.assert_balanced();
}

#[tokio::test]
async fn test_capacity_error_is_reported_on_the_form() {
    let h = harness();
    let view = h
        .forms
        .open("alice", RecordKind::Documentation, None)
        .await
        .unwrap();

    let batch = (0..6).map(|i| png_upload(&format!("{}.png", i))).collect();
    let err = h
        .forms
        .add_files("alice", view.session_id, batch)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        FormError::Staging(StagingError::CapacityExceeded { max: 5, remaining: 5 })
    ));

    let view = h.forms.view("alice", view.session_id).await.unwrap();
    assert!(view.images.is_empty());
    assert!(view.error.as_deref().unwrap().contains("5 slot(s) remaining"));

    // A good batch clears the message
    let view = h
        .forms
        .add_files("alice", view.session_id, vec![png_upload("ok.png")])
        .await
        .unwrap();
    assert!(view.error.is_none());
}

#[tokio::test]
async fn test_invalid_file_rejects_whole_batch() {
    let h = harness();
    let view = h
        .forms
        .open("alice", RecordKind::Documentation, None)
        .await
        .unwrap();

    let not_an_image = UploadedFile {
        filename: "notes.txt".to_string(),
        content_type: Some("image/png".to_string()),
        data: Bytes::from_static(b"just some text"),
    };
    let err = h
        .forms
        .add_files(
            "alice",
            view.session_id,
            vec![png_upload("a.png"), not_an_image],
        )
        .await
        .unwrap_err();

    match err {
        FormError::Staging(StagingError::InvalidFile(msg)) => assert!(msg.contains("notes.txt")),
        other => panic!("unexpected error {:?}", other),
    }
    let view = h.forms.view("alice", view.session_id).await.unwrap();
    assert!(view.images.is_empty());
    assert_eq!(h.previews.created(), 0);
}

#[tokio::test]
async fn test_vehicle_form_single_image() {
    let h = harness();
    let vehicle = h
        .records
        .inner
        .insert_vehicle(NewVehicle::from_input(
            vehicle_input(),
            vec!["https://cdn.test/old.png".to_string()],
        ))
        .await
        .unwrap();

    let view = h
        .forms
        .open("admin", RecordKind::Vehicle, Some(&vehicle.id))
        .await
        .unwrap();
    assert_eq!(view.max_images, 1);
    assert_eq!(view.remaining_slots, 0);

    let err = h
        .forms
        .add_files("admin", view.session_id, vec![png_upload("new.png")])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        FormError::Staging(StagingError::CapacityExceeded { max: 1, remaining: 0 })
    ));

    h.forms
        .remove_image("admin", view.session_id, 0)
        .await
        .unwrap();
    h.forms
        .add_files("admin", view.session_id, vec![png_upload("new.png")])
        .await
        .unwrap();
    h.forms
        .submit("admin", view.session_id, RecordFields::Vehicle(vehicle_input()))
        .await
        .unwrap();

    let saved = h.records.inner.get_vehicle(&vehicle.id).await.unwrap().unwrap();
    assert!(saved.image_url.contains("vehicle-images/vehicles/admin/"));
    assert!(saved.image_url.ends_with(".png"));
}

#[tokio::test]
async fn test_vehicle_form_ignores_larger_configured_limit() {
    let mut config = test_config();
    config.vehicle.max_images = 3;
    let h = harness_with(MockStorage::new(), config);

    let view = h
        .forms
        .open("admin", RecordKind::Vehicle, None)
        .await
        .unwrap();
    assert_eq!(view.max_images, 1);

    let err = h
        .forms
        .add_files(
            "admin",
            view.session_id,
            vec![png_upload("a.png"), png_upload("b.png"), png_upload("c.png")],
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        FormError::Staging(StagingError::CapacityExceeded { max: 1, remaining: 1 })
    ));

    h.forms
        .add_files("admin", view.session_id, vec![png_upload("a.png")])
        .await
        .unwrap();
    h.forms
        .submit("admin", view.session_id, RecordFields::Vehicle(vehicle_input()))
        .await
        .unwrap();

    // Only the stored image was uploaded; nothing is left orphaned
    assert_eq!(h.storage.upload_count(), 1);
    let vehicles = h.records.inner.list_vehicles().await.unwrap();
    assert_eq!(vehicles.len(), 1);
    assert!(vehicles[0].image_url.ends_with(&h.storage.paths()[0]));
}

#[tokio::test]
async fn test_submit_guards() {
    let h = harness();
    let view = h
        .forms
        .open("alice", RecordKind::Documentation, None)
        .await
        .unwrap();

    let err = h
        .forms
        .submit("alice", view.session_id, RecordFields::Vehicle(vehicle_input()))
        .await
        .unwrap_err();
    assert!(matches!(err, FormError::KindMismatch { .. }));

    let err = h
        .forms
        .submit("alice", view.session_id, doc_fields(""))
        .await
        .unwrap_err();
    assert!(matches!(err, FormError::Validation(_)));

    // Another user's session looks like it does not exist
    let err = h.forms.view("mallory", view.session_id).await.unwrap_err();
    assert!(matches!(err, FormError::SessionNotFound));
    let err = h.forms.close("mallory", view.session_id).await.unwrap_err();
    assert!(matches!(err, FormError::SessionNotFound));

    assert_eq!(h.storage.call_count(), 0);
    assert_eq!(h.records.writes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_open_requires_owner_and_existing_record() {
    let h = harness();
    let err = h
        .forms
        .open("", RecordKind::Documentation, None)
        .await
        .unwrap_err();
    assert!(matches!(err, FormError::Staging(StagingError::MissingOwner)));

    let id = seed_documentation(&h.records, "alice", &[]).await;
    let err = h
        .forms
        .open("bob", RecordKind::Documentation, Some(&id))
        .await
        .unwrap_err();
    assert!(matches!(err, FormError::RecordNotFound(_)));
}

#[tokio::test]
async fn test_cancel_releases_all_previews() {
    let h = harness();
    let view = h
        .forms
        .open("alice", RecordKind::Documentation, None)
        .await
        .unwrap();
    h.forms
        .add_files("alice", view.session_id, vec![png_upload("a.png"), png_upload("b.png")])
        .await
        .unwrap();
    h.forms
        .add_files("alice", view.session_id, vec![png_upload("c.png")])
        .await
        .unwrap();
    h.forms
        .remove_image("alice", view.session_id, 1)
        .await
        .unwrap();
    assert_eq!(h.previews.released(), 1);

    h.forms.close("alice", view.session_id).await.unwrap();

    assert_eq!(h.previews.created(), 3);
    h.previews.assert_balanced();
    assert_eq!(h.forms.session_count(), 0);
}

#[tokio::test]
async fn test_close_detaches_in_flight_submit() {
    let h = harness_with(MockStorage::held(), test_config());
    let view = h
        .forms
        .open("alice", RecordKind::Documentation, None)
        .await
        .unwrap();
    let id = view.session_id;
    h.forms
        .add_files("alice", id, vec![png_upload("a.png")])
        .await
        .unwrap();

    let forms = h.forms.clone();
    let submit = tokio::spawn(async move { forms.submit("alice", id, doc_fields("Day 3")).await });

    h.storage.started.notified().await;
    // Close returns while the upload is still stuck
    h.forms.close("alice", id).await.unwrap();
    h.previews.assert_balanced();

    h.storage.release();
    let result = submit.await.unwrap();
    assert!(matches!(result, Err(FormError::SubmitDiscarded)));

    // The stale result never reached the record store
    assert_eq!(h.records.writes.load(Ordering::SeqCst), 0);
    assert!(
        h.records
            .inner
            .list_documentations("alice")
            .await
            .unwrap()
            .is_empty()
    );
    assert_eq!(h.forms.session_count(), 0);
}

#[tokio::test]
async fn test_close_waits_for_in_flight_submit() {
    let config = AppConfig {
        close_behavior: CloseBehavior::Wait,
        ..test_config()
    };
    let h = harness_with(MockStorage::held(), config);
    let view = h
        .forms
        .open("alice", RecordKind::Documentation, None)
        .await
        .unwrap();
    let id = view.session_id;
    h.forms
        .add_files("alice", id, vec![png_upload("a.png")])
        .await
        .unwrap();

    let forms = h.forms.clone();
    let submit = tokio::spawn(async move { forms.submit("alice", id, doc_fields("Day 4")).await });
    h.storage.started.notified().await;

    let forms = h.forms.clone();
    let close = tokio::spawn(async move { forms.close("alice", id).await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!close.is_finished());
    assert_eq!(h.previews.live(), 1);

    h.storage.release();
    let record = submit.await.unwrap().unwrap();
    close.await.unwrap().unwrap();

    let docs = h.records.inner.list_documentations("alice").await.unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].id, record.id());
    h.previews.assert_balanced();
}

#[tokio::test]
async fn test_stalled_upload_times_out_and_reopens_form() {
    let config = AppConfig {
        close_behavior: CloseBehavior::Wait,
        upstream_timeout: Duration::from_millis(100),
        ..test_config()
    };
    // Never released: the upload hangs until the submit gives up on it
    let h = harness_with(MockStorage::held(), config);
    let view = h
        .forms
        .open("alice", RecordKind::Documentation, None)
        .await
        .unwrap();
    let id = view.session_id;
    h.forms
        .add_files("alice", id, vec![png_upload("a.png")])
        .await
        .unwrap();

    let err = h
        .forms
        .submit("alice", id, doc_fields("Day 5"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        FormError::Staging(StagingError::UploadFailure { .. })
    ));

    let view = h.forms.view("alice", id).await.unwrap();
    assert_eq!(view.state, SessionState::Open);
    assert!(view.error.is_some());
    assert_eq!(h.records.writes.load(Ordering::SeqCst), 0);

    // The submit gate is free again, so a waiting close does not block
    tokio::time::timeout(Duration::from_secs(1), h.forms.close("alice", id))
        .await
        .unwrap()
        .unwrap();
    h.previews.assert_balanced();
    assert_eq!(h.forms.session_count(), 0);
}

#[tokio::test]
async fn test_second_submit_is_rejected_while_one_is_in_flight() {
    let h = harness_with(MockStorage::held(), test_config());
    let view = h
        .forms
        .open("alice", RecordKind::Documentation, None)
        .await
        .unwrap();
    let id = view.session_id;
    h.forms
        .add_files("alice", id, vec![png_upload("a.png")])
        .await
        .unwrap();

    let forms = h.forms.clone();
    let first = tokio::spawn(async move { forms.submit("alice", id, doc_fields("Day 5")).await });
    h.storage.started.notified().await;

    let err = h
        .forms
        .submit("alice", id, doc_fields("Day 5"))
        .await
        .unwrap_err();
    assert!(matches!(err, FormError::SubmitInProgress));
    let err = h
        .forms
        .add_files("alice", id, vec![png_upload("b.png")])
        .await
        .unwrap_err();
    assert!(matches!(err, FormError::SubmitInProgress));

    h.storage.release();
    first.await.unwrap().unwrap();
    h.previews.assert_balanced();
}

#[tokio::test]
async fn test_sweep_idle_and_shutdown() {
    let h = harness();
    let idle = h
        .forms
        .open("alice", RecordKind::Documentation, None)
        .await
        .unwrap();
    h.forms
        .add_files("alice", idle.session_id, vec![png_upload("a.png")])
        .await
        .unwrap();

    assert_eq!(h.forms.sweep_idle(Duration::from_secs(3600)), 0);
    assert_eq!(h.forms.sweep_idle(Duration::ZERO), 1);
    h.previews.assert_balanced();

    let view = h
        .forms
        .open("bob", RecordKind::Documentation, None)
        .await
        .unwrap();
    h.forms
        .add_files("bob", view.session_id, vec![png_upload("b.png")])
        .await
        .unwrap();
    assert_eq!(h.forms.shutdown().await, 1);
    assert_eq!(h.forms.session_count(), 0);
    h.previews.assert_balanced();
}
