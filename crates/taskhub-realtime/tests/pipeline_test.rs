//! End-to-end tests of the notification pipeline with fake adapters.

mod helpers;

use serde_json::json;

use taskhub_core::types::{AuthSession, TaskId, UserId};
use taskhub_realtime::bridge::PushMessage;
use taskhub_realtime::notification::record::{NotificationId, NotificationKind, NotificationRecord};
use taskhub_realtime::notification::Route;
use taskhub_realtime::subscription::fake::FakePushPlatform;
use taskhub_realtime::subscription::PermissionState;
use taskhub_realtime::NotifyError;

use helpers::{TestPipeline, wait_until};

fn record(id: &str, body: &str) -> NotificationRecord {
    NotificationRecord::new(NotificationId::new(id), NotificationKind::Generic, "Notifikasi", body)
}

#[tokio::test]
async fn test_mark_read_updates_unread_count() {
    let pipeline = TestPipeline::new(FakePushPlatform::new());
    let store = pipeline.context.store();
    let presenter = pipeline.context.presenter();

    store.append(
        NotificationRecord::new(
            NotificationId::new("e1"),
            NotificationKind::TaskCreated,
            "Tugas Baru",
            "Matematika",
        )
        .with_task(Some(TaskId::new(1))),
    );
    assert_eq!(presenter.unread_count(), 1);

    assert!(store.mark_read(&NotificationId::new("e1")));
    assert_eq!(presenter.unread_count(), 0);

    pipeline.stop().await;
}

#[tokio::test]
async fn test_history_is_bounded_to_twenty() {
    let pipeline = TestPipeline::new(FakePushPlatform::new());
    let store = pipeline.context.store();

    for i in 0..21 {
        store.append(record(&format!("r{i}"), "x"));
    }

    assert_eq!(store.len(), 20);
    assert!(!store.contains(&NotificationId::new("r0")));
    assert_eq!(store.latest_id(), Some(NotificationId::new("r20")));

    pipeline.stop().await;
}

#[tokio::test]
async fn test_subscribe_with_denied_permission() {
    let pipeline = TestPipeline::new(FakePushPlatform::new().with_permission(PermissionState::Denied));
    let subscriptions = pipeline.context.subscriptions();

    assert!(!subscriptions.subscribe().await);

    let state = subscriptions.state();
    assert_eq!(state.error, Some(NotifyError::PermissionDenied));
    assert!(!state.subscribed);
    assert!(pipeline.registry.registered().is_empty());

    pipeline.stop().await;
}

#[tokio::test]
async fn test_task_created_event_routes_to_task_detail() {
    let pipeline = TestPipeline::new(FakePushPlatform::new().with_permission(PermissionState::Granted));
    let context = &pipeline.context;

    assert!(
        context
            .on_auth_change(AuthSession::authenticated(UserId::new(9), "token"))
            .await
    );
    assert_eq!(pipeline.transport.opened()[0].channel.wire_name(), "private-user.9");

    let delivered = pipeline
        .transport
        .emit(
            ".task.created",
            json!({
                "type": "task_created",
                "task": {"id": 42, "judul": "Laporan Praktikum", "target": "kelas-7"},
                "message": "Tugas baru: Laporan Praktikum",
                "timestamp": "2026-03-01T08:00:00.000000Z"
            }),
        )
        .await;
    assert!(delivered);

    wait_until(|| context.store().len() == 1).await;
    let record = context.store().snapshot().remove(0);
    assert_eq!(record.related_task_id, Some(TaskId::new(42)));
    assert_eq!(record.kind, NotificationKind::TaskCreated);
    assert_eq!(
        context.presenter().route_for(&record),
        Route::TaskDetail {
            task_id: TaskId::new(42)
        }
    );
    assert_eq!(pipeline.notifier.get("task-42").map(|n| n.body), Some(record.body.clone()));

    assert_eq!(context.open(&record.id).map(|r| r.path()), Some("/dashboard/42".to_string()));
    assert_eq!(context.presenter().unread_count(), 0);

    pipeline.stop().await;
}

#[tokio::test]
async fn test_duplicate_id_keeps_first_version() {
    let pipeline = TestPipeline::new(FakePushPlatform::new());
    let store = pipeline.context.store();

    assert!(store.append(record("same", "first")).is_inserted());
    assert!(!store.append(record("same", "second")).is_inserted());

    let records = store.snapshot();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].body, "first");

    pipeline.stop().await;
}

#[tokio::test]
async fn test_redelivered_event_is_recorded_once() {
    let pipeline = TestPipeline::new(FakePushPlatform::new().with_permission(PermissionState::Granted));
    let context = &pipeline.context;
    context
        .on_auth_change(AuthSession::authenticated(UserId::new(3), "token"))
        .await;

    let payload = json!({
        "type": "user_followed",
        "follower": {"id": 5, "username": "sari", "name": "Sari"},
        "message": "sari mulai mengikuti kamu",
        "timestamp": "ts-follow"
    });
    pipeline.transport.emit(".user.followed", payload.clone()).await;
    pipeline.transport.emit(".user.followed", payload).await;
    pipeline
        .transport
        .emit(".task.submitted", json!({"task": {"id": 1, "judul": "A", "target": "x"}, "message": "m", "timestamp": "ts-last"}))
        .await;

    wait_until(|| context.store().contains(&NotificationId::new("ts-last"))).await;
    assert_eq!(context.store().len(), 2);
    assert_eq!(pipeline.notifier.shown_count(), 2);

    let followed = context
        .store()
        .get(&NotificationId::new("ts-follow"))
        .expect("follow recorded");
    assert_eq!(
        context.presenter().route_for(&followed),
        Route::Profile {
            username: "sari".to_string()
        }
    );

    pipeline.stop().await;
}

#[tokio::test]
async fn test_system_notifications_need_granted_permission() {
    let pipeline = TestPipeline::new(FakePushPlatform::new());
    let context = &pipeline.context;
    context
        .on_auth_change(AuthSession::authenticated(UserId::new(3), "token"))
        .await;

    pipeline
        .transport
        .emit(".task.created", json!({"task": {"id": 8, "judul": "B", "target": "x"}, "message": "m", "timestamp": "t1"}))
        .await;
    wait_until(|| context.store().len() == 1).await;
    assert_eq!(pipeline.notifier.shown_count(), 0);

    pipeline.platform.set_permission(PermissionState::Granted);
    pipeline
        .transport
        .emit(".task.created", json!({"task": {"id": 8, "judul": "B", "target": "x"}, "message": "m2", "timestamp": "t2"}))
        .await;
    wait_until(|| context.store().len() == 2).await;
    assert_eq!(pipeline.notifier.shown_count(), 1);

    pipeline.stop().await;
}

#[tokio::test]
async fn test_logout_disconnects_and_bridge_keeps_delivering() {
    let pipeline = TestPipeline::new(FakePushPlatform::new());
    let context = &pipeline.context;
    context
        .on_auth_change(AuthSession::authenticated(UserId::new(3), "token"))
        .await;
    assert!(!context.on_auth_change(AuthSession::anonymous()).await);
    assert!(pipeline.transport.is_released(0));

    context
        .delivery()
        .send(PushMessage::new("Tugas Baru", "dari latar belakang"))
        .await
        .expect("bridge accepts");
    wait_until(|| context.store().len() == 1).await;
    assert_eq!(context.store().snapshot()[0].body, "dari latar belakang");

    pipeline.stop().await;
}

#[tokio::test]
async fn test_pushed_url_is_the_click_target() {
    let pipeline = TestPipeline::new(FakePushPlatform::new());
    let context = &pipeline.context;

    let accepted = context
        .push_receiver()
        .receive(
            br#"{"title":"Tugas Dikumpulkan","body":"Siti","tag":"task-submitted-7",
                "data":{"taskId":7,"type":"task_submitted","url":"/dashboard/7/submissions"}}"#,
        )
        .await
        .expect("receive");
    assert!(accepted);

    let shown = pipeline.notifier.get("task-submitted-7").expect("shown");
    assert_eq!(shown.url.as_deref(), Some("/dashboard/7/submissions"));

    wait_until(|| context.store().len() == 1).await;
    let id = context.store().snapshot()[0].id.clone();
    assert_eq!(
        context.open(&id),
        Some(Route::Link {
            url: "/dashboard/7/submissions".to_string()
        })
    );
    assert_eq!(context.presenter().unread_count(), 0);

    pipeline.stop().await;
}
