mod support;

use contexa_sdk::{
    Client, DeliveryContext, DeliveryLoop, ErrorBatch, PushEvent, PushKind, SdkError, SdkErrorCode,
};
use serde_json::json;
use std::sync::{Arc, Mutex};
use support::{FakeService, ScriptedPresenter};

fn event(name: &str, id: u64) -> serde_json::Value {
    json!({
        "type": "event",
        "event": { "id": id, "name": name },
        "identifier": "sub1",
        "timestamp": 1_700_000_000,
        "data": { "place": "office" },
    })
}

fn error_payload() -> serde_json::Value {
    json!({
        "type": "errors",
        "errors": [
            { "code": 1001, "message": "bluetooth is off" },
            { "code": 1005, "message": "motion access denied" },
        ],
    })
}

/// Client whose delivery loop only runs when the test drives it.
fn client_with_loop() -> (Client, Arc<ScriptedPresenter>, DeliveryLoop) {
    support::init_logging();
    let (delivery, delivery_loop) = DeliveryContext::channel();
    let presenter = Arc::new(ScriptedPresenter::new());
    let client = Client::new(Arc::new(FakeService::new()), presenter.clone(), delivery);
    client.configure("X", "Y").expect("configure");
    (client, presenter, delivery_loop)
}

type Seen = Arc<Mutex<Vec<String>>>;

fn recorder(seen: &Seen, tag: &'static str) -> impl Fn(&PushEvent) + Send + Sync + 'static {
    let seen = Arc::clone(seen);
    move |event: &PushEvent| {
        seen.lock().expect("seen mutex poisoned").push(format!("{tag}:{}", event.event_name));
    }
}

#[tokio::test]
async fn exact_listeners_shadow_wildcards() {
    let (client, _presenter, delivery_loop) = client_with_loop();
    tokio::spawn(delivery_loop.run());
    let seen: Seen = Arc::default();
    let push = client.push();
    let arrived = push.on_event("user.arrived", recorder(&seen, "exact"));
    push.on_any_event(recorder(&seen, "any"));

    assert_eq!(push.deliver(&event("user.arrived", 1)).expect("deliver"), PushKind::TypedEvent);
    push.deliver(&event("user.left", 2)).expect("deliver");
    client.delivery().flush().await;
    assert_eq!(
        *seen.lock().expect("seen mutex poisoned"),
        vec!["exact:user.arrived".to_owned(), "any:user.left".to_owned()]
    );

    assert!(push.remove_listener(arrived));
    assert!(!push.remove_listener(arrived));
    push.deliver(&event("user.arrived", 3)).expect("deliver");
    client.delivery().flush().await;
    assert_eq!(
        seen.lock().expect("seen mutex poisoned").last().map(String::as_str),
        Some("any:user.arrived")
    );
}

#[tokio::test]
async fn error_batches_reach_every_bus_listener_once() {
    let (client, presenter, delivery_loop) = client_with_loop();
    tokio::spawn(delivery_loop.run());
    let batches: Arc<Mutex<Vec<ErrorBatch>>> = Arc::default();
    for _ in 0..2 {
        let batches = Arc::clone(&batches);
        client.error_bus().subscribe(move |batch| {
            batches.lock().expect("batches mutex poisoned").push(batch.clone());
        });
    }

    let kind = client.push().deliver(&error_payload()).expect("deliver");
    client.delivery().flush().await;

    assert_eq!(kind, PushKind::ErrorBatch);
    let batches = batches.lock().expect("batches mutex poisoned");
    assert_eq!(batches.len(), 2);
    for batch in batches.iter() {
        assert_eq!(
            batch.codes(),
            vec![SdkErrorCode::BluetoothDisabled, SdkErrorCode::MotionDataDisabled]
        );
    }
    assert_eq!(presenter.error_notices(), 1);
}

#[tokio::test]
async fn unrecognized_payloads_touch_no_listener() {
    let (client, presenter, delivery_loop) = client_with_loop();
    tokio::spawn(delivery_loop.run());
    let seen: Seen = Arc::default();
    client.push().on_any_event(recorder(&seen, "any"));
    let bus_calls = Arc::new(Mutex::new(0usize));
    let counter = Arc::clone(&bus_calls);
    client.error_bus().subscribe(move |_| *counter.lock().expect("counter mutex poisoned") += 1);

    for payload in [
        json!({ "aps": { "alert": "hello" } }),
        json!({ "type": "event", "event": { "name": "" } }),
        json!({ "type": "errors", "errors": [] }),
        json!("just a string"),
    ] {
        assert_eq!(client.push().deliver(&payload).expect("deliver"), PushKind::Unrecognized);
    }
    client.delivery().flush().await;

    assert!(seen.lock().expect("seen mutex poisoned").is_empty());
    assert_eq!(*bus_calls.lock().expect("counter mutex poisoned"), 0);
    assert_eq!(presenter.error_notices(), 0);
}

#[tokio::test]
async fn automatic_hook_routes_like_manual_delivery() {
    let (client, _presenter, delivery_loop) = client_with_loop();
    tokio::spawn(delivery_loop.run());
    let seen: Seen = Arc::default();
    client.push().on_event("user.arrived", recorder(&seen, "exact"));

    let hook = client.push().register_automatic().expect("register");
    assert!(client.push().is_automatic());
    assert_eq!(hook.set_device_token(&[0xde, 0xad]), "dead");
    assert_eq!(client.push().device_token().as_deref(), Some("dead"));

    assert_eq!(hook.deliver(&event("user.arrived", 7)), PushKind::TypedEvent);
    client.delivery().flush().await;
    assert_eq!(seen.lock().expect("seen mutex poisoned").len(), 1);

    let err = client.push().deliver(&event("user.arrived", 8)).expect_err("manual is closed");
    assert!(matches!(err, SdkError::ModeConflict { .. }));
    assert!(matches!(client.push().register_automatic(), Err(SdkError::ModeConflict { .. })));
}

#[tokio::test]
async fn callbacks_wait_for_the_delivery_loop() {
    let (client, presenter, delivery_loop) = client_with_loop();
    let seen: Seen = Arc::default();
    client.push().on_event("user.arrived", recorder(&seen, "exact"));

    client.push().deliver(&event("user.arrived", 1)).expect("deliver");
    client.push().deliver(&error_payload()).expect("deliver");
    tokio::task::yield_now().await;
    assert!(seen.lock().expect("seen mutex poisoned").is_empty());
    assert_eq!(presenter.error_notices(), 0);

    tokio::spawn(delivery_loop.run());
    client.delivery().flush().await;
    assert_eq!(seen.lock().expect("seen mutex poisoned").len(), 1);
    assert_eq!(presenter.error_notices(), 1);
}

#[tokio::test]
async fn a_panicking_listener_does_not_stop_later_deliveries() {
    let (client, _presenter, delivery_loop) = client_with_loop();
    tokio::spawn(delivery_loop.run());
    client.push().on_event("user.crash", |_| panic!("host listener bug"));
    let seen: Seen = Arc::default();
    client.push().on_event("user.arrived", recorder(&seen, "exact"));

    client.push().deliver(&event("user.crash", 1)).expect("deliver");
    client.push().deliver(&event("user.arrived", 2)).expect("deliver");
    client.delivery().flush().await;

    assert!(!client.delivery().is_closed());
    assert_eq!(
        *seen.lock().expect("seen mutex poisoned"),
        vec!["exact:user.arrived".to_owned()]
    );
}
