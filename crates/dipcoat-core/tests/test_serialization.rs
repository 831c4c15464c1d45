use chrono::{TimeZone, Utc};
use dipcoat_core::{
    Axis, ControllerEvent, DeviceMode, DeviceState, DeviceStateSnapshot, EventDispatcher,
    EventKind, ParsedEvent, RecipeParameters, StatusSnapshot,
};
use serde_json::{json, Value};

#[test]
fn test_parsed_event_is_tagged() {
    let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    let event = ParsedEvent::at(
        EventKind::Position {
            axis: Axis::Z,
            position: -250,
        },
        "Z: -250",
        at,
    );

    let value = serde_json::to_value(&event).unwrap();
    assert_eq!(value["type"], "position");
    assert_eq!(value["position"], -250);
    assert_eq!(value["raw"], "Z: -250");

    let back: ParsedEvent = serde_json::from_value(value).unwrap();
    assert_eq!(back, event);
}

#[test]
fn test_status_snapshot_skips_absent_fields() {
    let snapshot = StatusSnapshot {
        mode: Some(DeviceMode::Manual),
        position_y: Some(12),
        ..StatusSnapshot::default()
    };

    let value = serde_json::to_value(&snapshot).unwrap();
    assert_eq!(value, json!({ "mode": "MANUAL", "positionY": 12 }));
    assert!(!snapshot.is_empty());
    assert!(StatusSnapshot::default().is_empty());
}

#[test]
fn test_state_snapshot_flattens_device() {
    let mut device = DeviceState::new();
    device.mode = DeviceMode::Automatic;
    device.axis_z.position = 400;
    device.emergency_stop = true;

    let snapshot = DeviceStateSnapshot {
        device,
        connected: true,
        port: Some("/dev/ttyACM0".to_string()),
    };

    let value = serde_json::to_value(&snapshot).unwrap();
    assert_eq!(value["mode"], "AUTOMATIC");
    assert_eq!(value["axisZ"]["position"], 400);
    assert_eq!(value["emergencyStop"], true);
    assert_eq!(value["connected"], true);
    assert_eq!(value["port"], "/dev/ttyACM0");
    assert_eq!(value["lastUpdate"], Value::Null);
}

#[test]
fn test_recipe_wire_key_order() {
    let json = RecipeParameters::default().to_wire_json().unwrap();
    let keys: Vec<usize> = ["\"cycles\"", "\"dippingWait0\"", "\"dipSpeed\"", "\"fan\""]
        .iter()
        .map(|key| json.find(key).unwrap())
        .collect();
    assert!(keys.windows(2).all(|pair| pair[0] < pair[1]));
}

#[tokio::test]
async fn test_dropped_receiver_unsubscribes() {
    let dispatcher = EventDispatcher::new(4);
    let rx = dispatcher.subscribe();
    let mut kept = dispatcher.subscribe();
    assert_eq!(dispatcher.subscriber_count(), 2);

    drop(rx);
    assert_eq!(dispatcher.subscriber_count(), 1);
    assert_eq!(
        dispatcher.publish(ControllerEvent::Disconnected { unexpected: false }),
        1
    );
    assert!(matches!(
        kept.recv().await.unwrap(),
        ControllerEvent::Disconnected { unexpected: false }
    ));
}
