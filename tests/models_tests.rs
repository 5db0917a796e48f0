// Model JSON shapes served to the dashboard

use homehub::models::*;
use serde_json::json;

#[test]
fn device_outcome_flattens_status() {
    let ok = DeviceOutcome::new(
        0,
        "kitchen",
        Outcome::Success {
            payload: Payload::Json(json!({"state": "on"})),
        },
    );
    assert_eq!(
        serde_json::to_value(&ok).unwrap(),
        json!({"index": 0, "deviceId": "kitchen", "online": true, "status": "success", "payload": {"state": "on"}})
    );

    let failed = DeviceOutcome::new(
        1,
        "garage",
        Outcome::Failure {
            cause: "unreachable: 10.0.0.52: timeout".into(),
        },
    );
    let v = serde_json::to_value(&failed).unwrap();
    assert_eq!(v["online"], false);
    assert_eq!(v["status"], "failure");
    assert_eq!(v["cause"], "unreachable: 10.0.0.52: timeout");
}

#[test]
fn aggregate_result_is_a_plain_array() {
    let devices = vec![
        DeviceQuery::new("a", "10.0.0.1", "/"),
        DeviceQuery::new("b", "10.0.0.2", "/"),
    ];
    let pending = AggregateResult::pending(&devices);
    assert_eq!(pending.failures(), 2);
    let v = serde_json::to_value(&pending).unwrap();
    assert_eq!(v.as_array().unwrap().len(), 2);
    assert_eq!(v[1]["deviceId"], "b");
}

#[test]
fn stream_events_are_tagged() {
    let done = serde_json::to_value(StreamEvent::Done { total: 3 }).unwrap();
    assert_eq!(done, json!({"event": "done", "total": 3}));

    let outcome = StreamEvent::Outcome(DeviceOutcome::new(
        2,
        "c",
        Outcome::Success {
            payload: Payload::Text("on".into()),
        },
    ));
    let v = serde_json::to_value(outcome).unwrap();
    assert_eq!(v["event"], "outcome");
    assert_eq!(v["index"], 2);
    assert_eq!(v["payload"], "on");
}

#[test]
fn inverter_params_use_camel_case() {
    let v = serde_json::to_value(InverterParams::default()).unwrap();
    for key in ["pv", "battery", "load", "acIn", "acOut", "power", "temperature", "busVoltage"] {
        assert!(v.get(key).is_some(), "missing {}", key);
    }
}

#[test]
fn reading_wraps_value_with_status() {
    let r = Reading::from_result(Ok(WorkType::from(WorkMode::Sub)));
    assert_eq!(
        serde_json::to_value(r).unwrap(),
        json!({"online": true, "error": null, "value": {"mode": "sub", "label": "SUB (PV AC ACU)"}})
    );
}

#[test]
fn stats_report_carries_display_strings() {
    let report = StatsReport::from(EnergyStats {
        year: 2_500_000.0,
        month: 45_000.0,
        day: 800.0,
        total: 0.0,
    });
    assert_eq!(report.display.year, "2500 kW");
    assert_eq!(report.display.month, "45 kW");
    assert_eq!(report.display.day, "800 W");
    assert_eq!(report.display.total, "0 W");
}

#[test]
fn history_bucket_view_labels() {
    let day = HistoryBucket {
        slot: 7,
        value: Some(1200.0),
        loading: false,
    };
    let view = day.view(HistoryPeriod::Day);
    assert_eq!(view.label, "7");
    assert_eq!(view.display, "1.2 kW");

    let month = HistoryBucket::unset(11).view(HistoryPeriod::Month);
    assert_eq!(month.label, "December");
    assert_eq!(month.display, "unknown");
    assert!(month.loading);
}

#[test]
fn history_period_capacity() {
    assert_eq!(HistoryPeriod::Day.capacity(), 31);
    assert_eq!(HistoryPeriod::Month.capacity(), 12);
}
