// Config loading and validation tests

mod common;

use homehub::config::AppConfig;

fn valid() -> String {
    common::test_config("data/guide.xml")
}

#[test]
fn test_config_loads_from_str() {
    let config = AppConfig::load_from_str(&valid()).expect("load_from_str");
    assert_eq!(config.server.port, 8081);
    assert_eq!(config.client.request_timeout_ms, 500);
    assert_eq!(config.polling.interval_secs, 1);
    assert_eq!(config.polling.history_every_ticks, 5);
    assert_eq!(config.inverter.address, common::INVERTER);
    assert_eq!(config.sockets.len(), 2);
    assert_eq!(config.lights.len(), 1);
    assert_eq!(config.guide.channels.len(), 2);
    assert_eq!(config.guide.channels[1].number, 3);
}

#[test]
fn test_config_defaults() {
    let config = AppConfig::load_from_str(&valid()).unwrap();
    assert_eq!(config.sockets[0].status_path, "/");
    assert_eq!(config.guide.prewarm_schedule, "0 1 * * * *");
    assert_eq!(config.guide.excluded_categories, vec!["Kodi W Pigulce"]);

    let minimal = valid().replace("[client]\nrequest_timeout_ms = 500\n", "");
    let config = AppConfig::load_from_str(&minimal).unwrap();
    assert_eq!(config.client.request_timeout_ms, 3000);
}

#[test]
fn test_device_queries_keep_config_order() {
    let config = AppConfig::load_from_str(&valid()).unwrap();
    let sockets = config.socket_queries();
    assert_eq!(sockets[0].device_id, "kitchen");
    assert_eq!(sockets[1].device_id, "garage");
    assert_eq!(sockets[1].path, "/status");
    assert_eq!(config.light_queries()[0].address, common::LIGHT);
}

#[test]
fn test_config_validation_rejects_invalid_port() {
    let bad = valid().replace("port = 8081", "port = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("server.port"));
}

#[test]
fn test_config_validation_rejects_zero_timeout() {
    let bad = valid().replace("request_timeout_ms = 500", "request_timeout_ms = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("client.request_timeout_ms"));
}

#[test]
fn test_config_validation_rejects_zero_interval() {
    let bad = valid().replace("interval_secs = 1", "interval_secs = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("polling.interval_secs"));
}

#[test]
fn test_config_validation_rejects_zero_history_ticks() {
    let bad = valid().replace("history_every_ticks = 5", "history_every_ticks = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("polling.history_every_ticks"));
}

#[test]
fn test_config_validation_rejects_empty_inverter_address() {
    let bad = valid().replace(
        &format!("address = \"{}\"", common::INVERTER),
        "address = \"\"",
    );
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("inverter.address"));
}

#[test]
fn test_config_validation_rejects_zero_telemetry_window() {
    let bad = valid().replace("telemetry_window_secs = 10", "telemetry_window_secs = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("inverter.telemetry_window_secs"));
}

#[test]
fn test_config_validation_rejects_empty_device_address() {
    let bad = valid().replace(
        &format!("address = \"{}\"", common::SOCKET_B),
        "address = \"\"",
    );
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("sockets[1].address"));
}

#[test]
fn test_config_validation_rejects_empty_guide_source() {
    let bad = common::test_config("");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("guide.source"));
}

#[test]
fn test_config_validation_rejects_bad_prewarm_schedule() {
    let bad = valid().replace(
        "[guide]\n",
        "[guide]\nprewarm_schedule = \"every hour\"\n",
    );
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("guide.prewarm_schedule"));
}

#[test]
fn test_config_validation_rejects_duplicate_channel() {
    let bad = valid().replace("name = \"TVN\"", "name = \"TVP1\"");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("duplicate channel"));
}

#[test]
fn test_config_rejects_missing_section() {
    let bad = valid().replace("[inverter]", "[inverter_disabled]");
    assert!(AppConfig::load_from_str(&bad).is_err());
}
