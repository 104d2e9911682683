use consult_relay::Config;
use std::io::Write;

#[test]
fn test_defaults_without_config_file() {
    let cfg = Config::load("/tmp/definitely-missing-consult-relay-config").unwrap();

    assert_eq!(cfg.service.name, "consult-relay");
    assert_eq!(cfg.service.http.bind, "0.0.0.0");
    assert_eq!(cfg.service.http.port, 8000);

    let options = cfg.stt_options();
    assert_eq!(options.model, "nova-2");
    assert_eq!(options.language, "en-US");
    assert_eq!(options.sample_rate, 16000);
    assert_eq!(options.channels, 1);
    assert_eq!(options.encoding, "linear16");
    assert!(options.diarize);
    assert!(options.smart_format);
    assert!(options.endpointing);

    let relay = cfg.relay_config();
    assert_eq!(relay.analysis_threshold, 300);
    assert_eq!(relay.drain_timeout.as_secs(), 5);
    assert_eq!(relay.max_provider_errors, 3);
}

#[test]
fn test_load_from_toml_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("consult-relay.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    write!(
        file,
        r#"
[service]
name = "relay-under-test"

[service.http]
bind = "127.0.0.1"
port = 9100

[stt]
model = "nova-3"
language = "en-GB"

[analysis]
model = "test-analysis-model"
base_url = "http://localhost:9200"

[relay]
analysis_threshold = 120
drain_timeout_secs = 2
max_provider_errors = 5
"#
    )
    .unwrap();

    let name = path.with_extension("");
    let cfg = Config::load(name.to_str().unwrap()).unwrap();

    assert_eq!(cfg.service.name, "relay-under-test");
    assert_eq!(cfg.service.http.bind, "127.0.0.1");
    assert_eq!(cfg.service.http.port, 9100);
    assert_eq!(cfg.stt.model, "nova-3");
    assert_eq!(cfg.stt.language, "en-GB");
    // Unset fields keep their defaults
    assert_eq!(cfg.stt.sample_rate, 16000);
    assert_eq!(cfg.analysis.model, "test-analysis-model");
    assert_eq!(cfg.analysis.base_url, "http://localhost:9200");

    let relay = cfg.relay_config();
    assert_eq!(relay.analysis_threshold, 120);
    assert_eq!(relay.drain_timeout.as_secs(), 2);
    assert_eq!(relay.max_provider_errors, 5);
}

#[test]
fn test_stt_options_reflect_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("consult-relay.toml");
    std::fs::write(
        &path,
        r#"
[stt]
sample_rate = 8000
channels = 2
diarize = false
"#,
    )
    .unwrap();

    let name = path.with_extension("");
    let cfg = Config::load(name.to_str().unwrap()).unwrap();
    let options = cfg.stt_options();

    assert_eq!(options.sample_rate, 8000);
    assert_eq!(options.channels, 2);
    assert!(!options.diarize);
    // Untouched fields keep their defaults
    assert_eq!(options.model, "nova-2");
}
