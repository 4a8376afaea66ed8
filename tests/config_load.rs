use pretty_assertions::assert_eq;
use serde_json::json;
use std::io::Write;
use ucituner::config::{Config, MatchRunnerConfig, Pairing, ParameterRange, RangeKind, DEFAULT_APPLY_FACTOR};
use ucituner::TunerError;

fn base_json() -> serde_json::Value {
    json!({
        "engine": { "command": "./goldfish", "fixed_parameters": { "Threads": 1, "SyzygyPath": "tb" } },
        "parameter_ranges": {
            "RazorMargin": "Integer(300, 40)",
            "Aspiration": { "kind": "Integer", "start": 25, "spread": 5 },
            "Contempt": { "kind": "Float", "start": 0.5, "std": 0.1 }
        },
        "log_csv_path": "tuner_log.csv",
        "book_path": "books/gm2001.bin",
        "syzygy_path": "tb",
        "concurrency": 4,
        "n_generations": 100
    })
}

#[test]
fn parses_compact_and_object_ranges_in_order() {
    let cfg: Config = serde_json::from_value(base_json()).unwrap();
    cfg.validate().unwrap();
    assert_eq!(cfg.parameter_ranges.names(), vec!["RazorMargin", "Aspiration", "Contempt"]);
    assert_eq!(cfg.parameter_ranges.get("RazorMargin"), Some(&ParameterRange::integer(300.0, 40.0)));
    assert_eq!(cfg.parameter_ranges.get("Contempt"), Some(&ParameterRange::new(RangeKind::Float, 0.5, 0.1)));
    assert_eq!(cfg.parameter_ranges.estimates(), vec![300.0, 25.0, 0.5]);
}

#[test]
fn defaults_match_reference_setup() {
    let cfg: Config = serde_json::from_value(base_json()).unwrap();
    assert_eq!(cfg.apply_factor, DEFAULT_APPLY_FACTOR);
    assert_eq!(cfg.match_runner, MatchRunnerConfig::default());
    assert_eq!(cfg.match_runner.command, "cutechess-cli");
    assert_eq!(cfg.match_runner.time_control, "1+0.1");
    assert_eq!(cfg.match_runner.pairing, Pairing::RoundRobin);
    assert_eq!(cfg.seed, None);
    assert!(cfg.opponents.is_empty());
}

#[test]
fn match_runner_fields_override_individually() {
    let mut v = base_json();
    v["match_runner"] = json!({ "pairing": "gauntlet", "games": 2, "resign": { "score": 900 } });
    let cfg: Config = serde_json::from_value(v).unwrap();
    assert_eq!(cfg.match_runner.pairing, Pairing::Gauntlet);
    assert_eq!(cfg.match_runner.games, 2);
    assert_eq!(cfg.match_runner.resign.score, 900);
    assert_eq!(cfg.match_runner.resign.move_count, 10);
    assert_eq!(cfg.match_runner.book_depth, 10);
}

#[test]
fn compact_range_rejects_garbage() {
    assert!("Integer 10 5".parse::<ParameterRange>().is_err());
    assert!("Boolean(1, 0)".parse::<ParameterRange>().is_err());
    assert!("Integer(ten, 5)".parse::<ParameterRange>().is_err());
    assert_eq!("Integer( 10 , 2.5 )".parse::<ParameterRange>().unwrap(), ParameterRange::integer(10.0, 2.5));
}

#[test]
fn negative_spread_is_a_config_error() {
    let mut v = base_json();
    v["parameter_ranges"]["RazorMargin"] = json!("Integer(300, -1)");
    let cfg: Config = serde_json::from_value(v).unwrap();
    match cfg.validate() {
        Err(TunerError::InvalidRange { name, .. }) => assert_eq!(name, "RazorMargin"),
        other => panic!("expected InvalidRange, got {:?}", other),
    }
}

#[test]
fn rejects_bad_scalars() {
    for (key, value) in [("concurrency", json!(0)), ("apply_factor", json!(1.5)), ("apply_factor", json!(-0.1))] {
        let mut v = base_json();
        v[key] = value;
        let cfg: Config = serde_json::from_value(v).unwrap();
        assert!(matches!(cfg.validate(), Err(TunerError::Config(_))), "{} should be rejected", key);
    }
}

#[test]
fn rejects_empty_ranges_and_duplicate_opponents() {
    let mut v = base_json();
    v["parameter_ranges"] = json!({});
    let cfg: Config = serde_json::from_value(v).unwrap();
    assert!(cfg.validate().is_err());

    let mut v = base_json();
    v["opponents"] = json!([
        { "name": "stockfish", "command": "stockfish" },
        { "name": "stockfish", "command": "stockfish-15" }
    ]);
    let cfg: Config = serde_json::from_value(v).unwrap();
    assert!(cfg.validate().is_err());
}

#[test]
fn tuned_option_cannot_also_be_fixed() {
    let mut v = base_json();
    v["engine"]["fixed_parameters"]["RazorMargin"] = json!(250);
    let cfg: Config = serde_json::from_value(v).unwrap();
    match cfg.validate() {
        Err(TunerError::Config(msg)) => assert!(msg.contains("RazorMargin"), "{}", msg),
        other => panic!("expected Config error, got {:?}", other),
    }
}

#[test]
fn duplicate_parameter_keys_fail_to_parse() {
    let text = r#"{
        "engine": {"command": "./goldfish"},
        "parameter_ranges": {"A": "Integer(1, 1)", "A": "Integer(2, 1)"},
        "log_csv_path": "log.csv", "concurrency": 1, "n_generations": 1
    }"#;
    let err = serde_json::from_str::<Config>(text).unwrap_err();
    assert!(err.to_string().contains("duplicate parameter 'A'"), "{}", err);
}

#[test]
fn load_reads_file_and_reports_parse_errors() {
    let mut good = tempfile::NamedTempFile::new().unwrap();
    write!(good, "{}", base_json()).unwrap();
    let cfg = Config::load(good.path()).unwrap();
    assert_eq!(cfg.n_generations, 100);

    let mut bad = tempfile::NamedTempFile::new().unwrap();
    write!(bad, "{{ \"engine\": ").unwrap();
    assert!(matches!(Config::load(bad.path()), Err(TunerError::ConfigParse { .. })));

    assert!(matches!(Config::load("/nonexistent/ucituner.json"), Err(TunerError::Io { .. })));
}

#[test]
fn shipped_example_config_is_valid() {
    let path = format!("{}/configs/goldfish.json", env!("CARGO_MANIFEST_DIR"));
    let cfg = Config::load(&path).unwrap();
    assert_eq!(cfg.parameter_ranges.names(), vec!["RazorMargin", "FutilityMargin", "AspirationWindow"]);
    assert_eq!(cfg.concurrency, 8);
}
