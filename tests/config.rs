use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use kagfetch::config::{Config, ConfigLoader, DatasetEntry};
use kagfetch::error::FetchError;

#[test]
fn resolve_reads_json_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kagfetch.json");
    std::fs::write(
        &path,
        r#"{
            "destination": "downloads",
            "keep_archive": true,
            "datasets": [
                "competition:playground-series-s5e8",
                {"spec": "dataset:zynicide/wine-reviews", "destination": "downloads/wine"}
            ]
        }"#,
    )
    .unwrap();

    let resolved = ConfigLoader::resolve(Some(path.to_str().unwrap())).unwrap();
    assert_eq!(resolved.schema_version, 1);
    assert_eq!(resolved.destination, Utf8PathBuf::from("downloads"));
    assert!(resolved.keep_archive);
    assert_eq!(resolved.datasets.len(), 2);
    assert!(resolved.datasets[0].destination.is_none());
    assert_eq!(
        resolved.datasets[1].destination,
        Some(Utf8PathBuf::from("downloads/wine"))
    );
}

#[test]
fn resolve_missing_explicit_path_is_read_error() {
    let err = ConfigLoader::resolve(Some("/nonexistent/kagfetch.json")).unwrap_err();
    assert_matches!(err, FetchError::ConfigRead(_));
}

#[test]
fn resolve_rejects_malformed_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kagfetch.json");
    std::fs::write(&path, "datasets: nope").unwrap();

    let err = ConfigLoader::resolve(Some(path.to_str().unwrap())).unwrap_err();
    assert_matches!(err, FetchError::ConfigParse(_));
}

#[test]
fn defaults_apply_when_fields_absent() {
    let config = Config {
        schema_version: None,
        destination: None,
        keep_archive: None,
        datasets: vec![DatasetEntry::Shorthand(
            "competition:playground-series-s5e8".to_string(),
        )],
    };

    let resolved = ConfigLoader::resolve_config(config).unwrap();
    assert_eq!(resolved.destination, Utf8PathBuf::from("data"));
    assert!(!resolved.keep_archive);
}
