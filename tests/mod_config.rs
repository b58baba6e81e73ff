use std::io::Write;

use estatequery::config::{ConfigOverrides, QueryConfig};
use estatequery::errors::DbError;
use estatequery::query::TextField;

#[test]
fn defaults_match_documented_values() {
    let c = QueryConfig::default();
    assert_eq!((c.default_page, c.default_limit, c.max_limit), (1, 10, 100));
    assert!(!c.text_search);
    assert_eq!(c.geo_field, None);
    assert_eq!(c.slow_query_ms, 500);
    assert_eq!(c.text_weights[0], TextField { path: "title".into(), weight: 10 });
}

#[test]
fn partial_file_keeps_other_defaults() {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    writeln!(f, "max_limit = 40\ngeo_field = \"location.coordinates\"").unwrap();
    let c = QueryConfig::from_file(f.path()).unwrap();
    assert_eq!(c.max_limit, 40);
    assert_eq!(c.geo_field.as_deref(), Some("location.coordinates"));
    assert_eq!(c.default_limit, 10);
}

#[test]
fn text_weights_from_file() {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    writeln!(f, "text_search = true\n\n[[text_weights]]\npath = \"title\"\nweight = 2").unwrap();
    let c = QueryConfig::from_file(f.path()).unwrap();
    assert_eq!(c.text_fields(), Some(vec![TextField { path: "title".into(), weight: 2 }]));
}

#[test]
fn cli_overrides_file() {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    writeln!(f, "default_limit = 20\nmax_limit = 50").unwrap();
    let o = ConfigOverrides { max_limit: Some(5), text_search: Some(true), ..ConfigOverrides::default() };
    let c = QueryConfig::load(Some(f.path()), &o).unwrap();
    assert_eq!(c.max_limit, 5);
    assert!(c.text_search);
    assert_eq!(c.pagination_defaults().limit, 20);
}

#[test]
fn invalid_toml_and_missing_file_are_errors() {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    writeln!(f, "max_limit = \"lots\"").unwrap();
    assert!(matches!(QueryConfig::from_file(f.path()), Err(DbError::Toml(_))));

    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.toml");
    assert!(matches!(QueryConfig::load(Some(missing.as_path()), &ConfigOverrides::default()), Err(DbError::Config(_))));
}
