// Tests for the payload catalog

use harrow_core::{Category, HarrowError, PayloadCatalog};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

// ============================================================================
// Category Tests
// ============================================================================

#[test]
fn test_category_parse_accepts_catalog_keys() {
    for category in Category::ALL {
        assert_eq!(category.as_str().parse::<Category>().unwrap(), category);
    }
    assert_eq!("SQL-Injection".parse::<Category>().unwrap(), Category::SqlInjection);
    assert_eq!(" xss ".parse::<Category>().unwrap(), Category::Xss);
}

#[test]
fn test_category_parse_rejects_unknown() {
    let err = "ldap_injection".parse::<Category>().unwrap_err();
    assert!(matches!(err, HarrowError::ConfigError(_)));
}

#[test]
fn test_category_serde_uses_snake_case() {
    let json = serde_json::to_string(&Category::CommandInjection).unwrap();
    assert_eq!(json, "\"command_injection\"");
}

// ============================================================================
// Catalog Loading Tests
// ============================================================================

#[test]
fn test_bundled_catalog_covers_every_category() {
    let catalog = PayloadCatalog::bundled().unwrap();
    for category in Category::ALL {
        assert!(
            !catalog.payloads(category).is_empty(),
            "no bundled payloads for {}",
            category
        );
    }
    assert_eq!(catalog.iter().count(), catalog.total());
}

#[test]
fn test_load_without_path_uses_bundled() {
    let loaded = PayloadCatalog::load(None).unwrap();
    assert_eq!(loaded.total(), PayloadCatalog::bundled().unwrap().total());
}

#[test]
fn test_load_from_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("payloads.json");
    fs::write(
        &path,
        r#"{"sql_injection": ["'", "\""], "xss": ["<b>"], "": []}"#,
    )
    .unwrap();

    let catalog = PayloadCatalog::load(Some(&path)).unwrap();
    assert_eq!(catalog.payloads(Category::SqlInjection), ["'", "\""]);
    assert_eq!(catalog.payloads(Category::Xss), ["<b>"]);
    assert!(catalog.payloads(Category::Ssti).is_empty());
}

#[test]
fn test_unknown_keys_are_skipped() {
    let catalog =
        PayloadCatalog::from_json(r#"{"xss": ["<i>"], "nosql_injection": ["{\"$ne\": 1}"]}"#)
            .unwrap();
    assert_eq!(catalog.categories(), vec![Category::Xss]);
}

#[test]
fn test_missing_file_is_config_error() {
    let err = PayloadCatalog::load(Some(Path::new("/nonexistent/harrow/payloads.json")))
        .unwrap_err();
    assert!(matches!(err, HarrowError::ConfigError(_)));
}

#[test]
fn test_malformed_json_is_config_error() {
    let err = PayloadCatalog::from_json("{\"xss\": [").unwrap_err();
    assert!(matches!(err, HarrowError::ConfigError(_)));

    let err = PayloadCatalog::from_json("{\"xss\": \"<b>\"}").unwrap_err();
    assert!(matches!(err, HarrowError::ConfigError(_)));
}

// ============================================================================
// Filtering Tests
// ============================================================================

#[test]
fn test_filter_keeps_selected_categories() {
    let catalog = PayloadCatalog::bundled()
        .unwrap()
        .filtered(&[Category::Xss, Category::Ssti])
        .unwrap();
    assert_eq!(catalog.categories(), vec![Category::Xss, Category::Ssti]);
}

#[test]
fn test_filter_to_nothing_is_config_error() {
    let catalog = PayloadCatalog::from_json(r#"{"xss": ["<b>"], "csrf": []}"#).unwrap();
    let err = catalog.clone().filtered(&[Category::Csrf]).unwrap_err();
    assert!(matches!(err, HarrowError::ConfigError(_)));

    let err = catalog.filtered(&[]).unwrap_err();
    assert!(matches!(err, HarrowError::ConfigError(_)));
}
