use std::fs;

use groundcheck_core::types::Locale;
use groundcheck_validate::{RuleBook, RuleBookHandle};
use tempfile::TempDir;

const RULES_V1: &str = r#"
version = 1

[[identity]]
id = "claims-human"
pattern = "\\bI am (a )?human\\b"

[[anthropomorphic]]
id = "feelings-es"
pattern = "\\bsiento\\b"
replacement = "parece"
locale = "es"
"#;

#[test]
fn parses_rules_case_insensitively() {
    let book = RuleBook::from_toml_str(RULES_V1).unwrap();
    assert_eq!(book.version, 1);
    assert_eq!(book.len(), 2);
    assert!(book.identity[0].pattern.is_match("Honestly, i AM HUMAN."));
    let rule = &book.anthropomorphic[0];
    assert!(rule.applies_to(Locale::Es));
    assert!(!rule.applies_to(Locale::En));
}

#[test]
fn invalid_pattern_names_the_rule() {
    let err = RuleBook::from_toml_str("[[identity]]\nid = \"broken\"\npattern = \"(unclosed\"\n").unwrap_err();
    assert!(err.to_string().contains("broken"));
}

#[test]
fn missing_file_is_an_empty_rulebook() {
    let tmp = TempDir::new().unwrap();
    let handle = RuleBookHandle::open(Some(&tmp.path().join("absent.toml"))).unwrap();
    assert!(handle.current().is_empty());
    assert!(RuleBookHandle::open(None).unwrap().current().is_empty());
}

#[test]
fn reload_swaps_rules_and_keeps_old_on_error() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("rules.toml");
    fs::write(&path, RULES_V1).unwrap();
    let handle = RuleBookHandle::open(Some(&path)).unwrap();
    let before = handle.current();
    assert_eq!(before.identity.len(), 1);

    fs::write(
        &path,
        "version = 2\n[[identity]]\nid = \"a\"\npattern = \"x\"\n[[identity]]\nid = \"b\"\npattern = \"y\"\n",
    )
    .unwrap();
    let after = handle.reload().unwrap();
    assert_eq!(after.version, 2);
    assert_eq!(handle.current().identity.len(), 2);
    // readers holding the old book are unaffected
    assert_eq!(before.identity.len(), 1);

    fs::write(&path, "[[identity]]\nid = \"bad\"\npattern = \"[\"\n").unwrap();
    assert!(handle.reload().is_err());
    assert_eq!(handle.current().version, 2);
}
