use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

const EN_US: &str = include_str!("../i18n/en-US/proctorlock-ui.ftl");

/// Every shipped locale, fallback excluded. Register new bundles here.
const LOCALES: &[(&str, &str)] = &[("es-ES", include_str!("../i18n/es-ES/proctorlock-ui.ftl"))];

/// Message ids of a Fluent file: any `id = ...` line, comments and terms skipped.
fn message_keys(src: &str, locale: &str) -> BTreeSet<String> {
    let mut keys = BTreeSet::new();
    for line in src.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') || line.starts_with('-') || line.starts_with('.') {
            continue;
        }
        let Some((id, _)) = line.split_once('=') else {
            continue;
        };
        let id = id.trim();
        if id.is_empty() || !id.chars().all(|c| matches!(c, 'a'..='z' | '0'..='9' | '-')) {
            continue;
        }
        assert!(keys.insert(id.to_string()), "{locale}: duplicate message id `{id}`");
    }
    keys
}

/// Literal ids passed to `t!` anywhere under `src/`.
fn referenced_keys(dir: &Path, found: &mut BTreeSet<String>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for path in entries.flatten().map(|entry| entry.path()) {
        if path.is_dir() {
            referenced_keys(&path, found);
            continue;
        }
        if path.extension().and_then(|ext| ext.to_str()) != Some("rs") {
            continue;
        }
        let Ok(source) = fs::read_to_string(&path) else {
            continue;
        };
        for chunk in source.split("t!(\"").skip(1) {
            if let Some((key, _)) = chunk.split_once('"') {
                found.insert(key.to_string());
            }
        }
    }
}

#[test]
fn all_locales_have_all_fallback_keys() {
    let fallback = message_keys(EN_US, "en-US");
    assert!(!fallback.is_empty(), "fallback (en-US) contains no keys");

    let mut failures = Vec::new();
    for (locale, src) in LOCALES {
        let keys = message_keys(src, locale);
        let missing: Vec<_> = fallback.difference(&keys).cloned().collect();
        if !missing.is_empty() {
            failures.push(format!("{locale} is missing:\n  {}", missing.join("\n  ")));
        }
    }

    assert!(
        failures.is_empty(),
        "translation completeness check failed:\n\n{}",
        failures.join("\n\n")
    );
}

#[test]
fn every_referenced_key_exists_in_fallback() {
    let fallback = message_keys(EN_US, "en-US");
    let mut referenced = BTreeSet::new();
    referenced_keys(
        &PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("src"),
        &mut referenced,
    );
    assert!(referenced.contains("exam-start"));

    let missing: Vec<_> = referenced.difference(&fallback).cloned().collect();
    assert!(
        missing.is_empty(),
        "keys used in source but missing from en-US:\n  {}",
        missing.join("\n  ")
    );
}
