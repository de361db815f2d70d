// Behavioural laws of the dictionary overlay and the progressive converter
// WHY: these hold for any base converter, so they are checked with several

use std::sync::Arc;
use txtconv::dictionary::{apply, parse, validate, ValidationErrorKind};
use txtconv::table::{identity, BaseConvert};
use txtconv::{DictPair, LineProgress, ProgressiveConverter};

#[path = "integration/fixtures/mod.rs"]
mod fixtures;
use fixtures::*;

#[path = "integration/mod.rs"]
mod test_utils;
use test_utils::fixture_converter;

fn base_converters() -> Vec<Arc<BaseConvert>> {
    vec![
        identity(),
        Arc::new(|t: &str| t.to_uppercase()),
        Arc::new(|t: &str| t.chars().rev().collect()),
        fixture_converter().into_base_convert(),
    ]
}

/// Scenario: longest key wins over its prefixes
#[test]
fn test_longest_match_scenario() {
    let pairs = vec![
        DictPair::new("简", "X"),
        DictPair::new("简体", "Y"),
        DictPair::new("简体中文", "Z"),
    ];
    for base in base_converters() {
        assert_eq!(apply("简体中文", &pairs, base.as_ref()), "Z");
    }
}

/// Pair order does not matter for keys of different lengths
#[test]
fn test_longest_match_independent_of_pair_order() {
    let mut pairs = vec![
        DictPair::new("简体中文", "Z"),
        DictPair::new("简", "X"),
        DictPair::new("简体", "Y"),
    ];
    let text = "简体中文和简体和简";
    let expected = "Z和Y和X";
    let base = identity();
    for _ in 0..3 {
        assert_eq!(apply(text, &pairs, base.as_ref()), expected);
        pairs.rotate_left(1);
    }
}

/// Scenario: custom override wins on its span, base converts the rest
#[test]
fn test_override_with_base_mapping_scenario() {
    let base = |t: &str| t.replace("测试", "測試").replace("内容", "內容");
    let pairs = vec![DictPair::new("测试", "测驗")];
    assert_eq!(apply("测试内容", &pairs, &base), "测驗內容");
}

/// Without pairs the overlay is exactly the base converter
#[test]
fn test_empty_pairs_is_base() {
    let text = "简体测试\n头发 内存 ABC";
    for base in base_converters() {
        assert_eq!(apply(text, &[], base.as_ref()), base(text));
    }
}

/// Scenario: duplicate reported on line 3 referencing line 1
#[test]
fn test_duplicate_scenario() {
    let errors = validate("代码,程式碼\n内存,記憶體\n代码,原始碼");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].line, 3);
    assert_eq!(errors[0].kind, ValidationErrorKind::Duplicate { first_line: 1 });
    assert!(errors[0].message.contains('1'));
}

/// Validation is idempotent and parse is consistent with it
#[test]
fn test_validate_idempotent_and_parse_lenient() {
    assert_eq!(validate(USER_DICTIONARY), validate(USER_DICTIONARY));
    let errors = validate(USER_DICTIONARY);
    let lines: Vec<usize> = errors.iter().map(|e| e.line).collect();
    assert_eq!(lines, vec![5, 6]);
    assert_eq!(errors[0].kind, ValidationErrorKind::MissingComma);
    assert_eq!(errors[1].kind, ValidationErrorKind::Duplicate { first_line: 1 });

    let pairs = parse(USER_DICTIONARY);
    assert_eq!(pairs.len(), 4);
    assert_eq!(pairs[0], DictPair::new("代码", "程式碼"));
    assert_eq!(pairs[3], DictPair::new("代码", "原始碼"));

    assert!(validate("\n\n   \n").is_empty());
    assert!(parse("\n\n").is_empty());
}

/// Scenario: empty input reports (1, 0, 0) exactly once
#[tokio::test]
async fn test_empty_conversion_scenario() {
    let converter = ProgressiveConverter::new(identity());
    let mut calls: Vec<LineProgress> = Vec::new();
    let output = converter.convert("", &[], |p| calls.push(p)).await;
    assert_eq!(output, "");
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].percent, 1.0);
    assert_eq!(calls[0].current_line, 0);
    assert_eq!(calls[0].total_lines, 0);
}

/// Line count is preserved and the last notification is 100%
#[tokio::test]
async fn test_progressive_line_count_and_completion() {
    let documents = [
        "single line".to_string(),
        "\n".to_string(),
        "trailing newline\n".to_string(),
        SIMPLIFIED_DOC.to_string(),
        vec!["简体"; 5_000].join("\n"),
    ];
    let pairs = vec![DictPair::new("简体", "简体字")];
    for base in base_converters() {
        let converter = ProgressiveConverter::new(base);
        for doc in &documents {
            let mut last = None;
            let mut count = 0;
            let output = converter
                .convert(doc, &pairs, |p| {
                    count += 1;
                    last = Some(p);
                })
                .await;
            assert_eq!(output.split('\n').count(), doc.split('\n').count());
            assert_eq!(last.map(|p| p.percent), Some(1.0));
            assert!(count <= 101);
        }
    }
}

/// Progressive conversion equals applying the overlay line by line
#[tokio::test]
async fn test_progressive_matches_overlay_per_line() {
    let converter = ProgressiveConverter::new(fixture_converter().into_base_convert());
    let pairs = vec![DictPair::new("内存", "主記憶體")];
    let output = converter.convert(SIMPLIFIED_DOC, &pairs, |_| {}).await;
    assert_eq!(output, TRADITIONAL_DOC.replace("記憶體", "主記憶體"));
}
