//! Tests for downstream reply classification.

use super::*;

#[test]
fn test_truthy_success_values() {
    for body in [
        r#"{"success":true}"#,
        r#"{"success":1}"#,
        r#"{"success":"yes"}"#,
        r#"{"success":{"id":3}}"#,
    ] {
        assert_eq!(classify_response(body), AttemptOutcome::Success, "{body}");
    }
}

#[test]
fn test_falsy_success_is_failure_with_reason() {
    assert_eq!(
        classify_response(r#"{"success":false,"error":"sheet locked"}"#),
        AttemptOutcome::RecoverableFailure("sheet locked".to_string())
    );
}

#[test]
fn test_missing_success_field_is_failure() {
    let outcome = classify_response(r#"{"status":"ok"}"#);

    assert_eq!(
        outcome,
        AttemptOutcome::RecoverableFailure("downstream reported failure".to_string())
    );
    assert_eq!(outcome.label(), "failure");
}

#[test]
fn test_structured_error_is_stringified() {
    assert_eq!(
        classify_response(r#"{"success":0,"error":{"code":42}}"#),
        AttemptOutcome::RecoverableFailure(r#"{"code":42}"#.to_string())
    );
}

#[test]
fn test_non_json_reply_counts_as_success() {
    for body in ["OK", "", "<html>Service error</html>", "{not json"] {
        let outcome = classify_response(body);

        assert!(outcome.is_success(), "{body:?} should be success");
        assert_eq!(outcome.label(), "success");
    }
}

#[test]
fn test_json_scalar_without_success_field_is_failure() {
    assert!(!classify_response("42").is_success());
    assert!(!classify_response("null").is_success());
}
