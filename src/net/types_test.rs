use super::*;

#[test]
fn execution_result_reads_server_reply() {
    let result: ExecutionResult =
        serde_json::from_str(r#"{"success":true,"output":"1\n","executionTime":12}"#).unwrap();
    assert_eq!(
        result,
        ExecutionResult { success: true, output: "1\n".into(), error: None, execution_time_ms: 12 }
    );
}

#[test]
fn execution_result_rounds_fractional_millis() {
    let result: ExecutionResult =
        serde_json::from_str(r#"{"success":false,"output":"","error":"boom","executionTime":3.6}"#).unwrap();
    assert_eq!(result.execution_time_ms, 4);
    assert_eq!(result.error.as_deref(), Some("boom"));
}

#[test]
fn execution_result_tolerates_missing_or_null_time() {
    let result: ExecutionResult = serde_json::from_str(r#"{"success":true,"output":"ok"}"#).unwrap();
    assert_eq!(result.execution_time_ms, 0);
    let result: ExecutionResult =
        serde_json::from_str(r#"{"success":true,"output":"ok","executionTime":null}"#).unwrap();
    assert_eq!(result.execution_time_ms, 0);
}

#[test]
fn execution_result_rejects_negative_or_text_time() {
    assert!(serde_json::from_str::<ExecutionResult>(r#"{"success":true,"executionTime":-1}"#).is_err());
    assert!(serde_json::from_str::<ExecutionResult>(r#"{"success":true,"executionTime":"12"}"#).is_err());
}

#[test]
fn execution_result_omits_absent_error() {
    let value = serde_json::to_value(ExecutionResult {
        success: true,
        output: "1\n".into(),
        error: None,
        execution_time_ms: 12,
    })
    .unwrap();
    assert_eq!(value, serde_json::json!({"success": true, "output": "1\n", "executionTime": 12}));
}

#[test]
fn fault_result_has_zero_time_and_empty_output() {
    let result = ExecutionResult::fault("connection refused");
    assert!(!result.success);
    assert_eq!(result.output, "");
    assert_eq!(result.error.as_deref(), Some("connection refused"));
    assert_eq!(result.execution_time_ms, 0);
}

#[test]
fn execute_request_serializes_language_lowercase() {
    let value = serde_json::to_value(ExecuteRequest { code: "print(1)".into(), language: Language::Python }).unwrap();
    assert_eq!(value, serde_json::json!({"code": "print(1)", "language": "python"}));
}

#[test]
fn session_and_auth_replies_use_camel_case_ids() {
    let created: CreateSessionResponse = serde_json::from_str(r#"{"sessionId":"abc123"}"#).unwrap();
    assert_eq!(created.session_id, "abc123");

    let auth: AuthResponse = serde_json::from_str(r#"{"token":"t","userId":"u1","username":"ada"}"#).unwrap();
    assert_eq!(auth.user_id, "u1");
    assert_eq!(auth.username, "ada");
}
