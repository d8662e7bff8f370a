use super::*;

fn pending(seq: u64) -> PendingExecution {
    PendingExecution { seq, code: "print(1)".into(), language: Language::Python }
}

#[test]
fn request_carries_code_snapshot() {
    assert_eq!(pending(1).request(), ExecuteRequest { code: "print(1)".into(), language: Language::Python });
}

#[test]
fn success_keeps_server_result() {
    let result = ExecutionResult { success: true, output: "1\n".into(), error: None, execution_time_ms: 12 };
    let output = ExecutionOutput::complete(pending(3), Ok(result.clone()));
    assert_eq!(output.seq, 3);
    assert_eq!(output.status(), RunStatus::Succeeded);
    assert_eq!(output.result, result);
    assert_eq!(output.lines(), vec![OutputLine { kind: LineKind::Log, text: "1" }]);
}

#[test]
fn call_failure_becomes_failed_result() {
    let output = ExecutionOutput::complete(pending(1), Err("connection refused".into()));
    assert_eq!(output.status(), RunStatus::Failed);
    assert_eq!(output.result.output, "");
    assert_eq!(output.result.error.as_deref(), Some("connection refused"));
    assert_eq!(output.result.execution_time_ms, 0);
}

#[test]
fn lines_put_errors_after_output() {
    let result = ExecutionResult {
        success: false,
        output: "a\nb\n".into(),
        error: Some("Traceback\nValueError".into()),
        execution_time_ms: 5,
    };
    let output = ExecutionOutput::complete(pending(2), Ok(result));
    let kinds: Vec<(LineKind, &str)> = output.lines().iter().map(|l| (l.kind, l.text)).collect();
    assert_eq!(
        kinds,
        vec![
            (LineKind::Log, "a"),
            (LineKind::Log, "b"),
            (LineKind::Error, "Traceback"),
            (LineKind::Error, "ValueError"),
        ]
    );
}
