//! End-to-end sandbox tests.
//!
//! Every test here runs a real container, so they all carry `#[ignore]`
//! and need a reachable Docker daemon. The first run also pulls the
//! sandbox images, which takes a while.

use crate::engine::Executors;
use pairpad_common::types::{ExecutionStatus, Language, SourceCode};

fn submission(language: Language, content: &str, input: &str) -> SourceCode {
    SourceCode {
        name: "test".to_string(),
        language,
        content: content.to_string(),
        input: input.to_string(),
    }
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_python_snippet_sees_staged_variables() {
    let executors = Executors::connect().expect("docker daemon reachable");
    let source = submission(Language::Python3, "print(sum(nums)+k)", "nums=[1,2,3], k=4");

    let verdict = executors.python3.execute(&source).await;

    assert_eq!(verdict.status, ExecutionStatus::Successful);
    assert_eq!(verdict.exit_code, 0);
    assert_eq!(verdict.output, "10\n");
    assert!(verdict.run_time > 0);
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_python_runs_every_test_case_in_order() {
    let executors = Executors::connect().expect("docker daemon reachable");
    let source = submission(
        Language::Python3,
        "print(sum(nums)+k)",
        "nums=[1,2], k=0\nnums=[5,5], k=1",
    );

    let verdict = executors.python3.execute(&source).await;

    assert_eq!(verdict.status, ExecutionStatus::Successful);
    assert_eq!(verdict.output, "3\n11\n");
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_python_without_input_runs_snippet_once() {
    let executors = Executors::connect().expect("docker daemon reachable");
    let source = submission(Language::Python3, "print('hi')", "");

    let verdict = executors.python3.execute(&source).await;

    assert_eq!(verdict.status, ExecutionStatus::Successful);
    assert_eq!(verdict.output, "hi\n");
}

#[tokio::test]
#[ignore] // Requires Docker, and runs until the 30s wall clock fires
async fn test_python_infinite_loop_times_out() {
    let executors = Executors::connect().expect("docker daemon reachable");
    let source = submission(Language::Python3, "while True: pass", "");

    let verdict = executors.python3.execute(&source).await;

    assert_eq!(verdict.status, ExecutionStatus::RuntimeTimeout);
    assert_eq!(verdict.exit_code, 124);
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_python_crash_is_a_runtime_error() {
    let executors = Executors::connect().expect("docker daemon reachable");
    let source = submission(Language::Python3, "1/0", "");

    let verdict = executors.python3.execute(&source).await;

    assert_eq!(verdict.status, ExecutionStatus::RuntimeError);
    assert_ne!(verdict.exit_code, 0);
    assert_ne!(verdict.exit_code, 124);
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_java_compile_error_gets_the_reserved_exit_code() {
    let executors = Executors::connect().expect("docker daemon reachable");
    let source = submission(Language::Java, "public class Main { oops }", "");

    let verdict = executors.java.execute(&source).await;

    assert_eq!(verdict.status, ExecutionStatus::CompileError);
    assert_eq!(verdict.exit_code, 100);
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_java_reads_the_value_feed_from_stdin() {
    let executors = Executors::connect().expect("docker daemon reachable");
    let source = submission(
        Language::Java,
        r#"
import java.util.Scanner;

public class Main {
    public static void main(String[] args) {
        Scanner scanner = new Scanner(System.in);
        int k = scanner.nextInt();
        System.out.println(k * 2);
    }
}
"#,
        "k=7",
    );

    let verdict = executors.java.execute(&source).await;

    assert_eq!(verdict.status, ExecutionStatus::Successful);
    assert_eq!(verdict.output, "14\n");
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_same_submission_twice_gives_matching_verdicts() {
    let executors = Executors::connect().expect("docker daemon reachable");
    let source = submission(Language::Python3, "print(sum(nums)+k)", "nums=[1,2,3], k=4");

    let first = executors.python3.execute(&source).await;
    let second = executors.python3.execute(&source).await;

    // runTime may differ, but the observable behaviour must not.
    assert_eq!(first.status, second.status);
    assert_eq!(first.output, second.output);
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_verbose_output_is_capped_at_8192_bytes() {
    let executors = Executors::connect().expect("docker daemon reachable");
    let source = submission(Language::Python3, "print('x' * 100000)", "");

    let verdict = executors.python3.execute(&source).await;

    assert!(verdict.output.len() <= 8192);
}
