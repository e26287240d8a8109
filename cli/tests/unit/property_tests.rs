//! Property-based tests for curl classification and shell quoting.

use canary_cli::domain::health::classify_curl;
use canary_cli::domain::{ProbeResult, RemoteStep, shell_quote};
use proptest::prelude::*;

proptest! {
    #[test]
    fn prop_curl_success_yields_status(code in 100u16..=599) {
        let result = classify_curl(0, &code.to_string(), "");
        prop_assert_eq!(result.clone(), ProbeResult::Status(code));
        prop_assert_eq!(result.is_healthy(), code == 200);
    }

    #[test]
    fn prop_no_status_is_never_healthy(exit in 0i32..=100, stderr in "[a-z ]{0,20}") {
        let result = classify_curl(exit, "000", &stderr);
        prop_assert!(!result.is_healthy());
        prop_assert_eq!(result.status(), None);
    }

    #[test]
    fn prop_fatal_exits_are_fatal(exit in prop::sample::select(vec![1i32, 3, 6])) {
        prop_assert!(matches!(classify_curl(exit, "000", ""), ProbeResult::Fatal(_)));
    }

    #[test]
    fn prop_quoted_string_has_no_bare_quote(s in "[^~][ -~]{0,40}") {
        let quoted = shell_quote(&s);
        prop_assert!(quoted.starts_with('\'') && quoted.ends_with('\''));
        let inner = &quoted[1..quoted.len() - 1];
        prop_assert!(!inner.replace(r"'\''", "").contains('\''));
        prop_assert_eq!(inner.replace(r"'\''", "'"), s);
    }

    #[test]
    fn prop_step_runs_inside_its_directory(dir in "[a-z/]{1,20}", cmd in "[a-z ./-]{1,30}") {
        let step = RemoteStep::in_dir("step", &dir, &cmd);
        let prefix = format!("cd {} && ", shell_quote(&dir));
        prop_assert!(step.command.starts_with(&prefix));
        prop_assert!(step.command.ends_with(&cmd));
        prop_assert!(!step.tolerate_failure);
    }
}

