//! Assertion macros for error-heavy tests

/// Assert that a `Result` is an error whose display text contains a substring
///
/// # Examples
///
/// ```
/// let result: Result<(), String> = Err("session terminated".to_string());
/// sessionlink_common::assert_error_contains!(result, "terminated");
/// ```
#[macro_export]
macro_rules! assert_error_contains {
    ($result:expr, $substring:expr) => {
        match &$result {
            Ok(_) => panic!("Expected error but got Ok"),
            Err(e) => {
                let error_msg = format!("{}", e);
                assert!(
                    error_msg.contains($substring),
                    "Error message '{}' does not contain '{}'",
                    error_msg,
                    $substring
                );
            }
        }
    };
}

#[cfg(test)]
mod tests {
    #[test]
    fn matches_substring() {
        let result: Result<(), String> = Err("connection timeout".to_string());
        crate::assert_error_contains!(result, "timeout");
    }

    #[test]
    #[should_panic(expected = "Expected error but got Ok")]
    fn panics_on_ok() {
        let result: Result<(), String> = Ok(());
        crate::assert_error_contains!(result, "anything");
    }
}
