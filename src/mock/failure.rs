//! Failure injection for the mock tools

use std::collections::HashMap;

use crate::tools::ToolOp;

/// Failure configuration for one tool operation
#[derive(Debug, Clone)]
pub struct FailureConfig {
    /// Detail reported in the resulting error
    pub message: String,
    /// Calls allowed to succeed before failures start
    pub skip_count: u32,
    /// Number of times to fail before succeeding (None = always fail)
    pub fail_count: Option<u32>,
}

impl FailureConfig {
    /// Fail every call with `message`
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            skip_count: 0,
            fail_count: None,
        }
    }

    /// Let the first `count` calls through
    pub fn after(mut self, count: u32) -> Self {
        self.skip_count = count;
        self
    }

    /// Stop failing after `count` failures
    pub fn with_fail_count(mut self, count: u32) -> Self {
        self.fail_count = Some(count);
        self
    }
}

/// Per-operation failure injector
#[derive(Debug, Default)]
pub struct FailureInjector {
    configs: HashMap<ToolOp, FailureConfig>,
    call_counts: HashMap<ToolOp, u32>,
}

impl FailureInjector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inject(&mut self, op: ToolOp, config: FailureConfig) {
        self.configs.insert(op, config);
        self.call_counts.insert(op, 0);
    }

    pub fn inject_error(&mut self, op: ToolOp, message: impl Into<String>) {
        self.inject(op, FailureConfig::error(message));
    }

    pub fn clear(&mut self) {
        self.configs.clear();
        self.call_counts.clear();
    }

    /// Count a call and return the failure to report, if any
    pub fn check(&mut self, op: ToolOp) -> Option<&FailureConfig> {
        let config = self.configs.get(&op)?;
        let count = self.call_counts.entry(op).or_insert(0);
        *count += 1;

        if *count <= config.skip_count {
            return None;
        }
        if let Some(limit) = config.fail_count {
            if *count - config.skip_count > limit {
                return None;
            }
        }
        Some(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_injector_basic() {
        let mut injector = FailureInjector::new();
        assert!(injector.check(ToolOp::Build).is_none());

        injector.inject_error(ToolOp::Build, "compiler crashed");
        let config = injector.check(ToolOp::Build);
        assert_eq!(config.map(|c| c.message.as_str()), Some("compiler crashed"));
        assert!(injector.check(ToolOp::Lipo).is_none());
    }

    #[test]
    fn test_failure_injector_fail_count() {
        let mut injector = FailureInjector::new();
        injector.inject(ToolOp::Download, FailureConfig::error("503").with_fail_count(2));

        assert!(injector.check(ToolOp::Download).is_some());
        assert!(injector.check(ToolOp::Download).is_some());
        assert!(injector.check(ToolOp::Download).is_none());
    }

    #[test]
    fn test_failure_injector_after() {
        let mut injector = FailureInjector::new();
        injector.inject(ToolOp::Build, FailureConfig::error("boom").after(1));

        assert!(injector.check(ToolOp::Build).is_none());
        assert!(injector.check(ToolOp::Build).is_some());
        assert!(injector.check(ToolOp::Build).is_some());
    }

    #[test]
    fn test_failure_injector_clear() {
        let mut injector = FailureInjector::new();
        injector.inject_error(ToolOp::Lipo, "bad");
        assert!(injector.check(ToolOp::Lipo).is_some());

        injector.clear();
        assert!(injector.check(ToolOp::Lipo).is_none());
    }
}
