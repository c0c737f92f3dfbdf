//! Log sink registration
//!
//! The embedding application (typically a control GUI) observes the
//! server through human-readable, timestamped log lines. Zero or more
//! sinks may be registered; delivery order among sinks is unspecified.

/// Receives timestamped human-readable log lines
pub trait LogSink: Send + Sync {
    fn log(&self, line: &str);
}

impl<F> LogSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn log(&self, line: &str) {
        self(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_closure_sink() {
        let lines = Mutex::new(Vec::new());
        let sink = |line: &str| {
            lines.lock().unwrap().push(line.to_string());
        };

        LogSink::log(&sink, "hello");

        assert_eq!(lines.lock().unwrap().as_slice(), ["hello"]);
    }
}
