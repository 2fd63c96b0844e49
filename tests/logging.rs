//! Global subscriber installation; runs in its own test binary so it does not
//! race `#[traced_test]` unit tests for the process-wide dispatcher.

use knox::observability::{init_logging, LogFormat};

#[test]
fn test_init_twice_is_harmless() {
    init_logging("info", LogFormat::Text, false);
    init_logging("debug", LogFormat::Json, true);
}
