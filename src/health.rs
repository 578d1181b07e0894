//! Liveness probe
//!
//! Judges a canned Hello World program through the full engine path, so a
//! healthy answer means workspace creation, the toolchain and process
//! execution all work.

use tracing::{info, warn};

use crate::core::{ExecutionRequest, TestCase};
use crate::judger::JudgeEngine;
use crate::languages::Language;

const PROBE_OUTPUT: &str = "Hello World";
const PROBE_TIME_LIMIT_SECS: f64 = 5.0;

fn probe_program(language: Language) -> &'static str {
    match language {
        Language::JavaScript => "console.log('Hello World');\n",
        Language::Python => "print('Hello World')\n",
        Language::Java => {
            "public class Solution {\n    public static void main(String[] args) {\n        System.out.println(\"Hello World\");\n    }\n}\n"
        }
        Language::Cpp => {
            "#include <iostream>\n\nint main() {\n    std::cout << \"Hello World\" << std::endl;\n    return 0;\n}\n"
        }
    }
}

pub struct HealthProber<'a> {
    engine: &'a JudgeEngine,
}

impl<'a> HealthProber<'a> {
    pub fn new(engine: &'a JudgeEngine) -> Self {
        Self { engine }
    }

    /// Probe with the configured health language
    pub async fn probe(&self) -> bool {
        self.probe_language(self.engine.config().health_language).await
    }

    pub async fn probe_language(&self, language: Language) -> bool {
        let request = ExecutionRequest::new(probe_program(language), language.as_str())
            .with_test_case(TestCase::new("", PROBE_OUTPUT))
            .with_time_limit(PROBE_TIME_LIMIT_SECS);

        let healthy = match self.engine.execute(&request).await {
            Ok(results) => results.first().is_some_and(|r| r.success),
            Err(e) => {
                warn!("Health probe request rejected: {}", e);
                false
            }
        };

        if healthy {
            info!("Health probe passed for {}", language);
        } else {
            warn!("Health probe failed for {}", language);
        }
        healthy
    }
}
