//! Driver Configuration

use std::fmt;
use std::rc::Rc;

use crate::{DriverError, Module};

/// Callback receiving errors that must not stop the driver
pub type ErrorReporter = Rc<dyn Fn(&DriverError)>;

/// DOM driver configuration options
#[derive(Clone)]
pub struct DriverOptions {
    /// Patch modules run after the isolation module
    pub modules: Vec<Rc<dyn Module>>,

    /// Receives patch, module hook and dispatch failures
    pub report_error: ErrorReporter,

    /// Name of the produced source, used in logs
    pub name: String,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            modules: Vec::new(),
            report_error: Rc::new(|err: &DriverError| {
                tracing::error!(error = %err, "DOM driver error");
            }),
            name: "DOM".to_string(),
        }
    }
}

impl DriverOptions {
    /// Add a patch module
    pub fn with_module(mut self, module: Rc<dyn Module>) -> Self {
        self.modules.push(module);
        self
    }

    /// Replace the error reporter
    pub fn with_error_reporter(mut self, report: impl Fn(&DriverError) + 'static) -> Self {
        self.report_error = Rc::new(report);
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }
}

impl fmt::Debug for DriverOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverOptions")
            .field("modules", &self.modules.iter().map(|m| m.name()).collect::<Vec<_>>())
            .field("name", &self.name)
            .finish()
    }
}
