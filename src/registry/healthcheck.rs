use parking_lot::Mutex;

use super::view::HealthcheckView;

type CheckFn = Box<dyn Fn() -> Result<(), String> + Send + Sync>;

/// Named liveness probe. Kept in the registry but never reported.
pub struct Healthcheck {
    check: CheckFn,
    last_error: Mutex<Option<String>>,
}

impl Healthcheck {
    pub fn new(check: impl Fn() -> Result<(), String> + Send + Sync + 'static) -> Self {
        Self {
            check: Box::new(check),
            last_error: Mutex::new(None),
        }
    }

    /// Run the probe and remember its outcome.
    pub fn check(&self) {
        *self.last_error.lock() = (self.check)().err();
    }

    pub fn error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }
}

impl std::fmt::Debug for Healthcheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Healthcheck")
            .field("last_error", &*self.last_error.lock())
            .finish_non_exhaustive()
    }
}

impl HealthcheckView for Healthcheck {
    fn error(&self) -> Option<String> {
        Healthcheck::error(self)
    }
}
