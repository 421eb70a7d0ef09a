use crate::collaborators::Alerter;
use std::sync::{Mutex, PoisonError};

/// Keeps every alert for the run manifest and logs it as a warning.
#[derive(Debug, Default)]
pub struct AlertLog {
    alerts: Mutex<Vec<String>>,
}

impl AlertLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Alerts raised so far, oldest first.
    pub fn messages(&self) -> Vec<String> {
        self.alerts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Alerter for AlertLog {
    fn alert(&self, message: &str) {
        tracing::warn!("{}", message);
        self.alerts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alerts_are_kept_in_order() {
        let log = AlertLog::new();
        log.alert("first");
        log.alert("second");
        assert_eq!(log.messages(), vec!["first", "second"]);
    }
}
