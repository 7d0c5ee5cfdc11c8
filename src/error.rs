use std::any::Any;

use thiserror::Error;

/// Raised when no window can be opened, e.g. on a machine without a display.
#[derive(Debug, Error)]
#[error("failed to initialize {stage}: {message}")]
pub struct WindowInitError {
    stage: &'static str,
    message: String,
}

impl WindowInitError {
    pub fn from_panic(stage: &'static str, panic: Box<dyn Any + Send>) -> Self {
        Self {
            stage,
            message: panic_message(panic),
        }
    }

    pub fn from_error(stage: &'static str, err: impl std::fmt::Display) -> Self {
        Self {
            stage,
            message: err.to_string(),
        }
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    match panic.downcast::<String>() {
        Ok(msg) => *msg,
        Err(panic) => match panic.downcast::<&'static str>() {
            Ok(msg) => (*msg).to_string(),
            Err(_) => "unknown panic".into(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_stage_and_cause() {
        let err = WindowInitError::from_error("window", "no display");
        assert_eq!(err.to_string(), "failed to initialize window: no display");
    }

    #[test]
    fn recovers_panic_payloads() {
        let err = WindowInitError::from_panic("event loop", Box::new("boom"));
        assert_eq!(err.to_string(), "failed to initialize event loop: boom");
        let err = WindowInitError::from_panic("event loop", Box::new(String::from("owned")));
        assert!(err.to_string().ends_with("owned"));
        let err = WindowInitError::from_panic("event loop", Box::new(7_u8));
        assert!(err.to_string().ends_with("unknown panic"));
    }
}
