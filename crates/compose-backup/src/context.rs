//! Context for the current unit of work
//!

use core::fmt::Display;

/// Holds the context for the current unit of work. Used for prefixing logs.
#[derive(Default, Debug, Clone)]
pub struct Context {
    /// The service being processed.
    pub service: Option<String>,
    /// The container being backed up.
    pub container: Option<String>,
    /// The current context
    pub current_context: &'static str,
}

impl Context {
    /// A context scoped to a service.
    pub fn for_service(service: &str) -> Self {
        Self {
            service: Some(service.to_string()),
            ..Default::default()
        }
    }

    /// A copy of this context scoped to a container.
    pub fn with_container(&self, container: &str) -> Self {
        Self {
            container: Some(container.to_string()),
            ..self.clone()
        }
    }
}

impl Display for Context {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if let Some(service) = &self.service {
            write!(f, "[{service}] ")?;
        }

        if let Some(container) = &self.container {
            write!(f, "[{container}] ")?;
        }

        if !self.current_context.is_empty() {
            write!(f, "[{}] ", self.current_context)?;
        }

        Ok(())
    }
}
