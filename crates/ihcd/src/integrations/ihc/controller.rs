use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

/// Identifier the IHC controller assigns to a resource (sensor input, actuator output)
pub type IhcId = u32;

/// Value carried by a controller change notification.
///
/// Dimmer resources report an integer percentage, relays and inputs report a boolean.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeValue {
    Bool(bool),
    Int(i64),
}

impl fmt::Display for RuntimeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
        }
    }
}

/// Callback invoked by the controller for every change of a subscribed resource
pub type NotifyHandler = Arc<dyn Fn(IhcId, RuntimeValue) + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("Failed to fetch project: {0}")]
    Project(String),

    #[error("Failed to set resource {id}: {reason}")]
    Command { id: IhcId, reason: String },

    #[error("Failed to subscribe to resource {id}: {reason}")]
    Subscribe { id: IhcId, reason: String },
}

/// Client for an IHC controller
///
/// Connection management and the wire protocol live behind this trait; the
/// integration only needs the project document, notifications and the two
/// runtime value setters.
#[async_trait]
pub trait IhcController: Send + Sync {
    /// Fetch the raw project document (UTF-8 XML)
    async fn get_project(&self) -> Result<String, ControllerError>;

    /// Register a handler for change notifications of one resource
    fn add_notify_event(&self, id: IhcId, handler: NotifyHandler) -> Result<(), ControllerError>;

    /// Set an integer resource value (dimmer level 0-100)
    async fn set_runtime_value_int(&self, id: IhcId, value: i64) -> Result<(), ControllerError>;

    /// Set a boolean resource value (relay on/off)
    async fn set_runtime_value_bool(&self, id: IhcId, value: bool) -> Result<(), ControllerError>;
}

/// Mock controller for testing
///
/// Records commands and subscriptions; `notify` invokes the registered handlers
/// the same way a controller delivering a change would.
#[cfg(test)]
#[derive(Default)]
pub struct MockController {
    pub project: std::sync::Mutex<Option<String>>,
    pub commands: std::sync::Mutex<Vec<(IhcId, RuntimeValue)>>,
    pub handlers: std::sync::Mutex<Vec<(IhcId, NotifyHandler)>>,
    pub fail_commands: std::sync::atomic::AtomicBool,
}

#[cfg(test)]
impl MockController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_project(project: &str) -> Self {
        let controller = Self::new();
        *controller.project.lock().unwrap() = Some(project.to_string());
        controller
    }

    /// Deliver a notification to every handler subscribed to `id`
    pub fn notify(&self, id: IhcId, value: RuntimeValue) {
        let handlers: Vec<NotifyHandler> = self
            .handlers
            .lock()
            .unwrap()
            .iter()
            .filter(|(hid, _)| *hid == id)
            .map(|(_, h)| h.clone())
            .collect();
        for handler in handlers {
            handler(id, value);
        }
    }

    pub fn subscriptions(&self, id: IhcId) -> usize {
        self.handlers
            .lock()
            .unwrap()
            .iter()
            .filter(|(hid, _)| *hid == id)
            .count()
    }

    pub fn commands(&self) -> Vec<(IhcId, RuntimeValue)> {
        self.commands.lock().unwrap().clone()
    }

    fn record(&self, id: IhcId, value: RuntimeValue) -> Result<(), ControllerError> {
        if self.fail_commands.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(ControllerError::Command {
                id,
                reason: "controller offline".to_string(),
            });
        }
        self.commands.lock().unwrap().push((id, value));
        Ok(())
    }
}

#[cfg(test)]
#[async_trait]
impl IhcController for MockController {
    async fn get_project(&self) -> Result<String, ControllerError> {
        self.project
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| ControllerError::Project("no project loaded".to_string()))
    }

    fn add_notify_event(&self, id: IhcId, handler: NotifyHandler) -> Result<(), ControllerError> {
        self.handlers.lock().unwrap().push((id, handler));
        Ok(())
    }

    async fn set_runtime_value_int(&self, id: IhcId, value: i64) -> Result<(), ControllerError> {
        self.record(id, RuntimeValue::Int(value))
    }

    async fn set_runtime_value_bool(
        &self,
        id: IhcId,
        value: bool,
    ) -> Result<(), ControllerError> {
        self.record(id, RuntimeValue::Bool(value))
    }
}
