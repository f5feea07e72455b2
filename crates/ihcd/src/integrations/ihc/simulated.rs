//! Controller stand-in for running without hardware.
//!
//! The project document is read from disk, and every value written to a
//! resource is delivered back to the handlers subscribed to it, the way a
//! real controller reports the change of an output it just switched.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;
use tracing::info;

use super::controller::ControllerError;
use super::controller::IhcController;
use super::controller::IhcId;
use super::controller::NotifyHandler;
use super::controller::RuntimeValue;
use super::device::lock;

pub struct SimulatedController {
    project_file: Option<PathBuf>,
    handlers: Mutex<HashMap<IhcId, Vec<NotifyHandler>>>,
}

impl SimulatedController {
    pub fn new(project_file: Option<PathBuf>) -> Self {
        Self {
            project_file,
            handlers: Mutex::new(HashMap::new()),
        }
    }

    /// Deliver `value` to every handler subscribed to `id`
    pub fn notify(&self, id: IhcId, value: RuntimeValue) {
        // Handlers run outside the lock so they may subscribe or notify themselves
        let handlers = lock(&self.handlers).get(&id).cloned().unwrap_or_default();
        debug!(
            "Simulated resource {} = {} ({} handler(s))",
            id,
            value,
            handlers.len()
        );
        for handler in handlers {
            handler(id, value);
        }
    }
}

#[async_trait]
impl IhcController for SimulatedController {
    async fn get_project(&self) -> Result<String, ControllerError> {
        let path = self
            .project_file
            .as_ref()
            .ok_or_else(|| ControllerError::Project("no project_file configured".to_string()))?;

        info!("Loading IHC project from {}", path.display());
        tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ControllerError::Project(format!("{}: {}", path.display(), e)))
    }

    fn add_notify_event(&self, id: IhcId, handler: NotifyHandler) -> Result<(), ControllerError> {
        lock(&self.handlers).entry(id).or_default().push(handler);
        Ok(())
    }

    async fn set_runtime_value_int(&self, id: IhcId, value: i64) -> Result<(), ControllerError> {
        self.notify(id, RuntimeValue::Int(value));
        Ok(())
    }

    async fn set_runtime_value_bool(&self, id: IhcId, value: bool) -> Result<(), ControllerError> {
        self.notify(id, RuntimeValue::Bool(value));
        Ok(())
    }
}
