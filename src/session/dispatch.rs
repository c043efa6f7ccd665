//! Runs session effects against the collaborators on the tokio runtime.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{Effect, Settlement};
use crate::execution::Executor;
use crate::generation::Generator;

/// Spawns one task per effect. Each task posts exactly one [`Settlement`]:
/// the collaborator's answer, its error, a panic, or a missing collaborator
/// all end up as a settlement, so the matching in-flight flag always clears.
#[derive(Clone)]
pub struct Dispatcher {
    executor: Option<Arc<dyn Executor>>,
    generator: Option<Arc<dyn Generator>>,
    settled_tx: mpsc::UnboundedSender<Settlement>,
}

impl Dispatcher {
    pub fn new(settled_tx: mpsc::UnboundedSender<Settlement>) -> Self {
        Self { executor: None, generator: None, settled_tx }
    }

    pub fn with_executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn with_generator(mut self, generator: Arc<dyn Generator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn dispatch_all(&self, effects: Vec<Effect>) {
        for effect in effects {
            self.dispatch(effect);
        }
    }

    pub fn dispatch(&self, effect: Effect) {
        let tx = self.settled_tx.clone();
        match effect {
            Effect::Execute { id, source } => {
                let executor = self.executor.clone();
                tokio::spawn(async move {
                    let outcome = match executor {
                        Some(executor) => guarded(async move { executor.execute(&source).await }).await,
                        None => Err("no executor configured".to_string()),
                    };
                    if tx.send(Settlement::Executed { id, outcome }).is_err() {
                        debug!(%id, "session closed before execute settled");
                    }
                });
            }
            Effect::Generate { id, source } => {
                let generator = self.generator.clone();
                tokio::spawn(async move {
                    let outcome = match generator {
                        Some(generator) => guarded(async move { generator.generate(&source).await }).await,
                        None => Err("no generator configured".to_string()),
                    };
                    if tx.send(Settlement::Generated { id, outcome }).is_err() {
                        debug!(%id, "session closed before generate settled");
                    }
                });
            }
        }
    }
}

/// Run a collaborator call on its own task so a panic comes back as an error.
async fn guarded<T, F>(call: F) -> Result<T, String>
where
    T: Send + 'static,
    F: Future<Output = anyhow::Result<T>> + Send + 'static,
{
    match tokio::spawn(call).await {
        Ok(result) => result.map_err(|e| format!("{:#}", e)),
        Err(e) => {
            warn!(error = %e, "collaborator task failed");
            Err(format!("collaborator task failed: {}", e))
        }
    }
}
