use crate::clock::Clock;
use crate::gateway::SubmissionGateway;
use crate::models::CheckinConfig;
use crate::persistence::ProgressPersistence;
use crate::session::SessionSlot;
use crate::storage::KeyValueStore;
use std::{sync::Arc, time::Duration};
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct AppState {
    pub checkin: Option<Arc<CheckinConfig>>,
    pub store: Arc<dyn KeyValueStore>,
    pub clock: Arc<dyn Clock>,
    pub gateway: Arc<dyn SubmissionGateway>,
    pub save_debounce: Duration,
    pub session: SessionSlot,
}

impl AppState {
    pub fn new(
        checkin: Option<CheckinConfig>,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        gateway: Arc<dyn SubmissionGateway>,
        save_debounce: Duration,
    ) -> Self {
        Self {
            checkin: checkin.map(Arc::new),
            store,
            clock,
            gateway,
            save_debounce,
            session: Arc::new(Mutex::new(None)),
        }
    }

    pub fn persistence(&self, config_id: u64) -> ProgressPersistence {
        ProgressPersistence::new(
            Arc::clone(&self.store),
            Arc::clone(&self.clock),
            config_id,
            self.save_debounce,
        )
    }
}
