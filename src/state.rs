use std::sync::Arc;

use crate::config::Settings;
use crate::warehouse::Warehouse;

#[derive(Clone)]
pub struct AppState {
    pub warehouse: Arc<dyn Warehouse>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(warehouse: Arc<dyn Warehouse>, settings: Settings) -> Self {
        Self {
            warehouse,
            settings: Arc::new(settings),
        }
    }
}
