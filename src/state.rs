// src/state.rs

use std::sync::Arc;

use axum::extract::FromRef;

use crate::{
    config::Config, insights::InsightsProvider, room::RoomRegistry, store::SessionStore,
};

/// Everything a handler may need. The room registry is owned here and
/// injected, never reached through a global.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn SessionStore>,
    pub rooms: Arc<RoomRegistry>,
    pub insights: Arc<dyn InsightsProvider>,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn SessionStore>,
        insights: Arc<dyn InsightsProvider>,
    ) -> Self {
        let rooms = Arc::new(RoomRegistry::new(config.room_channel_capacity));
        Self {
            config,
            store,
            rooms,
            insights,
        }
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for Arc<dyn SessionStore> {
    fn from_ref(state: &AppState) -> Self {
        state.store.clone()
    }
}

impl FromRef<AppState> for Arc<RoomRegistry> {
    fn from_ref(state: &AppState) -> Self {
        state.rooms.clone()
    }
}

impl FromRef<AppState> for Arc<dyn InsightsProvider> {
    fn from_ref(state: &AppState) -> Self {
        state.insights.clone()
    }
}
