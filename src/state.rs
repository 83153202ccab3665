use crate::{config::Config, realtime::Broadcaster, services::media_store::MediaStore};
use sqlx::SqlitePool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub broadcaster: Broadcaster,
    pub media: Arc<dyn MediaStore>,
    pub config: Arc<Config>,
}
