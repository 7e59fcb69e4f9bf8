use std::sync::Arc;

use crate::{
    config::AppConfig,
    db::{DbPool, OrmConn},
    services::{image_store::ImageStore, mailer::Mailer},
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub config: Arc<AppConfig>,
    pub images: Arc<dyn ImageStore>,
    pub mailer: Arc<dyn Mailer>,
}
