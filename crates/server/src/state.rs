use scanocr_ocr::recognizer::RecognizerFactory;
use scanocr_ocr::RecognitionService;
use std::sync::Arc;

use crate::config::ServerConfig;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub service: Arc<RecognitionService>,
}

impl AppState {
    pub fn new(config: ServerConfig, factory: Arc<dyn RecognizerFactory>) -> Self {
        let service = RecognitionService::new(factory, config.devices(), config.service_options());
        Self {
            config: Arc::new(config),
            service: Arc::new(service),
        }
    }
}
