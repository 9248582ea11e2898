use std::sync::Arc;

use crate::audit::{AuditRunner, SubprocessAuditRunner};
use crate::core::config::{AppPaths, ConfigService, PipelineSettings};
use crate::core::security::{init_session_token, SessionToken};
use crate::pipeline::PipelineContext;

pub mod error;

use error::InitializationError;

/// Shared application state handed to every route.
///
/// The pipeline is built once here and is read-only afterwards; config
/// edits made over HTTP take effect on the next start.
#[derive(Clone)]
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub config: ConfigService,
    pub session_token: SessionToken,
    pub pipeline: Arc<PipelineContext>,
    pub audit: Arc<dyn AuditRunner>,
}

impl AppState {
    /// Loads configuration, indexes the policy documents and wires the
    /// metric backends. Any failure aborts start-up.
    pub async fn initialize() -> Result<Arc<Self>, InitializationError> {
        let paths = Arc::new(AppPaths::new());
        Self::initialize_at(paths).await
    }

    pub async fn initialize_at(paths: Arc<AppPaths>) -> Result<Arc<Self>, InitializationError> {
        let config = ConfigService::new(paths.clone());
        let raw = config
            .load_config()
            .map_err(|e| InitializationError::Config(e.into()))?;
        let settings = PipelineSettings::from_config(&raw).with_env_overrides();

        let audit = Arc::new(SubprocessAuditRunner::from_settings(&settings.audit, &paths));
        let pipeline = Arc::new(PipelineContext::initialize(&paths, settings).await?);
        let session_token = init_session_token(&paths);

        Ok(Arc::new(AppState {
            paths,
            config,
            session_token,
            pipeline,
            audit,
        }))
    }

    /// Assembles state from pre-built parts.
    pub fn from_parts(
        paths: Arc<AppPaths>,
        session_token: SessionToken,
        pipeline: Arc<PipelineContext>,
        audit: Arc<dyn AuditRunner>,
    ) -> Arc<Self> {
        let config = ConfigService::new(paths.clone());
        Arc::new(AppState {
            paths,
            config,
            session_token,
            pipeline,
            audit,
        })
    }
}
