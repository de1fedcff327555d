use std::sync::Arc;

use catalog::{Catalog, get_catalog_or_default, get_catalog_remote};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    config::{Config, ConfigError},
    i18n::{Language, Locales},
    reports::{HttpGenerator, NutritionEstimator, ReportGenerator},
    store::{MemoryStore, RedisStore, SeedError, Store, StoreError, seed_posts},
};

#[derive(Error, Debug)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Catalog(#[from] anyhow::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Seed(#[from] SeedError),

    #[error("Loading message catalogs: {0}")]
    Locales(#[from] serde_json::Error),

    #[error("Building AI client: {0}")]
    Generator(#[from] reqwest::Error),

    #[error("Binding server: {0}")]
    Io(#[from] std::io::Error),
}

pub struct AppState {
    pub config: Config,
    pub catalog: Catalog,
    pub store: Arc<dyn Store>,
    pub generator: Arc<dyn ReportGenerator>,
    pub locales: Arc<Locales>,
    pub default_language: Language,
}

impl AppState {
    pub async fn new() -> Result<Arc<Self>, StartupError> {
        let config = Config::load()?;

        let catalog = match &config.catalog_url {
            Some(url) => get_catalog_remote(url).await?,
            None => get_catalog_or_default(&config.catalog_path)?,
        };
        info!(
            "Catalog loaded with {} breeds and {} plans",
            catalog.breeds.len(),
            catalog.plans.len()
        );

        let store: Arc<dyn Store> = match &config.redis_url {
            Some(url) => Arc::new(RedisStore::connect(url).await?),
            None => {
                warn!("REDIS_URL not set, data lives in memory only");
                Arc::new(MemoryStore::new())
            }
        };

        if let Some(path) = &config.seed_posts_path {
            let inserted = seed_posts(store.as_ref(), path).await?;
            info!("Seeded {inserted} posts from {}", path.display());
        }

        let locales = Arc::new(Locales::load()?);

        let generator: Arc<dyn ReportGenerator> = match &config.ai_endpoint {
            Some(endpoint) => Arc::new(HttpGenerator::new(
                endpoint.clone(),
                config.ai_api_key.clone(),
            )?),
            None => {
                info!("AI_ENDPOINT not set, using the built-in estimator");
                Arc::new(NutritionEstimator::new(locales.clone()))
            }
        };

        Ok(Arc::new(Self::from_parts(config, catalog, store, generator, locales)))
    }

    pub fn from_parts(
        config: Config,
        catalog: Catalog,
        store: Arc<dyn Store>,
        generator: Arc<dyn ReportGenerator>,
        locales: Arc<Locales>,
    ) -> Self {
        let default_language = Language::from_code(&config.default_language).unwrap_or_else(|| {
            warn!(
                "Unsupported DEFAULT_LANGUAGE {}, falling back to en",
                config.default_language
            );
            Language::En
        });

        Self {
            config,
            catalog,
            store,
            generator,
            locales,
            default_language,
        }
    }
}
