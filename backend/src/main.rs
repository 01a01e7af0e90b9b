mod config;
mod db;
mod mlclient;
mod mlengine;
mod pbook;
mod routes;
mod storage;

use std::env;
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use aws_sdk_s3::Client as S3Client;
use config::{Config, FileStoreConfig, MlAuthConfig};
use db::dynamodb_repository::DynamoDbStore;
use mlclient::{Predictor, Trainer};
use mlclient::services::{FileStore, PersistentStore, TokioSleeper};
use mlengine::auth::{MetadataTokenProvider, TokenProvider};
use mlengine::client::MlEngineClient;
use pbook::lister::ExampleLister;
use pbook::source::HttpPredictionSource;
use routes::configure_routes;
use storage::local::LocalFileStore;
use storage::s3_service::S3FileStore;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    dotenv::dotenv().ok();

    if let Ok(current_dir) = env::current_dir() {
        log::info!("Current working directory: {}", current_dir.display());
    }

    let config = Config::from_env().map_err(|e| {
        log::error!("Invalid configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;

    // Initialize AWS configuration
    let aws_config = aws_config::defaults(BehaviorVersion::latest()).load().await;

    let persistent_store: Arc<dyn PersistentStore> = Arc::new(DynamoDbStore::new(
        DynamoDbClient::new(&aws_config),
        config.status_table.clone(),
    ));

    let file_store: Arc<dyn FileStore> = match &config.file_store {
        FileStoreConfig::S3 { bucket } => {
            log::info!("Datasets are stored in S3 bucket {}", bucket);
            Arc::new(S3FileStore::new(S3Client::new(&aws_config), bucket.clone()))
        }
        FileStoreConfig::Local { root } => {
            log::info!("Datasets are stored under {}", root.display());
            Arc::new(LocalFileStore::new(root.clone()))
        }
    };

    let http = reqwest::Client::new();
    let prediction_source = Arc::new(HttpPredictionSource::new(
        http.clone(),
        &config.prediction_source_url,
    ));
    let tokens = match &config.ml_auth {
        MlAuthConfig::Static(token) => TokenProvider::Static(token.clone()),
        MlAuthConfig::Metadata { token_url } => {
            log::info!("Fetching training API tokens from {}", token_url);
            TokenProvider::Metadata(MetadataTokenProvider::new(http.clone(), token_url.clone()))
        }
    };
    let training_api = Arc::new(MlEngineClient::new(
        http,
        &config.ml_api_base_url,
        config.ml_project.clone(),
        config.ml_model.clone(),
        tokens,
    ));

    let trainer = web::Data::new(Trainer::new(
        config.trainer.clone(),
        persistent_store.clone(),
        file_store,
        prediction_source.clone(),
        training_api.clone(),
        Arc::new(TokioSleeper),
    ));
    let predictor = web::Data::new(Predictor::new(training_api));
    let lister = web::Data::new(ExampleLister::new(prediction_source, persistent_store));

    let bind_address = format!("0.0.0.0:{}", config.port);
    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .max_age(3600),
            )
            .app_data(trainer.clone())
            .app_data(lister.clone())
            .app_data(predictor.clone())
            .configure(configure_routes)
    })
    .bind(&bind_address)?
    .run()
    .await
}
