use actix_web::{web, HttpResponse};
use chrono::Utc;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::mlclient::{Predictor, RetrainError, Trainer};
use crate::pbook::lister::ExampleLister;

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn internal_error(message: String) -> HttpResponse {
    HttpResponse::InternalServerError().json(ErrorResponse { error: message })
}

#[derive(Deserialize)]
struct PredictBody {
    assignments: Vec<f64>,
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/tasks/retrain").route(web::post().to(retrain)))
        .service(web::resource("/tasks/examples-update").route(web::post().to(update_examples)))
        .service(web::resource("/api/examples").route(web::get().to(get_examples)))
        .service(web::resource("/api/examples/results").route(web::get().to(example_results)))
        .service(web::resource("/api/predict").route(web::post().to(predict)));
}

async fn retrain(trainer: web::Data<Trainer>) -> HttpResponse {
    info!("Retrain requested");
    match trainer.retrain(Utc::now()).await {
        Ok(()) => HttpResponse::Ok().json(json!({ "status": "ok" })),
        Err(RetrainError::Conflict(msg)) => {
            warn!("Retrain lost a concurrent update: {}", msg);
            HttpResponse::Conflict().json(ErrorResponse { error: msg })
        }
        Err(e) => {
            error!("Retrain failed: {}", e);
            internal_error(e.to_string())
        }
    }
}

async fn update_examples(lister: web::Data<ExampleLister>) -> HttpResponse {
    match lister.update_examples().await {
        Ok(examples) => HttpResponse::Ok().json(json!({
            "status": "ok",
            "count": examples.len()
        })),
        Err(e) => {
            error!("Updating examples failed: {}", e);
            internal_error(e.to_string())
        }
    }
}

async fn get_examples(lister: web::Data<ExampleLister>) -> HttpResponse {
    match lister.get_examples().await {
        Ok(examples) => HttpResponse::Ok().json(examples),
        Err(e) => {
            error!("Reading examples failed: {}", e);
            internal_error(e.to_string())
        }
    }
}

async fn predict(predictor: web::Data<Predictor>, body: web::Json<PredictBody>) -> HttpResponse {
    match predictor.predict(&body.assignments).await {
        Ok(p) => HttpResponse::Ok().json(json!({ "prediction": p })),
        Err(e) if e.is_invalid_input() => {
            HttpResponse::BadRequest().json(ErrorResponse { error: e.to_string() })
        }
        Err(e) => {
            error!("Unable to generate requested prediction: {}", e);
            internal_error(e.to_string())
        }
    }
}

async fn example_results(
    lister: web::Data<ExampleLister>,
    predictor: web::Data<Predictor>,
) -> HttpResponse {
    match lister.get_examples().await {
        Ok(examples) => HttpResponse::Ok().json(predictor.predict_examples(examples).await),
        Err(e) => {
            error!("Reading examples failed: {}", e);
            internal_error(e.to_string())
        }
    }
}
