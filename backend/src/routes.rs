use crate::catalog::{Catalog, UnknownProduct};
use crate::detector::{Detector, DetectorError};
use crate::receipt;
use actix_multipart::Multipart;
use actix_web::{web, Error, HttpResponse};
use futures::{StreamExt, TryStreamExt};
use log::error;
use serde_json::json;
use shared::{ErrorResponse, PredictionResult, ProductInfo, ReceiptResponse};
use std::io::Write;
use std::sync::Arc;

/// Everything that can go wrong between receiving image bytes and producing
/// a receipt. All of it is converted to the error-shaped body at the
/// transport boundary; nothing escapes as a raw fault.
#[derive(Debug, thiserror::Error)]
pub enum PredictError {
    #[error("invalid image data: {0}")]
    Decode(#[from] image::ImageError),
    #[error("invalid base64 image payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error(transparent)]
    UnknownProduct(#[from] UnknownProduct),
    #[error(transparent)]
    Detector(#[from] DetectorError),
    #[error("detection task was canceled")]
    Canceled,
}

impl From<&PredictError> for ErrorResponse {
    fn from(err: &PredictError) -> Self {
        ErrorResponse::new(format!("Prediction failed: {err}"))
    }
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::get().to(index)))
        .service(web::resource("/health").route(web::get().to(health)))
        .service(web::resource("/products").route(web::get().to(list_products)))
        .service(web::resource("/predict").route(web::post().to(predict)))
        .service(web::resource("/ws/realtime").route(web::get().to(crate::ws::realtime)));
}

/// Shared detect-then-aggregate pipeline behind both transports. Inference
/// may be CPU-bound, so it runs on the blocking pool instead of stalling
/// the workers that accept frames for other connections.
pub(crate) async fn run_prediction(
    detector: Arc<Detector>,
    catalog: &Catalog,
    image_bytes: Vec<u8>,
) -> Result<ReceiptResponse, PredictError> {
    let image = image::load_from_memory(&image_bytes)?;
    let model_used = detector.model_loaded();
    let class_ids = web::block(move || detector.detect(&image))
        .await
        .map_err(|_| PredictError::Canceled)??;
    let receipt = receipt::aggregate(&class_ids, catalog)?;
    Ok(ReceiptResponse {
        products: receipt.items,
        total: receipt.total,
        model_used,
    })
}

async fn index() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "message": "Smart Checkout API is running!" }))
}

async fn health(detector: web::Data<Detector>) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "model_loaded": detector.model_loaded(),
    }))
}

async fn list_products(catalog: web::Data<Catalog>) -> HttpResponse {
    let products: Vec<ProductInfo> = catalog
        .entries()
        .iter()
        .map(|entry| ProductInfo {
            id: entry.id,
            name: entry.name.clone(),
            price: entry.price,
        })
        .collect();
    HttpResponse::Ok().json(json!({ "products": products }))
}

/// One-shot transport: multipart upload in, receipt (or error body) out.
/// Failures keep the success status; clients detect them through the
/// `error` field, which the deployed clients already rely on.
async fn predict(
    detector: web::Data<Detector>,
    catalog: web::Data<Catalog>,
    mut payload: Multipart,
) -> Result<HttpResponse, Error> {
    let mut image_data = Vec::new();
    while let Ok(Some(mut field)) = payload.try_next().await {
        while let Some(chunk) = field.next().await {
            let data = chunk?;
            image_data.write_all(&data)?;
        }
        // One image per request; the first non-empty field wins.
        if !image_data.is_empty() {
            break;
        }
    }

    let body = match run_prediction(detector.into_inner(), catalog.get_ref(), image_data).await {
        Ok(receipt) => PredictionResult::Receipt(receipt),
        Err(e) => {
            error!("Prediction failed: {e}");
            PredictionResult::Error(ErrorResponse::from(&e))
        }
    };
    Ok(HttpResponse::Ok().json(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogEntry;
    use crate::detector::mock::MockDetector;
    use actix_web::http::header;
    use actix_web::{test, App};

    fn fixture_catalog() -> Catalog {
        Catalog::new(vec![
            CatalogEntry {
                id: 0,
                name: "A".into(),
                price: 1200,
            },
            CatalogEntry {
                id: 1,
                name: "B".into(),
                price: 1500,
            },
        ])
        .unwrap()
    }

    fn png_bytes() -> Vec<u8> {
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgb8(image::RgbImage::new(8, 8))
            .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    fn multipart_body(payload: &[u8]) -> (String, Vec<u8>) {
        let boundary = "predict-test-boundary";
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; \
                 filename=\"upload.png\"\r\nContent-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(payload);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
        (format!("multipart/form-data; boundary={boundary}"), body)
    }

    macro_rules! test_app {
        () => {{
            let catalog = fixture_catalog();
            let detector = Detector::Mock(MockDetector::new(catalog.ids()));
            test::init_service(
                App::new()
                    .app_data(web::Data::new(catalog))
                    .app_data(web::Data::new(detector))
                    .configure(configure_routes),
            )
            .await
        }};
    }

    #[actix_web::test]
    async fn index_returns_liveness_banner() {
        let app = test_app!();
        let req = test::TestRequest::get().uri("/").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["message"], "Smart Checkout API is running!");
    }

    #[actix_web::test]
    async fn health_reports_detector_mode() {
        let app = test_app!();
        let req = test::TestRequest::get().uri("/health").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["model_loaded"], false);
    }

    #[actix_web::test]
    async fn products_lists_catalog_in_definition_order() {
        let app = test_app!();
        let req = test::TestRequest::get().uri("/products").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        let products = body["products"].as_array().unwrap();
        assert_eq!(products.len(), 2);
        assert_eq!(products[0]["id"], 0);
        assert_eq!(products[0]["name"], "A");
        assert_eq!(products[1]["id"], 1);
        assert!(products.iter().all(|p| p["price"].as_u64().unwrap() > 0));
    }

    #[actix_web::test]
    async fn predict_returns_a_consistent_mock_receipt() {
        let app = test_app!();
        let (content_type, body) = multipart_body(&png_bytes());
        let req = test::TestRequest::post()
            .uri("/predict")
            .insert_header((header::CONTENT_TYPE, content_type))
            .set_payload(body)
            .to_request();
        let resp: PredictionResult = test::call_and_read_body_json(&app, req).await;

        let PredictionResult::Receipt(receipt) = resp else {
            panic!("expected a receipt, got {resp:?}");
        };
        assert!(!receipt.model_used);
        assert!(!receipt.products.is_empty());
        let subtotal_sum: u32 = receipt.products.iter().map(|p| p.subtotal).sum();
        assert_eq!(subtotal_sum, receipt.total);
    }

    #[actix_web::test]
    async fn predict_converts_decode_failures_into_the_error_body() {
        let app = test_app!();
        let (content_type, body) = multipart_body(b"definitely not an image");
        let req = test::TestRequest::post()
            .uri("/predict")
            .insert_header((header::CONTENT_TYPE, content_type))
            .set_payload(body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());

        let body: PredictionResult = test::read_body_json(resp).await;
        let PredictionResult::Error(err) = body else {
            panic!("expected an error body, got {body:?}");
        };
        assert!(err.error.starts_with("Prediction failed:"));
        assert!(err.products.is_empty());
        assert_eq!(err.total, 0);
    }

    #[actix_web::test]
    async fn unknown_product_surfaces_as_the_error_body() {
        // A detector emitting an id the catalog does not know, as after a
        // model/catalog version skew.
        let detector = Detector::Mock(MockDetector::new(vec![7]));
        let result = run_prediction(Arc::new(detector), &fixture_catalog(), png_bytes()).await;

        let err = result.unwrap_err();
        assert!(matches!(
            err,
            PredictError::UnknownProduct(UnknownProduct(7))
        ));
        let body = ErrorResponse::from(&err);
        assert_eq!(body.error, "Prediction failed: unknown product id 7");
        assert!(body.products.is_empty());
        assert_eq!(body.total, 0);
    }
}
