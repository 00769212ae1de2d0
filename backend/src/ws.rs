use crate::catalog::Catalog;
use crate::detector::Detector;
use crate::routes::{run_prediction, PredictError};
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_ws::{Message, MessageStream, Session};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use log::{debug, info};
use shared::{ErrorResponse, PredictionFrame, PredictionResult, ReceiptResponse};
use std::sync::Arc;
use std::time::Duration;

/// Throttle between processed frames, so a client streaming camera frames
/// as fast as it can does not monopolize a worker. Applied after every text
/// frame, image or not, never while blocked waiting for the next one.
const FRAME_PACING: Duration = Duration::from_millis(100);

/// `GET /ws/realtime` upgrade. Each accepted connection gets its own task;
/// sessions share nothing but the read-only catalog and the detector.
pub async fn realtime(
    req: HttpRequest,
    stream: web::Payload,
    detector: web::Data<Detector>,
    catalog: web::Data<Catalog>,
) -> Result<HttpResponse, Error> {
    let (response, session, msg_stream) = actix_ws::handle(&req, stream)?;
    actix_web::rt::spawn(run_session(
        session,
        msg_stream,
        detector.into_inner(),
        catalog.into_inner(),
    ));
    Ok(response)
}

/// Session loop. Frames are handled strictly in arrival order, one at a
/// time; the reply for a frame is sent before the next frame is read.
async fn run_session(
    mut session: Session,
    mut stream: MessageStream,
    detector: Arc<Detector>,
    catalog: Arc<Catalog>,
) {
    while let Some(Ok(msg)) = stream.recv().await {
        match msg {
            Message::Text(text) => {
                if let Some(reply) = handle_frame(&text, &detector, &catalog).await {
                    match serde_json::to_string(&reply) {
                        Ok(payload) => {
                            if session.text(payload).await.is_err() {
                                // Client went away mid-send; drop the result.
                                break;
                            }
                        }
                        Err(e) => debug!("Failed to serialize prediction frame: {e}"),
                    }
                }
                tokio::time::sleep(FRAME_PACING).await;
            }
            Message::Ping(bytes) => {
                if session.pong(&bytes).await.is_err() {
                    break;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
    info!("Realtime session closed");
    let _ = session.close(None).await;
}

/// Routes one inbound text frame. Only `{"type": "image", ...}` produces a
/// reply; other tags and unparseable frames are skipped silently.
pub(crate) async fn handle_frame(
    text: &str,
    detector: &Arc<Detector>,
    catalog: &Catalog,
) -> Option<PredictionFrame> {
    let image_payload = match serde_json::from_str::<shared::InboundFrame>(text) {
        Ok(shared::InboundFrame::Image { image }) => image,
        Ok(shared::InboundFrame::Other) => return None,
        Err(e) => {
            debug!("Ignoring unparseable frame: {e}");
            return None;
        }
    };

    let data = match predict_from_base64(&image_payload, detector, catalog).await {
        Ok(receipt) => PredictionResult::Receipt(receipt),
        Err(e) => {
            debug!("Prediction failed on stream frame: {e}");
            PredictionResult::Error(ErrorResponse::from(&e))
        }
    };
    Some(PredictionFrame { data })
}

async fn predict_from_base64(
    payload: &str,
    detector: &Arc<Detector>,
    catalog: &Catalog,
) -> Result<ReceiptResponse, PredictError> {
    // Browsers send data URIs (`data:image/jpeg;base64,...`); the prefix
    // ends at the first comma.
    let encoded = payload
        .split_once(',')
        .map_or(payload, |(_, encoded)| encoded);
    let bytes = STANDARD.decode(encoded)?;
    run_prediction(Arc::clone(detector), catalog, bytes).await
}
