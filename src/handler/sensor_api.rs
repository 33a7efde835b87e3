//! Sensor endpoints
//!
//! `/data` serves the latest calibrated reading and, in push mode, accepts
//! angles from a remote node. `/calibrate` moves the zero point.

use hyper::StatusCode;
use serde::Deserialize;

use crate::config::{AppState, SourceKind};
use crate::http::{self, HttpResponse};
use crate::logger;

/// Body of `POST /data`; either angle may be omitted
#[derive(Debug, Deserialize)]
struct PushedAngles {
    #[serde(default)]
    pitch: Option<f64>,
    #[serde(default)]
    roll: Option<f64>,
}

/// `GET /data`
pub fn get_data(state: &AppState) -> HttpResponse {
    http::build_json_response(StatusCode::OK, &state.tracker.reading())
}

/// `POST /data`
pub fn push_data(body: &[u8], state: &AppState) -> HttpResponse {
    if state.config.sensor.source != SourceKind::Push {
        return http::build_json_error(
            StatusCode::CONFLICT,
            "readings come from the on-board sensor; set sensor.source = \"push\" to accept pushed angles",
        );
    }

    let angles: PushedAngles = match serde_json::from_slice(body) {
        Ok(a) => a,
        Err(e) => {
            logger::log_warning(&format!("Rejected pushed reading: {e}"));
            return http::build_json_error(StatusCode::BAD_REQUEST, &format!("malformed JSON: {e}"));
        }
    };

    match state.tracker.ingest_angles(angles.pitch, angles.roll) {
        Ok(change) => {
            if let Some(change) = change {
                logger::log_alert(&change);
            }
            http::build_json_response(StatusCode::OK, &serde_json::json!({ "status": "OK" }))
        }
        Err(e) => {
            logger::log_warning(&format!("Rejected pushed reading: {e}"));
            http::build_json_error(StatusCode::BAD_REQUEST, &e.to_string())
        }
    }
}

/// `GET|POST /calibrate`
pub fn calibrate(state: &AppState) -> HttpResponse {
    if !state.tracker.has_samples() {
        logger::log_warning("Calibrating before the first sample; zero point stays level");
    }
    let (report, change) = state.tracker.calibrate();
    logger::log_calibrated(report.pitch_offset, report.roll_offset);
    if let Some(change) = change {
        logger::log_alert(&change);
    }
    http::build_json_response(StatusCode::OK, &report)
}

/// `DELETE /calibrate`
pub fn reset_calibration(state: &AppState) -> HttpResponse {
    let (report, change) = state.tracker.reset_calibration();
    logger::log_info("[SENSOR] Calibration cleared");
    if let Some(change) = change {
        logger::log_alert(&change);
    }
    http::build_json_response(StatusCode::OK, &report)
}
