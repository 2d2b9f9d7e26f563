//! The user-facing JSON web server. Scan and generate requests are validated
//! here, handed to `scan` and `render`, and every failure is turned into a
//! `{success: false, message}` body

use crate::ServiceError;
use actix_web::error::{BlockingError, JsonPayloadError};
use actix_web::http::header::ContentType;
use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse};
use anyhow::anyhow;
use tracing::{error, warn};

pub mod protocol;
pub mod routes;

#[derive(Debug)]
pub struct WebError {
    err: ServiceError,
}

impl WebError {
    pub fn inner(&self) -> &ServiceError {
        &self.err
    }
}

impl std::fmt::Display for WebError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.err)
    }
}

impl actix_web::error::ResponseError for WebError {
    fn error_response(&self) -> HttpResponse {
        if self.status_code().is_server_error() {
            error!("request failed: {}", self.err);
        } else {
            warn!("request rejected: {}", self.err);
        }

        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .json(protocol::Failure::new(self.to_string()))
    }

    fn status_code(&self) -> StatusCode {
        match self.err {
            ServiceError::Validation(_)
            | ServiceError::InvalidImage(_)
            | ServiceError::UnsupportedSymbology(_) => StatusCode::BAD_REQUEST,
            ServiceError::Render(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ServiceError::ScanUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ServiceError> for WebError {
    fn from(err: ServiceError) -> WebError {
        WebError { err }
    }
}

impl From<anyhow::Error> for WebError {
    fn from(err: anyhow::Error) -> WebError {
        WebError {
            err: ServiceError::Internal(err),
        }
    }
}

impl From<base64::DecodeError> for WebError {
    fn from(err: base64::DecodeError) -> Self {
        WebError { err: err.into() }
    }
}

impl From<BlockingError> for WebError {
    fn from(err: BlockingError) -> Self {
        WebError {
            err: ServiceError::Internal(anyhow!(err.to_string())),
        }
    }
}

impl From<actix_multipart::MultipartError> for WebError {
    fn from(err: actix_multipart::MultipartError) -> Self {
        WebError {
            err: ServiceError::Validation(format!("malformed multipart body: {err}")),
        }
    }
}

/// Body limit and error conversion for JSON request bodies
pub fn json_config(limit: usize) -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(limit)
        .error_handler(move |err, _req: &HttpRequest| {
            let err = match err {
                JsonPayloadError::OverflowKnownLength { .. } | JsonPayloadError::Overflow { .. } => {
                    ServiceError::PayloadTooLarge { limit }
                }
                other => ServiceError::Validation(format!("invalid JSON body: {other}")),
            };
            WebError::from(err).into()
        })
}

/// Register every route, with request bodies capped at `limit` bytes
pub fn configure(limit: usize) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg: &mut web::ServiceConfig| {
        cfg.app_data(json_config(limit))
            .service(routes::index)
            .service(routes::health)
            .service(routes::supported_types)
            .service(routes::scan)
            .service(routes::generate);
    }
}
