//! HTTP routes. Scanning and rendering run on the blocking pool; everything
//! else answers straight from static data

use super::protocol::*;
use super::WebError;
use crate::config::Settings;
use crate::render;
use crate::scan::Scanner;
use crate::symbology::{self, Symbology};
use crate::util;
use crate::ServiceError;
use actix_multipart::Multipart;
use actix_web::http::header;
use actix_web::{get, routes, web, HttpRequest, HttpResponse, Responder};
use futures::TryStreamExt;
use tracing::{debug, info};

type Result<T> = std::result::Result<T, WebError>;

const DEFAULT_SYMBOLOGY: &str = "QRCODE";

const NO_IMAGE: &str =
    "no image uploaded: send a multipart `file` field or a JSON body with an `image` field";

const ENDPOINTS: [(&str, &str); 8] = [
    ("/", "GET - API metadata"),
    ("/health", "GET - health check"),
    ("/supported-types", "GET - supported barcode types"),
    ("/scan", "POST - scan barcodes in an image"),
    ("/api/scan", "POST - scan barcodes in an image"),
    ("/generate", "POST - generate a barcode"),
    ("/api/generate", "POST - generate a barcode"),
    ("/api/supported-types", "GET - supported barcode types"),
];

/// API metadata
#[get("/")]
pub async fn index() -> impl Responder {
    web::Json(IndexResponse {
        message: "Barcode scanning and generation API",
        version: env!("CARGO_PKG_VERSION"),
        endpoints: OrderedMap(ENDPOINTS.to_vec()),
    })
}

/// Liveness check, independent of the scan backends
#[routes]
#[get("/health")]
#[get("/api/health")]
pub async fn health() -> impl Responder {
    web::Json(HealthResponse {
        status: "healthy",
        message: "service is running",
    })
}

/// The barcode types `generate` accepts
#[routes]
#[get("/supported-types")]
#[get("/api/supported-types")]
pub async fn supported_types() -> impl Responder {
    web::Json(SupportedTypesResponse {
        success: true,
        types: OrderedMap(symbology::supported_types()),
    })
}

/// Scan an uploaded image for barcodes. The image is either a multipart
/// file (`file`, or the older `image` field) or base64 in a JSON body
#[routes]
#[post("/scan")]
#[post("/api/scan")]
#[post("/api/scan-barcode")]
pub async fn scan(
    req: HttpRequest,
    payload: web::Payload,
    scanner: web::Data<Scanner>,
    settings: web::Data<Settings>,
) -> Result<HttpResponse> {
    if !scanner.is_available() {
        return Err(ServiceError::ScanUnavailable.into());
    }

    // Parse the input request
    let limit = settings.max_upload_bytes;
    let image = if is_multipart(&req) {
        read_multipart(&req, payload, limit).await?
    } else {
        read_json_image(payload, limit).await?
    };
    debug!("received {} byte image", image.len());

    let symbols = web::block(move || scanner.scan(&image)).await??;

    if symbols.is_empty() {
        info!("no barcode found in image");
        return Ok(HttpResponse::Ok().json(Failure::new("no barcode detected in the image")));
    }

    info!("decoded {} barcode(s)", symbols.len());
    Ok(HttpResponse::Ok().json(ScanResponse::from(symbols)))
}

/// Render a barcode and return it as a PNG data URI
#[routes]
#[post("/generate")]
#[post("/api/generate")]
#[post("/api/generate-barcode")]
pub async fn generate(req: web::Json<GenerateRequest>) -> Result<impl Responder> {
    let req = req.into_inner();

    let content = req.content.as_deref().unwrap_or_default().trim().to_string();
    if content.is_empty() {
        return Err(ServiceError::Validation("content must not be empty".into()).into());
    }

    let symbology: Symbology = req
        .barcode_type
        .as_deref()
        .unwrap_or(DEFAULT_SYMBOLOGY)
        .parse()?;

    let generated = web::block(move || render::render(symbology, &content)).await??;

    info!(
        "generated {symbology} image ({}x{})",
        generated.width, generated.height
    );

    Ok(web::Json(GenerateResponse {
        success: true,
        image_url: util::png_data_uri(&generated.png),
        message: format!("{symbology} generated"),
        kind: symbology.tag(),
    }))
}

fn is_multipart(req: &HttpRequest) -> bool {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map_or(false, |v| v.starts_with("multipart/form-data"))
}

/// Read the image file out of a multipart body. `file` wins over `image`;
/// parts without a filename are form fields and are ignored
async fn read_multipart(req: &HttpRequest, payload: web::Payload, limit: usize) -> Result<Vec<u8>> {
    let mut multipart = Multipart::new(req.headers(), payload);
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut legacy: Option<(String, Vec<u8>)> = None;
    let mut total = 0;

    while let Some(mut field) = multipart.try_next().await? {
        let name = field.name().to_string();
        let filename = field.content_disposition().get_filename().map(str::to_string);

        let mut data = Vec::new();
        while let Some(chunk) = field.try_next().await? {
            total += chunk.len();
            if total > limit {
                return Err(ServiceError::PayloadTooLarge { limit }.into());
            }
            data.extend_from_slice(&chunk);
        }

        let Some(filename) = filename else {
            continue;
        };
        let slot = match name.as_str() {
            "file" => &mut file,
            "image" => &mut legacy,
            _ => continue,
        };
        if slot.is_none() {
            *slot = Some((filename, data));
        }
    }

    match file.or(legacy) {
        Some((filename, _)) if filename.is_empty() => {
            Err(ServiceError::Validation("no file selected".into()).into())
        }
        Some((_, data)) => Ok(data),
        None => Err(ServiceError::Validation(NO_IMAGE.into()).into()),
    }
}

/// Read a `{"image": "<base64>"}` body
async fn read_json_image(mut payload: web::Payload, limit: usize) -> Result<Vec<u8>> {
    let mut body = web::BytesMut::new();
    while let Some(chunk) = payload
        .try_next()
        .await
        .map_err(|e| ServiceError::Validation(format!("failed to read request body: {e}")))?
    {
        if body.len() + chunk.len() > limit {
            return Err(ServiceError::PayloadTooLarge { limit }.into());
        }
        body.extend_from_slice(&chunk);
    }

    if body.is_empty() {
        return Err(ServiceError::Validation(NO_IMAGE.into()).into());
    }

    let request: B64Image = serde_json::from_slice(&body)
        .map_err(|e| ServiceError::Validation(format!("invalid JSON body: {e}")))?;
    debug!("scan request {request:?}");

    match request.image.as_deref().map(str::trim) {
        Some(image) if !image.is_empty() => Ok(util::decode_base64_image(image)?),
        _ => Err(ServiceError::Validation(NO_IMAGE.into()).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::Detector;
    use actix_web::{test, App};
    use base64::{engine::general_purpose, Engine as _};
    use serde_json::{json, Value};

    macro_rules! test_app {
        ($scanner:expr, $settings:expr) => {{
            let settings: Settings = $settings;
            test::init_service(
                App::new()
                    .app_data(web::Data::new($scanner))
                    .app_data(web::Data::new(settings.clone()))
                    .configure(crate::server::configure(settings.max_upload_bytes)),
            )
            .await
        }};
        ($scanner:expr) => {
            test_app!($scanner, Settings::default())
        };
    }

    #[cfg(feature = "qr-scan")]
    fn qr_scanner() -> Scanner {
        Scanner::from_backends(&["qr"]).unwrap()
    }

    fn qr_png(content: &str) -> Vec<u8> {
        render::render(Symbology::QrCode, content).unwrap().png
    }

    fn blank_png() -> Vec<u8> {
        let image = image::GrayImage::from_pixel(50, 50, image::Luma([255]));
        let mut png = Vec::new();
        image
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageOutputFormat::Png)
            .unwrap();
        png
    }

    fn multipart(field: &str, filename: &str, data: &[u8]) -> (String, Vec<u8>) {
        let boundary = "barcode-api-test-boundary";
        let mut body = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: image/png\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
        (format!("multipart/form-data; boundary={boundary}"), body)
    }

    fn empty_scanner() -> Scanner {
        Scanner::new(vec![Box::new(EmptyDetector) as Box<dyn Detector>])
    }

    /// Always finds nothing
    #[derive(Debug)]
    struct EmptyDetector;

    impl Detector for EmptyDetector {
        fn name(&self) -> &'static str {
            "empty"
        }

        fn detect(&self, _image: &image::GrayImage) -> anyhow::Result<Vec<crate::scan::Symbol>> {
            Ok(vec![])
        }
    }

    #[actix_web::test]
    async fn test_health() {
        // healthy even when scanning is unavailable
        let app = test_app!(Scanner::default());
        for uri in ["/health", "/api/health"] {
            let req = test::TestRequest::get().uri(uri).to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), 200);
            let body: Value = test::read_body_json(resp).await;
            assert_eq!(body["status"], "healthy");
        }
    }

    #[actix_web::test]
    async fn test_index() {
        let app = test_app!(Scanner::default());
        let req = test::TestRequest::get().uri("/").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(body["endpoints"]["/scan"], "POST - scan barcodes in an image");
    }

    #[actix_web::test]
    async fn test_supported_types() {
        let app = test_app!(Scanner::default());
        let req = test::TestRequest::get().uri("/supported-types").to_request();
        let body = test::call_and_read_body(&app, req).await;
        assert_eq!(
            std::str::from_utf8(&body).unwrap(),
            r#"{"success":true,"types":{"QRCODE":"QR Code","CODE128":"Code 128","CODE39":"Code 39","EAN13":"EAN-13","EAN8":"EAN-8","UPC-A":"UPC-A"}}"#
        );
    }

    #[actix_web::test]
    async fn test_generate_qr() {
        let app = test_app!(Scanner::default());
        let req = test::TestRequest::post()
            .uri("/generate")
            .set_json(json!({"content": "hello"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["type"], "QRCODE");

        let url = body["image_url"].as_str().unwrap();
        let png = general_purpose::STANDARD
            .decode(url.strip_prefix("data:image/png;base64,").unwrap())
            .unwrap();
        assert_eq!(png, qr_png("hello"));
    }

    #[actix_web::test]
    async fn test_generate_legacy_fields() {
        let app = test_app!(Scanner::default());
        let current = test::TestRequest::post()
            .uri("/api/generate")
            .set_json(json!({"content": "590123412345", "barcode_type": "ean13"}))
            .to_request();
        let current: Value = test::call_and_read_body_json(&app, current).await;

        let legacy = test::TestRequest::post()
            .uri("/api/generate-barcode")
            .set_json(json!({"text": "590123412345", "type": "EAN13"}))
            .to_request();
        let legacy: Value = test::call_and_read_body_json(&app, legacy).await;

        assert_eq!(current["success"], true);
        assert_eq!(current["type"], "EAN13");
        assert_eq!(current["image_url"], legacy["image_url"]);
    }

    #[actix_web::test]
    async fn test_generate_failures() {
        let app = test_app!(Scanner::default());
        let cases = [
            (json!({"content": "abc", "barcode_type": "FOOBAR"}), 400, "FOOBAR"),
            (json!({"content": "12345", "barcode_type": "EAN13"}), 422, "generation failed"),
            (json!({"content": "   "}), 400, "content"),
            (json!({"barcode_type": "CODE128"}), 400, "content"),
        ];
        for (request, status, needle) in cases {
            let req = test::TestRequest::post()
                .uri("/generate")
                .set_json(&request)
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), status, "{request}");
            let body: Value = test::read_body_json(resp).await;
            assert_eq!(body["success"], false);
            assert!(body["message"].as_str().unwrap().contains(needle), "{body}");
        }
    }

    #[actix_web::test]
    async fn test_generate_malformed_json() {
        let app = test_app!(Scanner::default());
        let req = test::TestRequest::post()
            .uri("/generate")
            .insert_header(header::ContentType::json())
            .set_payload("{not json")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], false);
    }

    #[actix_web::test]
    async fn test_scan_unavailable() {
        let app = test_app!(Scanner::default());
        let req = test::TestRequest::post()
            .uri("/scan")
            .set_json(json!({"image": general_purpose::STANDARD.encode(blank_png())}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 503);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], false);
        assert!(body["message"].as_str().unwrap().contains("scan_backends"));
    }

    #[actix_web::test]
    async fn test_scan_missing_image() {
        let app = test_app!(empty_scanner());
        for request in [json!({}), json!({"image": ""}), json!({"other": 1})] {
            let req = test::TestRequest::post()
                .uri("/scan")
                .set_json(&request)
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), 400);
            let body: Value = test::read_body_json(resp).await;
            assert_eq!(body["success"], false);
        }

        let req = test::TestRequest::post().uri("/scan").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
    }

    #[actix_web::test]
    async fn test_scan_invalid_image() {
        let app = test_app!(empty_scanner());
        for image in ["%%%not base64%%%", "data:image/png;base64,QUJD"] {
            let req = test::TestRequest::post()
                .uri("/api/scan")
                .set_json(json!({ "image": image }))
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), 400);
            let body: Value = test::read_body_json(resp).await;
            assert!(body["message"].as_str().unwrap().starts_with("invalid image"));
        }
    }

    #[actix_web::test]
    async fn test_scan_image_too_wide() {
        let app = test_app!(empty_scanner().with_max_dimension(16));
        let req = test::TestRequest::post()
            .uri("/scan")
            .set_json(json!({"image": general_purpose::STANDARD.encode(blank_png())}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
        let body: Value = test::read_body_json(resp).await;
        assert!(body["message"].as_str().unwrap().starts_with("invalid image"));
    }

    #[actix_web::test]
    async fn test_scan_nothing_found() {
        let app = test_app!(empty_scanner());
        let req = test::TestRequest::post()
            .uri("/scan")
            .set_json(json!({"image": general_purpose::STANDARD.encode(blank_png())}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], false);
        assert!(body["message"].as_str().unwrap().contains("no barcode"));
    }

    #[actix_web::test]
    async fn test_scan_too_large() {
        let settings = Settings {
            max_upload_bytes: 64,
            ..Settings::default()
        };
        let app = test_app!(empty_scanner(), settings);
        let req = test::TestRequest::post()
            .uri("/scan")
            .set_json(json!({"image": "A".repeat(1000)}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 413);
    }

    #[cfg(feature = "qr-scan")]
    #[actix_web::test]
    async fn test_scan_base64_with_and_without_prefix() {
        let app = test_app!(qr_scanner());
        let encoded = general_purpose::STANDARD.encode(qr_png("round trip"));

        let mut bodies = vec![];
        for image in [encoded.clone(), format!("data:image/png;base64,{encoded}")] {
            let req = test::TestRequest::post()
                .uri("/scan")
                .set_json(json!({ "image": image }))
                .to_request();
            let body: Value = test::call_and_read_body_json(&app, req).await;
            assert_eq!(body["success"], true);
            assert_eq!(body["count"], 1);
            assert_eq!(body["results"][0]["type"], "QRCODE");
            assert_eq!(body["results"][0]["data"], "round trip");
            bodies.push(body);
        }
        assert_eq!(bodies[0], bodies[1]);
    }

    #[cfg(feature = "qr-scan")]
    #[actix_web::test]
    async fn test_scan_multipart() {
        let app = test_app!(qr_scanner());
        for field in ["file", "image"] {
            let (content_type, body) = multipart(field, "code.png", &qr_png("uploaded"));
            let req = test::TestRequest::post()
                .uri("/scan")
                .insert_header((header::CONTENT_TYPE, content_type))
                .set_payload(body)
                .to_request();
            let body: Value = test::call_and_read_body_json(&app, req).await;
            assert_eq!(body["success"], true, "{field}");
            assert_eq!(body["results"][0]["data"], "uploaded");
            assert_eq!(body["results"][0]["points"].as_array().unwrap().len(), 4);
        }
    }

    #[actix_web::test]
    async fn test_scan_multipart_wrong_field() {
        let app = test_app!(empty_scanner());
        let (content_type, body) = multipart("upload", "code.png", &blank_png());
        let req = test::TestRequest::post()
            .uri("/scan")
            .insert_header((header::CONTENT_TYPE, content_type))
            .set_payload(body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
    }
}
