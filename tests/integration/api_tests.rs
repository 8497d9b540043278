//! API integration tests for upload, transform and fetch.
//!
//! Tests verify:
//! - Each operation family end to end through `POST /process`
//! - Artifact download headers and content
//! - Error cases (non-image, bad parameters, missing parts, oversize)
//! - HTTP response codes and JSON error bodies

use axum::http::StatusCode;
use image::ImageFormat;

use fleeting::RouterConfig;

use super::test_utils::{
    body_bytes, body_json, decode, multipart_body, noisy_png, process_request, product_shot_png,
    push_file_part, quadrant_png, solid_png, CountingEngine, TestApp, BLUE, BOUNDARY, GREEN, RED,
    WHITE,
};

// =============================================================================
// Successful Transforms
// =============================================================================

#[tokio::test]
async fn test_rotate_90_clockwise_corner_check() {
    let app = TestApp::new();

    let response = app
        .upload(&quadrant_png(100), &[("operation", "rotate"), ("degrees", "90")])
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["operation"], "rotate");
    assert_eq!(json["mediaType"], "image/png");
    assert_eq!(json["width"], 100);
    assert_eq!(json["height"], 100);

    let url = json["url"].as_str().unwrap();
    let response = app.get(url).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("content-type").unwrap(), "image/png");

    let output = body_bytes(response).await;
    assert_eq!(image::guess_format(&output).unwrap(), ImageFormat::Png);

    let img = decode(&output);
    assert_eq!(img.dimensions(), (100, 100));
    // Clockwise: the bottom-left quadrant moves to the top-left
    assert_eq!(*img.get_pixel(5, 5), WHITE);
    assert_eq!(*img.get_pixel(94, 5), RED);
    assert_eq!(*img.get_pixel(94, 94), GREEN);
    assert_eq!(*img.get_pixel(5, 94), BLUE);
}

#[tokio::test]
async fn test_rotate_negative_degrees_normalised() {
    let app = TestApp::new();

    let response = app
        .upload(&quadrant_png(40), &[("operation", "rotate"), ("degrees", "-90")])
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let img = decode(&body_bytes(app.get(json["url"].as_str().unwrap()).await).await);
    // Counter-clockwise: the top-right quadrant moves to the top-left
    assert_eq!(*img.get_pixel(2, 2), GREEN);
}

#[tokio::test]
async fn test_default_operation_removes_background() {
    let app = TestApp::new();

    let response = app.upload(&product_shot_png(40), &[]).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["operation"], "remove-background");
    assert_eq!(json["mediaType"], "image/png");

    let img = decode(&body_bytes(app.get(json["url"].as_str().unwrap()).await).await);
    assert_eq!(img.get_pixel(0, 0)[3], 0);
    assert_eq!(img.get_pixel(20, 20)[3], 255);
}

#[tokio::test]
async fn test_reencode_to_jpeg() {
    let app = TestApp::new();

    let response = app
        .upload(
            &solid_png(16, 16, RED),
            &[("operation", "reencode"), ("format", "jpeg")],
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["mediaType"], "image/jpeg");

    let response = app.get(json["url"].as_str().unwrap()).await;
    assert_eq!(response.headers().get("content-type").unwrap(), "image/jpeg");
    let output = body_bytes(response).await;
    assert_eq!(image::guess_format(&output).unwrap(), ImageFormat::Jpeg);
}

#[tokio::test]
async fn test_resize_hd_alias() {
    let app = TestApp::new();

    let response = app
        .upload(&solid_png(64, 32, GREEN), &[("operation", "hd")])
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["operation"], "resize");
    assert_eq!(json["width"], 1920);
    assert_eq!(json["height"], 960);
}

#[tokio::test]
async fn test_crop_inside_bounds() {
    let app = TestApp::new();

    let response = app
        .upload(
            &quadrant_png(40),
            &[
                ("operation", "crop"),
                ("x", "20"),
                ("y", "0"),
                ("width", "20"),
                ("height", "20"),
            ],
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let img = decode(&body_bytes(app.get(json["url"].as_str().unwrap()).await).await);
    assert_eq!(img.dimensions(), (20, 20));
    assert_eq!(*img.get_pixel(10, 10), GREEN);
}

#[tokio::test]
async fn test_compress_defaults_to_jpeg() {
    let app = TestApp::new();

    let response = app
        .upload(&solid_png(32, 32, BLUE), &[("operation", "compress")])
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["mediaType"], "image/jpeg");
}

#[tokio::test]
async fn test_file_part_under_other_name() {
    let app = TestApp::new();

    let mut body = multipart_body(None, &[("operation", "flip"), ("direction", "vertical")]);
    // Drop the closing delimiter, add a file part, close again
    body.truncate(body.len() - format!("--{}--\r\n", BOUNDARY).len());
    push_file_part(&mut body, "photo", "photo.png", &quadrant_png(20));
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    let response = app.send(process_request(body)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

// =============================================================================
// Artifact Download
// =============================================================================

#[tokio::test]
async fn test_artifact_headers() {
    let app = TestApp::new();

    let json = body_json(
        app.upload(&solid_png(8, 8, RED), &[("operation", "flip"), ("direction", "h")])
            .await,
    )
    .await;
    let expires_at = json["expiresAt"].as_u64().unwrap();

    let response = app.get(json["url"].as_str().unwrap()).await;
    assert_eq!(response.status(), StatusCode::OK);

    let headers = response.headers();
    assert_eq!(headers.get("cache-control").unwrap(), "no-store");
    let header_expiry: u64 = headers
        .get("x-artifact-expires-at")
        .unwrap()
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert_eq!(header_expiry, expires_at);
}

#[tokio::test]
async fn test_response_never_leaks_paths() {
    let app = TestApp::new();

    let response = app
        .upload(&solid_png(8, 8, RED), &[("operation", "rotate"), ("degrees", "180")])
        .await;
    let body = body_bytes(response).await;
    let text = String::from_utf8(body.to_vec()).unwrap();

    assert!(!text.contains(app.dir.path().to_str().unwrap()));
    assert!(!text.contains("_output"));
}

#[tokio::test]
async fn test_unknown_reference_404() {
    let app = TestApp::new();

    let response = app
        .get("/artifacts/00000000-0000-4000-8000-000000000000")
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = body_json(response).await;
    assert_eq!(json["error"], "not_found");
    assert_eq!(json["status"], 404);
}

#[tokio::test]
async fn test_malformed_reference_404() {
    let app = TestApp::new();

    for uri in ["/artifacts/not-a-uuid", "/artifacts/..%2F..%2Fetc%2Fpasswd"] {
        let response = app.get(uri).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "uri: {}", uri);
    }
}

#[tokio::test]
async fn test_input_reference_is_fetchable() {
    let app = TestApp::new();
    let upload = solid_png(8, 8, GREEN);

    let json = body_json(
        app.upload(&upload, &[("operation", "rotate"), ("degrees", "90")])
            .await,
    )
    .await;
    assert_eq!(app.store.len().await, 2);

    // Every live artifact is addressable by id; find the input one
    let output_ref = json["resultRef"].as_str().unwrap();
    let mut found_input = false;
    let mut entries = tokio::fs::read_dir(app.dir.path()).await.unwrap();
    while let Some(entry) = entries.next_entry().await.unwrap() {
        let name = entry.file_name().into_string().unwrap();
        if let Some(id) = name.strip_suffix("_input") {
            assert_ne!(id, output_ref);
            let response = app.get(&format!("/artifacts/{}", id)).await;
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(body_bytes(response).await.as_ref(), upload.as_slice());
            found_input = true;
        }
    }
    assert!(found_input);
}

// =============================================================================
// Rejections
// =============================================================================

#[tokio::test]
async fn test_non_image_upload_creates_nothing() {
    let engine = CountingEngine::default();
    let app = TestApp::with_engine(engine.clone());

    let response = app
        .upload(b"%PDF-1.7 definitely not an image", &[("operation", "rotate"), ("degrees", "90")])
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "invalid_input");

    assert_eq!(engine.calls(), 0);
    assert_eq!(app.file_count().await, 0);
    assert_eq!(app.store.pending_deletions(), 0);
}

#[tokio::test]
async fn test_truncated_image_creates_nothing() {
    let engine = CountingEngine::default();
    let app = TestApp::with_engine(engine.clone());

    let png = noisy_png(64);
    let response = app
        .upload(&png[..png.len() / 2], &[("operation", "rotate"), ("degrees", "90")])
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "invalid_input");

    assert_eq!(engine.calls(), 0);
    assert_eq!(app.file_count().await, 0);
    assert_eq!(app.store.pending_deletions(), 0);
}

#[tokio::test]
async fn test_oversized_upscale_creates_nothing() {
    let app = TestApp::new();

    let response = app
        .upload(
            &solid_png(1, 1, RED),
            &[("operation", "resize"), ("width", "8192"), ("height", "8192")],
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "invalid_parameters");
    assert_eq!(app.file_count().await, 0);
}

#[tokio::test]
async fn test_crop_out_of_bounds_creates_nothing() {
    let engine = CountingEngine::default();
    let app = TestApp::with_engine(engine.clone());

    let response = app
        .upload(
            &solid_png(50, 50, RED),
            &[
                ("operation", "crop"),
                ("x", "40"),
                ("y", "40"),
                ("width", "20"),
                ("height", "20"),
            ],
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "invalid_parameters");

    assert_eq!(engine.calls(), 0);
    assert_eq!(app.file_count().await, 0);
}

#[tokio::test]
async fn test_parameter_errors() {
    let app = TestApp::new();
    let png = solid_png(10, 10, RED);

    let cases: &[&[(&str, &str)]] = &[
        &[("operation", "sepia")],
        &[("operation", "rotate"), ("degrees", "45")],
        &[("operation", "rotate")],
        &[("operation", "flip"), ("direction", "diagonal")],
        &[("operation", "compress"), ("quality", "0")],
        &[("operation", "resize"), ("width", "100000")],
        &[("operation", "reencode"), ("format", "tiff")],
        &[("operation", "remove-background"), ("format", "jpeg")],
    ];

    for fields in cases {
        let response = app.upload(&png, fields).await;
        assert_eq!(
            response.status(),
            StatusCode::BAD_REQUEST,
            "fields: {:?}",
            fields
        );
        assert_eq!(body_json(response).await["error"], "invalid_parameters");
    }

    assert_eq!(app.file_count().await, 0);
}

#[tokio::test]
async fn test_missing_image_part() {
    let app = TestApp::new();

    let response = app
        .send(process_request(multipart_body(None, &[("operation", "rotate")])))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "invalid_input");
}

#[tokio::test]
async fn test_two_image_parts_rejected() {
    let app = TestApp::new();

    let mut body = multipart_body(Some(solid_png(4, 4, RED).as_slice()), &[]);
    body.truncate(body.len() - format!("--{}--\r\n", BOUNDARY).len());
    push_file_part(&mut body, "second", "second.png", &solid_png(4, 4, GREEN));
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    let response = app.send(process_request(body)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.file_count().await, 0);
}

#[tokio::test]
async fn test_upload_too_large() {
    let app = TestApp::with_router_config(
        RouterConfig::new()
            .with_tracing(false)
            .with_max_upload_bytes(1024),
    );

    let response = app.upload(&vec![0u8; 64 * 1024], &[]).await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body_json(response).await["error"], "upload_too_large");
    assert_eq!(app.file_count().await, 0);
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new();

    let response = app.get("/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}
