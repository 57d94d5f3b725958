//! HTTP boundary tests: endpoint wiring, status mapping, headers.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use neuro_streamer::server::{create_router, RouterConfig};

use super::test_utils::{build_fixture, u16_samples, Fixture, TILE};

fn router_over(fixture: &Fixture, cached: bool) -> Router {
    let service = if cached {
        fixture.service_with_cache()
    } else {
        fixture.service()
    };
    create_router(Arc::new(service), RouterConfig::new().with_tracing(false))
}

async fn get(router: Router, uri: &str) -> (StatusCode, axum::http::HeaderMap, bytes::Bytes) {
    let response = router
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, headers, body)
}

#[tokio::test]
async fn test_health() {
    let fixture = build_fixture();
    let (status, _, body) = get(router_over(&fixture, false), "/health").await;
    assert_eq!(status, StatusCode::OK);

    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_specimens_metadata_listing() {
    let fixture = build_fixture();
    let (status, _, body) = get(router_over(&fixture, false), "/metadata?type=specimens").await;
    assert_eq!(status, StatusCode::OK);

    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let entry = &json["RM009"];
    assert_eq!(entry["name"], "Macaque brain RM009");
    // The listing is the document verbatim, including dataset geometry
    assert_eq!(entry["image"]["main"]["tile_size_2d"][0], TILE);
    // The malformed entry was skipped at load
    assert!(json.get("BROKEN").is_none());
}

#[tokio::test]
async fn test_regions_metadata() {
    let fixture = build_fixture();
    let (status, _, body) = get(
        router_over(&fixture, false),
        "/metadata?type=regions&specimen=RM009",
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["regions"][0]["name"], "v1");
    assert_eq!(json["metadata"]["total_regions"], 2);
}

#[tokio::test]
async fn test_regions_metadata_requires_specimen_param() {
    let fixture = build_fixture();
    let (status, _, _) = get(router_over(&fixture, false), "/metadata?type=regions").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_regions_metadata_unknown_specimen() {
    let fixture = build_fixture();
    let (status, _, _) = get(
        router_over(&fixture, false),
        "/metadata?type=regions&specimen=NOPE",
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unsupported_metadata_type() {
    let fixture = build_fixture();
    let (status, _, body) = get(router_over(&fixture, false), "/metadata?type=favorites").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "unsupported_metadata_type");
}

#[tokio::test]
async fn test_data_raw_tile() {
    let fixture = build_fixture();
    let (status, headers, body) =
        get(router_over(&fixture, false), "/data/RM009:imgxy:0:0:2,4,8").await;
    assert_eq!(status, StatusCode::OK);

    let content_type = headers.get("content-type").unwrap().to_str().unwrap();
    assert!(content_type.starts_with("application/octet-stream"));
    assert!(content_type.contains("layout=row-major"));
    assert!(headers.contains_key("cache-control"));
    assert_eq!(headers.get("x-cache").unwrap(), "miss");

    assert_eq!(u16_samples(&body).len(), TILE * TILE);
}

#[tokio::test]
async fn test_data_mesh_obj() {
    let fixture = build_fixture();
    let (status, headers, body) =
        get(router_over(&fixture, false), "/data/RM009:meh3d:::v1").await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/plain"));
    assert!(body.starts_with(b"v "));
}

#[tokio::test]
async fn test_data_cache_hit_header() {
    let fixture = build_fixture();
    let router = router_over(&fixture, true);

    let (status, headers, _) = get(router.clone(), "/data/RM009:imgxy:0:0:2,4,8").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get("x-cache").unwrap(), "miss");

    let (status, headers, _) = get(router, "/data/RM009:imgxy:0:0:2,4,8").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get("x-cache").unwrap(), "hit");
}

#[tokio::test]
async fn test_data_malformed_identifier_is_400() {
    let fixture = build_fixture();
    let router = router_over(&fixture, false);

    for (uri, code) in [
        ("/data/RM009:imgxy:0:0", "malformed_identifier"),
        ("/data/RM009:imgxy:0:0:a,b,c", "malformed_identifier"),
        ("/data/RM009:imgxy::0:0,0,0", "missing_field"),
        ("/data/RM009:imgxy-bogus:0:0:0,0,0", "unsupported_combination"),
    ] {
        let (status, _, body) = get(router.clone(), uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], code, "{}", uri);
    }
}

#[tokio::test]
async fn test_data_unknown_specimen_is_404() {
    let fixture = build_fixture();
    let (status, _, body) = get(
        router_over(&fixture, false),
        "/data/UNKNOWN:imgxy:0:0:0,0,0",
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "unknown_specimen");
}

#[tokio::test]
async fn test_data_out_of_volume_is_404() {
    let fixture = build_fixture();
    let (status, _, body) = get(
        router_over(&fixture, false),
        "/data/RM009:imgxy:0:0:999999999,0,0",
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "not_found");
}

#[tokio::test]
async fn test_data_storage_failure_is_500() {
    let fixture = build_fixture();

    // Break the mesh dataset on disk after metadata load: the region is
    // still declared, so resolution succeeds and the read fails
    std::fs::remove_file(
        fixture
            .data_root
            .join("RM009")
            .join("meshes")
            .join("v1.obj"),
    )
    .unwrap();

    let (status, _, body) = get(router_over(&fixture, false), "/data/RM009:meh3d:::v1").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "storage_failure");
}
