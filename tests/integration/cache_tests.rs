//! Result cache semantics: hits, canonical-key sharing, pass-through mode.

use super::test_utils::build_fixture;

#[tokio::test]
async fn test_second_request_hits_cache() {
    let fixture = build_fixture();
    let service = fixture.service_with_cache();

    let first = service.get_data("RM009:imgxy:0:0:2,4,8").await.unwrap();
    assert!(!first.cache_hit);

    let second = service.get_data("RM009:imgxy:0:0:2,4,8").await.unwrap();
    assert!(second.cache_hit);
    assert_eq!(first.bytes, second.bytes);
    assert_eq!(first.content_type, second.content_type);
}

#[tokio::test]
async fn test_cache_key_is_canonicalized() {
    let fixture = build_fixture();
    let service = fixture.service_with_cache();

    // Default encoding spelled out or omitted addresses the same entry
    let implied = service.get_data("RM009:imgxy:0:0:2,4,8").await.unwrap();
    assert!(!implied.cache_hit);

    let spelled = service.get_data("RM009:imgxy-raw:0:0:2,4,8").await.unwrap();
    assert!(spelled.cache_hit);
    assert_eq!(implied.bytes, spelled.bytes);
}

#[tokio::test]
async fn test_different_identifiers_are_distinct_entries() {
    let fixture = build_fixture();
    let service = fixture.service_with_cache();

    service.get_data("RM009:imgxy:0:0:2,4,8").await.unwrap();
    let other = service.get_data("RM009:imgxy:0:1:2,4,8").await.unwrap();
    assert!(!other.cache_hit);

    let encoded = service
        .get_data("RM009:imgxy-zstd_sqrt_v1:0:0:2,4,8")
        .await
        .unwrap();
    assert!(!encoded.cache_hit);
}

#[tokio::test]
async fn test_disabled_cache_is_pass_through() {
    let fixture = build_fixture();
    let service = fixture.service();
    assert!(!service.cache_enabled());
    assert!(service.cache_stats().await.is_none());

    for _ in 0..3 {
        let response = service.get_data("RM009:imgxy:0:0:2,4,8").await.unwrap();
        assert!(!response.cache_hit);
    }
}

#[tokio::test]
async fn test_failed_requests_are_not_cached() {
    let fixture = build_fixture();
    let service = fixture.service_with_cache();

    let id = "RM009:imgxy:0:0:999999999,0,0";
    assert!(service.get_data(id).await.is_err());
    assert_eq!(service.cache_stats().await.unwrap().2, 0);

    // A failed lookup never turns into cached empty data
    assert!(service.get_data(id).await.is_err());
}

#[tokio::test]
async fn test_flush_clears_cached_results() {
    let fixture = build_fixture();
    let service = fixture.service_with_cache();

    service.get_data("RM009:imgxy:0:0:2,4,8").await.unwrap();
    assert_eq!(service.cache_stats().await.unwrap().2, 1);

    service.flush().await;
    assert_eq!(service.cache_stats().await.unwrap().2, 0);

    let after = service.get_data("RM009:imgxy:0:0:2,4,8").await.unwrap();
    assert!(!after.cache_hit);
}

#[tokio::test]
async fn test_mesh_payloads_are_cached_too() {
    let fixture = build_fixture();
    let service = fixture.service_with_cache();

    let first = service.get_data("RM009:meh3d:::v1").await.unwrap();
    assert!(!first.cache_hit);
    let second = service.get_data("RM009:meh3d:::v1").await.unwrap();
    assert!(second.cache_hit);
    assert_eq!(first.bytes, second.bytes);
}
