//! End-to-end identifier resolution: extraction plus encoding for all three
//! modalities, including the scenario catalogue from the service contract.

use neuro_streamer::error::{DataError, ExtractError, ParseError};

use super::test_utils::{
    build_fixture, image_voxel, isqrt, mask_voxel, octahedron_obj, u16_samples, TILE,
};

// =============================================================================
// Image Tiles
// =============================================================================

#[tokio::test]
async fn test_coronal_raw_tile_values() {
    let fixture = build_fixture();
    let service = fixture.service();

    let response = service.get_data("RM009:imgxy:0:0:2,4,8").await.unwrap();
    assert!(response.content_type.contains("dtype=uint16"));
    assert!(response.content_type.contains("shape=4x4"));

    let samples = u16_samples(&response.bytes);
    assert_eq!(samples.len(), TILE * TILE);
    for r in 0..TILE as u64 {
        for c in 0..TILE as u64 {
            // Coronal tiles are flipped on both in-plane axes
            let expected = image_voxel(0, 0, 2, 4 + 3 - r, 8 + 3 - c);
            assert_eq!(samples[(r * 4 + c) as usize], expected, "at ({}, {})", r, c);
        }
    }
}

#[tokio::test]
async fn test_sagittal_raw_tile_values() {
    let fixture = build_fixture();
    let service = fixture.service();

    let response = service.get_data("RM009:imgyz:0:1:2,4,8").await.unwrap();
    let samples = u16_samples(&response.bytes);
    assert_eq!(samples.len(), TILE * TILE);
    for r in 0..TILE as u64 {
        for c in 0..TILE as u64 {
            // Sagittal: width runs along z, height along y (flipped)
            let expected = image_voxel(0, 1, 2 + c, 4 + 3 - r, 8);
            assert_eq!(samples[(r * 4 + c) as usize], expected, "at ({}, {})", r, c);
        }
    }
}

#[tokio::test]
async fn test_horizontal_raw_tile_values() {
    let fixture = build_fixture();
    let service = fixture.service();

    let response = service.get_data("RM009:imgxz:0:0:2,4,8").await.unwrap();
    let samples = u16_samples(&response.bytes);
    for r in 0..TILE as u64 {
        for c in 0..TILE as u64 {
            let expected = image_voxel(0, 0, 2 + 3 - r, 4, 8 + 3 - c);
            assert_eq!(samples[(r * 4 + c) as usize], expected, "at ({}, {})", r, c);
        }
    }
}

#[tokio::test]
async fn test_level_1_tile_reads_second_pyramid_level() {
    let fixture = build_fixture();
    let service = fixture.service();

    let response = service.get_data("RM009:imgxy:1:0:0,0,0").await.unwrap();
    let samples = u16_samples(&response.bytes);
    assert_eq!(samples[15], image_voxel(1, 0, 0, 0, 0));
    assert_eq!(samples[0], image_voxel(1, 0, 0, 3, 3));
}

#[tokio::test]
async fn test_tile_partially_outside_is_clipped() {
    let fixture = build_fixture();
    let service = fixture.service();

    // y and x ranges hang off the far edge: 14..18 clips to 14..16
    let response = service.get_data("RM009:imgxy:0:0:0,14,14").await.unwrap();
    assert!(response.content_type.contains("shape=2x2"));
    let samples = u16_samples(&response.bytes);
    assert_eq!(samples.len(), 4);
    assert_eq!(samples[0], image_voxel(0, 0, 0, 15, 15));
}

#[tokio::test]
async fn test_origin_far_outside_is_not_found() {
    let fixture = build_fixture();
    let service = fixture.service();

    // Scenario: origin far outside the volume -> not-found, not a crash
    let err = service
        .get_data("RM009:imgxy:0:0:999999999,0,0")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DataError::Extract(ExtractError::NotFound { .. })
    ));

    let err = service.get_data("RM009:imgxy:0:0:-50,0,0").await.unwrap_err();
    assert!(matches!(
        err,
        DataError::Extract(ExtractError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_unknown_specimen_rejected_before_extraction() {
    let fixture = build_fixture();
    let service = fixture.service();

    let err = service.get_data("UNKNOWN:imgxy:0:0:0,0,0").await.unwrap_err();
    assert!(matches!(
        err,
        DataError::Parse(ParseError::UnknownSpecimen { .. })
    ));
}

// =============================================================================
// Mask Tiles
// =============================================================================

#[tokio::test]
async fn test_mask_raw_tile_from_stack_container() {
    let fixture = build_fixture();
    let service = fixture.service();

    let response = service.get_data("RM009:mskxy:0:0:3,4,8").await.unwrap();
    let samples = u16_samples(&response.bytes);
    for r in 0..TILE as u64 {
        for c in 0..TILE as u64 {
            let expected = mask_voxel(3, 4 + 3 - r, 8 + 3 - c);
            assert_eq!(samples[(r * 4 + c) as usize], expected);
        }
    }
}

#[tokio::test]
async fn test_mask_png_encoding() {
    let fixture = build_fixture();
    let service = fixture.service();

    let response = service.get_data("RM009:mskxy-png:0:0:3,4,8").await.unwrap();
    assert_eq!(response.content_type, "image/png");
    assert_eq!(&response.bytes[..4], &[0x89, b'P', b'N', b'G']);
}

#[tokio::test]
async fn test_mask_view_not_declared_is_unsupported() {
    let fixture = build_fixture();
    let service = fixture.service();

    let err = service.get_data("RM009:mskyz:0:0:0,0,0").await.unwrap_err();
    assert!(matches!(
        err,
        DataError::Parse(ParseError::UnsupportedCombination {
            field: "view_type",
            ..
        })
    ));
}

// =============================================================================
// Encodings
// =============================================================================

#[tokio::test]
async fn test_zstd_sqrt_encoding_matches_quantization() {
    let fixture = build_fixture();
    let service = fixture.service();

    let raw = service.get_data("RM009:imgxy:0:0:2,4,8").await.unwrap();
    let compressed = service
        .get_data("RM009:imgxy-zstd_sqrt_v1:0:0:2,4,8")
        .await
        .unwrap();
    assert!(compressed
        .content_type
        .starts_with("application/x-sqrt-zstd"));

    let decompressed = zstd::decode_all(&compressed.bytes[..]).unwrap();
    let expected: Vec<u8> = u16_samples(&raw.bytes)
        .iter()
        .map(|&v| isqrt(u32::from(v)) as u8)
        .collect();
    assert_eq!(decompressed, expected);
}

#[tokio::test]
async fn test_textr_encoding_packs_high_bytes() {
    let fixture = build_fixture();
    let service = fixture.service();

    let raw = service.get_data("RM009:imgxy:0:0:2,4,8").await.unwrap();
    let textr = service
        .get_data("RM009:imgxy-textr:0:0:2,4,8")
        .await
        .unwrap();
    assert!(textr.content_type.contains("format=r8"));

    let expected: Vec<u8> = u16_samples(&raw.bytes).iter().map(|v| (v >> 8) as u8).collect();
    assert_eq!(&textr.bytes[..], &expected[..]);
}

#[tokio::test]
async fn test_jpg_encoding_is_valid_jpeg() {
    let fixture = build_fixture();
    let service = fixture.service();

    let response = service.get_data("RM009:imgxy-jpg:0:0:2,4,8").await.unwrap();
    assert_eq!(response.content_type, "image/jpeg");
    assert_eq!(&response.bytes[..2], &[0xFF, 0xD8]);
}

#[tokio::test]
async fn test_undeclared_encoding_rejected_by_parser() {
    let fixture = build_fixture();
    let service = fixture.service();

    // png is declared for masks but not for images
    let err = service.get_data("RM009:imgxy-png:0:0:2,4,8").await.unwrap_err();
    assert!(matches!(
        err,
        DataError::Parse(ParseError::UnsupportedCombination {
            field: "encoding",
            ..
        })
    ));
}

#[tokio::test]
async fn test_repeated_extraction_is_byte_identical() {
    let fixture = build_fixture();
    let service = fixture.service();

    for id in [
        "RM009:imgxy:0:0:2,4,8",
        "RM009:imgxy-zstd_sqrt_v1:0:0:2,4,8",
        "RM009:imgxy-jpg:0:0:2,4,8",
        "RM009:meh3d:::v1,10",
    ] {
        let a = service.get_data(id).await.unwrap();
        let b = service.get_data(id).await.unwrap();
        assert_eq!(a.bytes, b.bytes, "non-deterministic output for {}", id);
        assert!(!a.cache_hit && !b.cache_hit);
    }
}

// =============================================================================
// Meshes
// =============================================================================

#[tokio::test]
async fn test_mesh_whole_object_is_verbatim_obj() {
    let fixture = build_fixture();
    let service = fixture.service();

    let response = service.get_data("RM009:meh3d:::v1").await.unwrap();
    assert!(response.content_type.starts_with("text/plain"));
    assert_eq!(
        &response.bytes[..],
        octahedron_obj([10.0, 10.0, 10.0], 4.0).as_bytes()
    );
}

#[tokio::test]
async fn test_mesh_plane_section_is_closed_polyline() {
    let fixture = build_fixture();
    let service = fixture.service();

    let response = service.get_data("RM009:meh3d:::v1,10").await.unwrap();
    let text = std::str::from_utf8(&response.bytes).unwrap();

    // One square contour at the equator: 4 vertices, one closed l element
    let vertex_lines: Vec<&str> = text.lines().filter(|l| l.starts_with("v ")).collect();
    assert_eq!(vertex_lines.len(), 4);
    for line in &vertex_lines {
        assert!(line.ends_with("10.0000"), "z not fixed at plane: {}", line);
    }

    let l_lines: Vec<&str> = text.lines().filter(|l| l.starts_with("l ")).collect();
    assert_eq!(l_lines.len(), 1);
    let indices: Vec<&str> = l_lines[0].split_whitespace().skip(1).collect();
    assert_eq!(indices.first(), indices.last(), "polyline must close");
}

#[tokio::test]
async fn test_mesh_plane_miss_is_not_found() {
    let fixture = build_fixture();
    let service = fixture.service();

    let err = service.get_data("RM009:meh3d:::v1,100").await.unwrap_err();
    assert!(matches!(
        err,
        DataError::Extract(ExtractError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_unknown_region_is_not_found() {
    let fixture = build_fixture();
    let service = fixture.service();

    let err = service.get_data("RM009:meh3d:::thalamus").await.unwrap_err();
    assert!(matches!(
        err,
        DataError::Extract(ExtractError::NotFound { .. })
    ));
}

// =============================================================================
// Registry Behavior
// =============================================================================

#[tokio::test]
async fn test_malformed_specimen_entry_is_skipped() {
    let fixture = build_fixture();
    let registry = fixture.registry();
    let snapshot = registry.snapshot();

    // The BROKEN entry must not take down RM009
    assert_eq!(snapshot.len(), 1);
    assert!(snapshot.get("RM009").is_some());
    assert!(snapshot.get("BROKEN").is_none());
}

#[tokio::test]
async fn test_default_encoding_and_explicit_share_canonical_form() {
    let fixture = build_fixture();
    let service = fixture.service();

    let implied = service.get_data("RM009:imgxy:0:0:2,4,8").await.unwrap();
    let spelled = service.get_data("RM009:imgxy-raw:0:0:2,4,8").await.unwrap();
    assert_eq!(implied.bytes, spelled.bytes);
}
