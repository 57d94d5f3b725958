//! Sharded chunk store behavior against generated on-disk layouts:
//! multi-chunk/multi-shard assembly, fill values, bounds, dataset lookup.

use neuro_streamer::error::StoreError;
use neuro_streamer::store::{Dtype, ShardedStore, VolumeStore};

use super::test_utils::{
    build_fixture, image_voxel, u16_samples, write_sharded_volume, IMAGE_CHUNK, IMAGE_SHAPE_L0,
    IMAGE_SHARD,
};

async fn open_image_store() -> (tempfile::TempDir, ShardedStore) {
    let fixture = build_fixture();
    let root = fixture.data_root.join("RM009").join("image.zarr");
    let store = ShardedStore::open(root).await.unwrap();
    (fixture.dir, store)
}

#[tokio::test]
async fn test_open_reads_all_levels() {
    let (_dir, store) = open_image_store().await;
    assert_eq!(store.dtype(), Dtype::Uint16);
    assert_eq!(store.level_count(), 2);
    assert_eq!(store.channel_count(), 2);
    assert_eq!(
        store.level_shape(0),
        Some([IMAGE_SHAPE_L0[1], IMAGE_SHAPE_L0[2], IMAGE_SHAPE_L0[3]])
    );
    assert_eq!(store.level_shape(9), None);
}

#[tokio::test]
async fn test_read_box_spanning_chunks_and_shards() {
    let (_dir, store) = open_image_store().await;

    // Inner chunks are [1,2,4,4] and shards [1,4,8,8]; this box crosses
    // chunk boundaries on every axis and shard boundaries on z, y and x.
    let slab = store.read_box(0, 1, [3, 6, 6], [4, 6, 8]).await.unwrap();
    assert_eq!(slab.shape, [4, 6, 8]);

    let samples = u16_samples(&slab.data);
    let mut i = 0;
    for z in 3..7u64 {
        for y in 6..12u64 {
            for x in 6..14u64 {
                assert_eq!(
                    samples[i],
                    image_voxel(0, 1, z, y, x),
                    "voxel ({}, {}, {})",
                    z,
                    y,
                    x
                );
                i += 1;
            }
        }
    }
}

#[tokio::test]
async fn test_read_box_equals_whole_volume_reference() {
    let (_dir, store) = open_image_store().await;

    let [_, nz, ny, nx] = IMAGE_SHAPE_L0;
    let slab = store
        .read_box(0, 0, [0, 0, 0], [nz, ny, nx])
        .await
        .unwrap();
    let samples = u16_samples(&slab.data);

    let mut i = 0;
    for z in 0..nz {
        for y in 0..ny {
            for x in 0..nx {
                assert_eq!(samples[i], image_voxel(0, 0, z, y, x));
                i += 1;
            }
        }
    }
}

#[tokio::test]
async fn test_missing_shard_decodes_to_fill_value() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("gappy.zarr");

    // Same geometry as the image store, but one shard is never written
    write_sharded_volume(
        &root,
        &[(0, IMAGE_SHAPE_L0)],
        IMAGE_SHARD,
        IMAGE_CHUNK,
        &[(0, [0, 0, 0, 0])],
        image_voxel,
    );

    let store = ShardedStore::open(&root).await.unwrap();
    let slab = store.read_box(0, 0, [0, 0, 0], [8, 16, 16]).await.unwrap();
    let samples = u16_samples(&slab.data);

    let mut i = 0;
    for z in 0..8u64 {
        for y in 0..16u64 {
            for x in 0..16u64 {
                // Shard (0,0,0,0) covers channel 0, z 0..4, y 0..8, x 0..8
                let expected = if z < 4 && y < 8 && x < 8 {
                    0
                } else {
                    image_voxel(0, 0, z, y, x)
                };
                assert_eq!(samples[i], expected, "voxel ({}, {}, {})", z, y, x);
                i += 1;
            }
        }
    }
}

#[tokio::test]
async fn test_out_of_bounds_and_clipping() {
    let (_dir, store) = open_image_store().await;

    assert!(matches!(
        store.read_box(0, 0, [8, 0, 0], [1, 4, 4]).await,
        Err(StoreError::OutOfBounds { .. })
    ));
    assert!(matches!(
        store.read_box(0, 0, [0, 0, 999_999_999], [1, 4, 4]).await,
        Err(StoreError::OutOfBounds { .. })
    ));

    // Partially outside clips deterministically
    let slab = store.read_box(0, 0, [7, 14, 14], [4, 4, 4]).await.unwrap();
    assert_eq!(slab.shape, [1, 2, 2]);
}

#[tokio::test]
async fn test_unknown_level_and_channel() {
    let (_dir, store) = open_image_store().await;

    assert!(matches!(
        store.read_box(9, 0, [0, 0, 0], [1, 1, 1]).await,
        Err(StoreError::DatasetMissing { level: 9, .. })
    ));
    assert!(matches!(
        store.read_box(0, 5, [0, 0, 0], [1, 1, 1]).await,
        Err(StoreError::DatasetMissing { channel: 5, .. })
    ));
}

#[tokio::test]
async fn test_unsupported_codec_rejected_at_open() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("blosc.zarr");
    write_sharded_volume(
        &root,
        &[(0, [1, 2, 4, 4])],
        [1, 2, 4, 4],
        [1, 2, 4, 4],
        &[],
        |_, _, _, _, _| 0,
    );

    // Rewrite the level metadata to declare a codec the reader does not
    // implement
    let meta_path = root.join("0").join("zarr.json");
    let text = std::fs::read_to_string(&meta_path).unwrap();
    std::fs::write(&meta_path, text.replace("\"zstd\"", "\"blosc\"")).unwrap();

    assert!(matches!(
        ShardedStore::open(&root).await,
        Err(StoreError::Unsupported { .. })
    ));
}

#[tokio::test]
async fn test_concurrent_reads_share_index_cache() {
    let fixture = build_fixture();
    let root = fixture.data_root.join("RM009").join("image.zarr");
    let store = std::sync::Arc::new(ShardedStore::open(root).await.unwrap());

    let mut handles = Vec::new();
    for i in 0..8u64 {
        let store = std::sync::Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            let z = i % 8;
            store.read_box(0, 0, [z as i64, 0, 0], [1, 8, 8]).await
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().is_ok());
    }
}
