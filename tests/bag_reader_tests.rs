// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! BAG topic discovery and extraction tests over synthetic bags.

mod common;

use bagmap::io::formats::bag::{extract, open_for_topics};
use bagmap::{BagMapError, BagReader};
use common::{corridor_bag, laser_scan, msg, odometry, BagBuilder, ODOM_TYPE, SCAN_TYPE};

fn total_count(bag: &[u8]) -> u64 {
    open_for_topics(bag)
        .unwrap()
        .iter()
        .map(|t| t.message_count)
        .sum()
}

// ============================================================================
// Discovery
// ============================================================================

#[test]
fn test_topic_counts_sum_to_message_records() {
    for codec in ["none", "bz2", "lz4"] {
        let bag = corridor_bag(codec, 20);
        let topics = open_for_topics(&bag).unwrap();
        assert_eq!(topics.len(), 2, "codec {codec}");

        let scan = topics.iter().find(|t| t.name == "/scan").unwrap();
        assert_eq!(scan.message_type, SCAN_TYPE);
        assert_eq!(scan.message_count, 20);
        let odom = topics.iter().find(|t| t.name == "/odom").unwrap();
        assert_eq!(odom.message_type, ODOM_TYPE);
        assert_eq!(odom.message_count, 40);
    }
}

#[test]
fn test_counts_without_index_match_indexed_counts() {
    let builder = BagBuilder::new()
        .connection(0, "/a", "std_msgs/String")
        .connection(1, "/b", "std_msgs/String")
        .connection(2, "/c", "std_msgs/String")
        .chunk(
            "lz4",
            vec![msg(0, 1, vec![1]), msg(1, 2, vec![2]), msg(0, 3, vec![3])],
        )
        .chunk("bz2", vec![msg(2, 4, vec![4]), msg(1, 5, vec![5])]);
    let m = builder.message_count() as u64;

    assert_eq!(total_count(&builder.build()), m);
    assert_eq!(total_count(&builder.clone().without_index().build()), m);
    assert_eq!(
        total_count(&builder.without_index().without_magic().build()),
        m
    );
}

#[test]
fn test_connection_without_messages_is_listed() {
    let bag = BagBuilder::new()
        .connection(0, "/scan", SCAN_TYPE)
        .connection(1, "/idle", "std_msgs/Empty")
        .chunk("none", vec![msg(0, 1, vec![0])])
        .build();
    let topics = open_for_topics(&bag).unwrap();
    assert_eq!(topics.len(), 2);
    let idle = topics.iter().find(|t| t.name == "/idle").unwrap();
    assert_eq!(idle.message_count, 0);
}

#[test]
fn test_empty_bag_has_no_topics() {
    let bag = BagBuilder::new().build();
    assert!(open_for_topics(&bag).unwrap().is_empty());
}

#[test]
fn test_truncated_index_keeps_earlier_topics() {
    let mut bag = corridor_bag("none", 4);
    // Cut into the last CHUNK_INFO record of the index.
    bag.truncate(bag.len() - 10);
    let topics = open_for_topics(&bag).unwrap();
    assert!(topics.iter().any(|t| t.name == "/scan"));
    assert!(topics.iter().any(|t| t.name == "/odom"));
}

// ============================================================================
// Extraction
// ============================================================================

#[test]
fn test_extract_unknown_topic_is_topic_not_found() {
    let bag = corridor_bag("none", 3);
    let err = extract(&bag, "/camera").unwrap_err();
    assert_eq!(err, BagMapError::topic_not_found("/camera"));
    assert_eq!(err.code(), "TOPIC_NOT_FOUND");
}

#[test]
fn test_extract_same_across_codecs() {
    let plain = extract(&corridor_bag("none", 15), "/scan").unwrap();
    assert_eq!(plain.len(), 15);
    for codec in ["bz2", "lz4"] {
        let decoded = extract(&corridor_bag(codec, 15), "/scan").unwrap();
        assert_eq!(decoded, plain, "codec {codec}");
    }
}

#[test]
fn test_extract_keeps_chunk_order_and_timestamps() {
    let messages = extract(&corridor_bag("lz4", 25), "/odom").unwrap();
    assert_eq!(messages.len(), 50);
    assert!(messages.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    assert_eq!(messages[1].timestamp, 50_000_000);
    assert_eq!(messages[1].timestamp_secs(), 0.05);
    assert!(messages.iter().all(|m| m.conn == 1));
}

#[test]
fn test_extract_merges_connections_sharing_a_topic() {
    let bag = BagBuilder::new()
        .connection(0, "/scan", SCAN_TYPE)
        .connection(1, "/scan", SCAN_TYPE)
        .chunk(
            "none",
            vec![
                msg(0, 1, laser_scan(1, 0.0, 0.1, &[1.0])),
                msg(1, 2, laser_scan(2, 0.0, 0.1, &[1.0])),
            ],
        )
        .build();
    let topics = open_for_topics(&bag).unwrap();
    assert_eq!(topics.len(), 1);
    assert_eq!(topics[0].message_count, 2);

    let messages = extract(&bag, "/scan").unwrap();
    assert_eq!(
        messages.iter().map(|m| m.conn).collect::<Vec<_>>(),
        vec![0, 1]
    );
}

#[test]
fn test_unknown_compression_counts_from_index_but_fails_extraction() {
    let bag = BagBuilder::new()
        .connection(0, "/odom", ODOM_TYPE)
        .chunk("none", vec![msg(0, 1, odometry(1, 0.0, 0.0, 0.0))])
        .chunk("zstd", vec![msg(0, 2, odometry(2, 1.0, 0.0, 0.0))])
        .build();
    assert_eq!(total_count(&bag), 2);

    let err = extract(&bag, "/odom").unwrap_err();
    assert_eq!(err.code(), "UNSUPPORTED_COMPRESSION");
}

#[test]
fn test_unknown_compression_skipped_when_scanning() {
    let bag = BagBuilder::new()
        .connection(0, "/odom", ODOM_TYPE)
        .chunk("none", vec![msg(0, 1, odometry(1, 0.0, 0.0, 0.0))])
        .chunk("zstd", vec![msg(0, 2, odometry(2, 1.0, 0.0, 0.0))])
        .without_index()
        .build();
    let topics = open_for_topics(&bag).unwrap();
    assert_eq!(topics.len(), 1);
    assert_eq!(topics[0].message_count, 1);
}

// ============================================================================
// BagReader
// ============================================================================

#[test]
fn test_reader_open_from_path_matches_bytes() {
    let bag = corridor_bag("bz2", 10);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("corridor.bag");
    std::fs::write(&path, &bag).unwrap();

    let mapped = BagReader::open(&path).unwrap();
    let owned = BagReader::from_bytes(bag).unwrap();
    assert_eq!(mapped.topics(), owned.topics());
    assert_eq!(mapped.len(), owned.len());
    assert_eq!(
        mapped.extract("/scan").unwrap(),
        owned.extract("/scan").unwrap()
    );
    assert!(mapped.layout().has_magic);
    assert!(mapped.layout().index_pos.is_some());
}

#[test]
fn test_reader_thread_count_does_not_change_output() {
    let bag = corridor_bag("lz4", 30);
    let single = BagReader::from_bytes(bag.clone()).unwrap().with_threads(1);
    let many = BagReader::from_bytes(bag).unwrap().with_threads(4);
    assert_eq!(
        single.extract("/odom").unwrap(),
        many.extract("/odom").unwrap()
    );
}

#[test]
fn test_reader_open_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = BagReader::open(dir.path().join("missing.bag")).unwrap_err();
    assert_eq!(err.code(), "IO_ERROR");
}

#[test]
fn test_reader_open_empty_file_is_format_error() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let err = BagReader::open(file.path()).unwrap_err();
    assert_eq!(err.code(), "FORMAT_ERROR");
}

#[test]
fn test_reader_topic_lookup_and_connections() {
    let reader = BagReader::from_bytes(corridor_bag("none", 2)).unwrap();
    assert_eq!(reader.topic("/scan").unwrap().message_count, 2);
    assert!(reader.topic("/missing").is_none());
    assert_eq!(reader.connections().len(), 2);
    let conn = &reader.connections()[&1];
    assert_eq!(conn.topic, "/odom");
    assert_eq!(
        conn.md5sum.as_deref(),
        Some("0123456789abcdef0123456789abcdef")
    );
}
