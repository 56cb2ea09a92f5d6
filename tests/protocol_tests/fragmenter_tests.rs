//! Fragmenter Tests

use wireless_uart::protocol::{encode_command, AsciiString, Command, PacketFragmenter};

fn chunk_lengths(data: Vec<u8>, chunk_size: usize) -> Vec<usize> {
    PacketFragmenter::new(data, chunk_size)
        .map(|chunk| chunk.len())
        .collect()
}

#[test]
fn test_ten_bytes_in_threes() {
    assert_eq!(chunk_lengths(vec![0; 10], 3), vec![3, 3, 3, 1]);
}

#[test]
fn test_exact_multiple_has_no_short_chunk() {
    assert_eq!(chunk_lengths(vec![0; 40], 20), vec![20, 20]);
}

#[test]
fn test_shorter_than_chunk() {
    assert_eq!(chunk_lengths(vec![1, 0], 20), vec![2]);
}

#[test]
fn test_empty_input_yields_nothing() {
    let mut fragmenter = PacketFragmenter::new(Vec::new(), 20);
    assert!(fragmenter.is_exhausted());
    assert!(fragmenter.next().is_none());
}

#[test]
fn test_zero_chunk_size_treated_as_one() {
    assert_eq!(chunk_lengths(vec![0; 3], 0), vec![1, 1, 1]);
}

#[test]
fn test_chunks_preserve_order_and_content() {
    let data: Vec<u8> = (0..=42).collect();
    let mut joined = Vec::new();
    for chunk in PacketFragmenter::new(data.clone(), 20) {
        joined.extend_from_slice(&chunk);
    }
    assert_eq!(joined, data);
}

#[test]
fn test_remaining_tracks_progress() {
    let mut fragmenter = PacketFragmenter::new(vec![0xAA, 0xBB, 0xCC, 0xDD, 0xEE], 2);
    assert_eq!(fragmenter.remaining_count(), 3);

    assert_eq!(fragmenter.len(), 3);

    assert!(fragmenter.next().is_some());
    let rest = fragmenter.remaining();
    assert_eq!(rest.len(), 2);
    assert_eq!(fragmenter.len(), 2);
    assert_eq!(&rest[0][..], &[0xCC, 0xDD]);
    assert_eq!(&rest[1][..], &[0xEE]);
}

#[test]
fn test_long_name_command_fragments() {
    // 41-char name → 43-byte frame → 20 + 20 + 3
    let cmd = Command::DeviceNameWrite {
        name: AsciiString::new("Sample-UartController-001-Extended-Name!!").unwrap(),
    };
    let frame = encode_command(&cmd);
    assert_eq!(frame.len(), 43);
    assert_eq!(chunk_lengths(frame, 20), vec![20, 20, 3]);
}
