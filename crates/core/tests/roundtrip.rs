//! Integration test: JPEG → RTP packets → JPEG.
//!
//! Header bytes before SOS are rebuilt by the receiver and may differ from
//! the source; everything from the SOS marker through EOI must survive
//! unchanged.

use rtp_jpeg::jpeg::marker::SOS;
use rtp_jpeg::jpeg::quant::{BaseTables, synthesize};
use rtp_jpeg::jpeg::{HeaderParams, MarkerScanner, build_header};
use rtp_jpeg::{
    Depacketizer, MjpegDepacketizer, MjpegPacketizer, Packetizer, PacketizerConfig, RtpPacket,
};

/// Entropy-coded bytes with stuffed `FF 00` pairs and, when
/// `restart_interval` is set, RSTn markers between segments.
fn scan_data(len: usize, restart_interval: u16) -> Vec<u8> {
    let mut scan = Vec::with_capacity(len + len / 16);
    let mut rst = 0u8;
    for i in 0..len {
        scan.push((i * 37 % 251) as u8);
        if i % 29 == 5 {
            scan.extend_from_slice(&[0xFF, 0x00]);
        }
        if restart_interval > 0 && i % 64 == 63 {
            scan.extend_from_slice(&[0xFF, 0xD0 + rst]);
            rst = (rst + 1) % 8;
        }
    }
    scan
}

fn source_jpeg(restart_interval: u16, scan_len: usize) -> Vec<u8> {
    let tables = synthesize(75, 0, BaseTables::Rfc2435Default, Some(100)).unwrap();
    let params = HeaderParams {
        type_specific: 0,
        type_: 1,
        width_units: 40,
        height_units: 30,
        restart_interval,
    };
    let mut jpeg = build_header(&params, &tables);
    jpeg.extend_from_slice(&scan_data(scan_len, restart_interval));
    jpeg.extend_from_slice(&[0xFF, 0xD9]);
    jpeg
}

fn from_start_of_scan(jpeg: &[u8]) -> &[u8] {
    let mut scanner = MarkerScanner::new(jpeg);
    while let Some(marker) = scanner.next() {
        if marker.code == SOS {
            return &jpeg[scanner.position() - marker.encoded_len()..];
        }
    }
    panic!("no SOS marker");
}

fn packetize(jpeg: &[u8], quality: u8, mtu: usize) -> Vec<Vec<u8>> {
    let config = PacketizerConfig {
        quality: Some(quality),
        restart_interval: None,
        mtu,
    };
    MjpegPacketizer::new(0xCAFE_F00D, config)
        .packetize(jpeg, 3000)
        .unwrap()
}

fn depacketize(packets: &[Vec<u8>]) -> Vec<u8> {
    let mut depacketizer = MjpegDepacketizer::default();
    let mut frames = Vec::new();
    for packet in packets {
        frames.extend(depacketizer.depacketize(packet).unwrap());
    }
    assert_eq!(frames.len(), 1, "expected exactly one frame");
    frames.remove(0)
}

#[test]
fn scan_survives_for_each_quality() {
    for quality in [99, 100, 128] {
        for restart_interval in [0, 4] {
            let source = source_jpeg(restart_interval, 3000);
            let packets = packetize(&source, quality, 1400);
            assert!(packets.len() > 1);
            let output = depacketize(&packets);
            assert_eq!(
                from_start_of_scan(&output),
                from_start_of_scan(&source),
                "quality={quality} restart_interval={restart_interval}"
            );
        }
    }
}

#[test]
fn inline_tables_reproduce_whole_image() {
    // With Q >= 128 the source's own tables travel in-band, so the rebuilt
    // header matches one produced by the same synthesizer.
    for restart_interval in [0, 8] {
        let source = source_jpeg(restart_interval, 2000);
        let output = depacketize(&packetize(&source, 128, 500));
        assert_eq!(output, source, "restart_interval={restart_interval}");
    }
}

#[test]
fn shuffled_arrival() {
    let source = source_jpeg(4, 4000);
    let mut packets = packetize(&source, 128, 300);
    assert!(packets.len() >= 10);

    // Odd positions first, then even positions backwards; the marker packet
    // lands in the middle.
    let (odd, even): (Vec<_>, Vec<_>) = packets
        .drain(..)
        .enumerate()
        .partition(|(i, _)| i % 2 == 1);
    let shuffled: Vec<Vec<u8>> = odd
        .into_iter()
        .chain(even.into_iter().rev())
        .map(|(_, p)| p)
        .collect();

    let output = depacketize(&shuffled);
    assert_eq!(from_start_of_scan(&output), from_start_of_scan(&source));
}

#[test]
fn small_mtu() {
    let source = source_jpeg(0, 600);
    // Q < 128: no table header, so 8 header bytes leave 8 scan bytes each.
    let packets = packetize(&source, 99, 16);
    let scan_len = from_start_of_scan(&source).len() - 14 - 2;
    assert_eq!(packets.len(), scan_len.div_ceil(8));
    let output = depacketize(&packets);
    assert_eq!(from_start_of_scan(&output), from_start_of_scan(&source));
}

#[test]
fn sequence_wrap_inside_frame() {
    let source = source_jpeg(0, 1000);
    let mut packetizer = MjpegPacketizer::new(
        1,
        PacketizerConfig {
            quality: Some(100),
            restart_interval: None,
            mtu: 100,
        },
    );
    // Run the sequence number up until the next frame has to wrap.
    let per_frame = packetizer.packetize(&source, 3000).unwrap().len() as u32;
    assert!(!per_frame.is_power_of_two());
    while packetizer.next_sequence() as u32 + per_frame <= 1 << 16 {
        packetizer.packetize(&source, 3000).unwrap();
    }
    let start = packetizer.next_sequence();
    let packets = packetizer.packetize(&source, 3000).unwrap();
    let last = RtpPacket::parse(packets.last().unwrap()).unwrap().sequence;
    assert!(last < start, "frame must straddle the wrap ({start} → {last})");

    let output = depacketize(&packets);
    assert_eq!(from_start_of_scan(&output), from_start_of_scan(&source));
}

#[test]
fn frames_in_sequence() {
    let mut packetizer = MjpegPacketizer::new(7, PacketizerConfig::default());
    let mut depacketizer = MjpegDepacketizer::default();
    for scan_len in [100, 5000, 20] {
        let source = source_jpeg(0, scan_len);
        let mut frames = Vec::new();
        for packet in packetizer.packetize(&source, 3000).unwrap() {
            frames.extend(depacketizer.depacketize(&packet).unwrap());
        }
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0], source);
    }
}
