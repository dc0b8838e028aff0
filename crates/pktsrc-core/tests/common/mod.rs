#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

pub const LINKTYPE_NULL: u32 = 0;
pub const LINKTYPE_ETHERNET: u32 = 1;
pub const LINKTYPE_LINUX_SLL: u16 = 113;

/// Unique path in the system temp dir; the caller removes it.
pub fn temp_path(name: &str) -> PathBuf {
    let unique = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let mut path = std::env::temp_dir();
    path.push(format!("pktsrc_{unique}_{}_{name}", std::process::id()));
    path
}

/// One record of a legacy capture: seconds, fraction, frame bytes.
pub struct Record {
    pub sec: u32,
    pub frac: u32,
    pub data: Vec<u8>,
}

pub fn record(sec: u32, frac: u32, data: Vec<u8>) -> Record {
    Record { sec, frac, data }
}

pub fn write_legacy(name: &str, magic: u32, linktype: u32, records: &[Record]) -> PathBuf {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&magic.to_le_bytes());
    bytes.extend_from_slice(&2u16.to_le_bytes());
    bytes.extend_from_slice(&4u16.to_le_bytes());
    bytes.extend_from_slice(&0i32.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());
    bytes.extend_from_slice(&65535u32.to_le_bytes());
    bytes.extend_from_slice(&linktype.to_le_bytes());
    for record in records {
        let len = record.data.len() as u32;
        bytes.extend_from_slice(&record.sec.to_le_bytes());
        bytes.extend_from_slice(&record.frac.to_le_bytes());
        bytes.extend_from_slice(&len.to_le_bytes());
        bytes.extend_from_slice(&len.to_le_bytes());
        bytes.extend_from_slice(&record.data);
    }
    let path = temp_path(name);
    fs::write(&path, bytes).unwrap();
    path
}

pub fn write_pcap(name: &str, linktype: u32, records: &[Record]) -> PathBuf {
    write_legacy(name, 0xa1b2_c3d4, linktype, records)
}

/// Section header, one interface and one enhanced packet per frame.
pub fn write_pcapng(name: &str, linktype: u16, frames: &[(u64, Vec<u8>)]) -> PathBuf {
    let mut bytes = Vec::new();

    bytes.extend_from_slice(&0x0a0d_0d0au32.to_le_bytes());
    bytes.extend_from_slice(&28u32.to_le_bytes());
    bytes.extend_from_slice(&0x1a2b_3c4du32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&0u16.to_le_bytes());
    bytes.extend_from_slice(&(-1i64).to_le_bytes());
    bytes.extend_from_slice(&28u32.to_le_bytes());

    bytes.extend_from_slice(&1u32.to_le_bytes());
    bytes.extend_from_slice(&20u32.to_le_bytes());
    bytes.extend_from_slice(&linktype.to_le_bytes());
    bytes.extend_from_slice(&0u16.to_le_bytes());
    bytes.extend_from_slice(&65535u32.to_le_bytes());
    bytes.extend_from_slice(&20u32.to_le_bytes());

    for (micros, data) in frames {
        let padded = data.len().div_ceil(4) * 4;
        let total = (32 + padded) as u32;
        bytes.extend_from_slice(&6u32.to_le_bytes());
        bytes.extend_from_slice(&total.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&((micros >> 32) as u32).to_le_bytes());
        bytes.extend_from_slice(&(*micros as u32).to_le_bytes());
        bytes.extend_from_slice(&(data.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&(data.len() as u32).to_le_bytes());
        bytes.extend_from_slice(data);
        bytes.resize(bytes.len() + padded - data.len(), 0);
        bytes.extend_from_slice(&total.to_le_bytes());
    }

    let path = temp_path(name);
    fs::write(&path, bytes).unwrap();
    path
}

/// Minimal IPv4/UDP datagram with an empty payload.
pub fn ipv4_udp() -> Vec<u8> {
    let mut packet = vec![0x45, 0x00, 0x00, 28, 0, 0, 0, 0, 64, 17, 0, 0];
    packet.extend_from_slice(&[10, 0, 0, 1, 10, 0, 0, 2]);
    packet.extend_from_slice(&[0x13, 0x88, 0x17, 0x70, 0x00, 0x08, 0x00, 0x00]);
    packet
}

pub fn ethernet(ethertype: u16, payload: &[u8]) -> Vec<u8> {
    let mut frame = vec![0x02, 0, 0, 0, 0, 2, 0x02, 0, 0, 0, 0, 1];
    frame.extend_from_slice(&ethertype.to_be_bytes());
    frame.extend_from_slice(payload);
    frame
}

pub fn vlan_tag(inner: u16) -> Vec<u8> {
    let mut tag = vec![0x00, 0x64];
    tag.extend_from_slice(&inner.to_be_bytes());
    tag
}

pub fn mpls_label(bottom: bool) -> [u8; 4] {
    [0x00, 0x01, if bottom { 0x01 } else { 0x00 }, 64]
}

pub fn null_frame(family: u32, payload: &[u8]) -> Vec<u8> {
    let mut frame = family.to_le_bytes().to_vec();
    frame.extend_from_slice(payload);
    frame
}
