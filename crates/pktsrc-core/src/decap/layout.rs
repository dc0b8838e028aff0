use pcap_parser::Linktype;

/// `DLT_FDDI`.
pub const LINKTYPE_FDDI: Linktype = Linktype(10);
/// `DLT_PPP_SERIAL` / `LINKTYPE_PPP_HDLC`.
pub const LINKTYPE_PPP_SERIAL: Linktype = Linktype(50);
/// `DLT_LINUX_SLL`.
pub const LINKTYPE_LINUX_SLL: Linktype = Linktype(113);

pub const NULL_HEADER_LEN: usize = 4;
pub const ETHERNET_HEADER_LEN: usize = 14;
pub const FDDI_HEADER_LEN: usize = 13 + 8;
pub const LINUX_SLL_HEADER_LEN: usize = 16;
pub const PPP_SERIAL_HEADER_LEN: usize = 4;
pub const RAW_HEADER_LEN: usize = 0;

pub const NULL_FAMILY_RANGE: std::ops::Range<usize> = 0..4;
pub const AF_INET: u32 = 2;
/// `AF_INET6` as written by Linux, NetBSD/OpenBSD/BSD-OS, FreeBSD/DragonFly and Darwin.
pub const AF_INET6_TAGS: [u32; 4] = [10, 24, 28, 30];

pub const ETHERTYPE_RANGE: std::ops::Range<usize> = 12..14;
pub const ETHERTYPE_IPV4: u16 = 0x0800;
pub const ETHERTYPE_VLAN: u16 = 0x8100;
pub const ETHERTYPE_MPLS_UNICAST: u16 = 0x8847;
pub const ETHERTYPE_PPPOE_SESSION: u16 = 0x8864;

pub const VLAN_TAG_LEN: usize = 4;
/// Inner ethertype of a tag, relative to the start of the tag.
pub const VLAN_INNER_ETHERTYPE_RANGE: std::ops::Range<usize> = 2..4;

/// PPP protocol field, relative to the start of the PPPoE session header.
pub const PPPOE_PPP_PROTOCOL_RANGE: std::ops::Range<usize> = 6..8;
/// PPPoE session header (6) plus PPP protocol (2).
pub const PPPOE_SESSION_LEN: usize = 8;

pub const PPP_PROTOCOL_RANGE: std::ops::Range<usize> = 2..4;
pub const PPP_IPV4: u16 = 0x0021;
pub const PPP_IPV6: u16 = 0x0057;
pub const PPP_MPLS_UNICAST: u16 = 0x0281;

pub const MPLS_ENTRY_LEN: usize = 4;
/// Octet of a label stack entry that carries the bottom-of-stack bit.
pub const MPLS_BOS_OCTET: usize = 2;
pub const MPLS_BOS_MASK: u8 = 0x01;
