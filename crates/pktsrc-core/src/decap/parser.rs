use pcap_parser::Linktype;

use super::error::DecapError;
use super::layout;
use super::reader::{FrameReader, at};

/// Where the network-layer payload starts inside a captured frame.
///
/// `data_offset` counts the bytes already peeled (VLAN, PPPoE, MPLS) and
/// `hdr_size` the fixed link header still to skip. Once any variable-length
/// header has been peeled `hdr_size` is zero, because the source's fixed header
/// size only describes the outermost frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decapsulated {
    pub data_offset: usize,
    pub hdr_size: usize,
    pub layers: LinkLayers,
}

impl Decapsulated {
    fn fixed(hdr_size: usize) -> Self {
        Self {
            data_offset: 0,
            hdr_size,
            layers: LinkLayers::default(),
        }
    }

    /// Absolute offset of the network-layer payload.
    pub fn payload_offset(&self) -> usize {
        self.data_offset + self.hdr_size
    }
}

/// Encapsulations unwound on the way to the payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkLayers {
    pub vlan_tags: u8,
    pub pppoe: bool,
    pub mpls_labels: usize,
}

/// Fixed link-layer header size for a link type, if known.
///
/// # Examples
/// ```
/// use pcap_parser::Linktype;
/// use pktsrc_core::link_header_size;
///
/// assert_eq!(link_header_size(Linktype::ETHERNET), Some(14));
/// assert_eq!(link_header_size(Linktype(9999)), None);
/// ```
pub fn link_header_size(link_type: Linktype) -> Option<usize> {
    match link_type {
        Linktype::NULL => Some(layout::NULL_HEADER_LEN),
        Linktype::ETHERNET => Some(layout::ETHERNET_HEADER_LEN),
        layout::LINKTYPE_FDDI => Some(layout::FDDI_HEADER_LEN),
        layout::LINKTYPE_LINUX_SLL => Some(layout::LINUX_SLL_HEADER_LEN),
        layout::LINKTYPE_PPP_SERIAL => Some(layout::PPP_SERIAL_HEADER_LEN),
        Linktype::RAW => Some(layout::RAW_HEADER_LEN),
        _ => None,
    }
}

/// Locate the network-layer payload of `data` for the given link type.
///
/// `hdr_size` is the fixed header size reported by the capture source; it is
/// used as-is for link types that need no inspection.
///
/// # Errors
/// Returns a [`DecapError`] for frames that carry no IP payload or whose
/// headers run past the captured bytes.
///
/// # Examples
/// ```
/// use pcap_parser::Linktype;
/// use pktsrc_core::decapsulate;
///
/// let mut frame = vec![0u8; 22];
/// frame[12..14].copy_from_slice(&0x8100u16.to_be_bytes());
/// frame[16..18].copy_from_slice(&0x0800u16.to_be_bytes());
/// let result = decapsulate(Linktype::ETHERNET, 14, &frame).unwrap();
/// assert_eq!(result.payload_offset(), 18);
/// ```
pub fn decapsulate(
    link_type: Linktype,
    hdr_size: usize,
    data: &[u8],
) -> Result<Decapsulated, DecapError> {
    let reader = FrameReader::new(data);
    match link_type {
        Linktype::NULL => decapsulate_null(&reader, hdr_size),
        Linktype::ETHERNET => decapsulate_ethernet(&reader, hdr_size),
        layout::LINKTYPE_PPP_SERIAL => decapsulate_ppp_serial(&reader, hdr_size),
        _ => Ok(Decapsulated::fixed(hdr_size)),
    }
}

fn decapsulate_null(reader: &FrameReader<'_>, hdr_size: usize) -> Result<Decapsulated, DecapError> {
    // Traces may come from another OS than ours, so every known AF_INET6
    // encoding is accepted.
    let family = reader.read_u32_le(layout::NULL_FAMILY_RANGE)?;
    if family != layout::AF_INET && !layout::AF_INET6_TAGS.contains(&family) {
        return Err(DecapError::NonIpNull { family });
    }
    Ok(Decapsulated::fixed(hdr_size))
}

fn decapsulate_ethernet(
    reader: &FrameReader<'_>,
    hdr_size: usize,
) -> Result<Decapsulated, DecapError> {
    let ethertype = reader.read_u16_be(layout::ETHERTYPE_RANGE)?;
    match ethertype {
        layout::ETHERTYPE_MPLS_UNICAST => unwind_mpls(reader, layout::ETHERNET_HEADER_LEN),
        layout::ETHERTYPE_VLAN => {
            let mut offset = layout::ETHERNET_HEADER_LEN + layout::VLAN_TAG_LEN;
            reader.require_len(offset)?;
            let mut vlan_tags = 1;

            // Q-in-Q: at most one nested tag is stripped, and only when the
            // inner tag carries IPv4.
            let nested = reader.read_u16_be(at(offset, layout::VLAN_INNER_ETHERTYPE_RANGE));
            if nested == Ok(layout::ETHERTYPE_IPV4) {
                offset += layout::VLAN_TAG_LEN;
                vlan_tags += 1;
            }

            Ok(Decapsulated {
                data_offset: offset,
                hdr_size: 0,
                layers: LinkLayers {
                    vlan_tags,
                    ..LinkLayers::default()
                },
            })
        }
        layout::ETHERTYPE_PPPOE_SESSION => {
            let session = layout::ETHERNET_HEADER_LEN;
            let protocol = reader.read_u16_be(at(session, layout::PPPOE_PPP_PROTOCOL_RANGE))?;
            if !is_ppp_ip(protocol) {
                return Err(DecapError::NonIpPppoe { protocol });
            }
            Ok(Decapsulated {
                data_offset: session + layout::PPPOE_SESSION_LEN,
                hdr_size: 0,
                layers: LinkLayers {
                    pppoe: true,
                    ..LinkLayers::default()
                },
            })
        }
        _ => Ok(Decapsulated::fixed(hdr_size)),
    }
}

fn decapsulate_ppp_serial(
    reader: &FrameReader<'_>,
    hdr_size: usize,
) -> Result<Decapsulated, DecapError> {
    let protocol = reader.read_u16_be(layout::PPP_PROTOCOL_RANGE)?;
    if protocol == layout::PPP_MPLS_UNICAST {
        return unwind_mpls(reader, layout::PPP_SERIAL_HEADER_LEN);
    }
    if !is_ppp_ip(protocol) {
        return Err(DecapError::NonIpPpp { protocol });
    }
    Ok(Decapsulated::fixed(hdr_size))
}

/// Skip the label stack that follows an outer link header of `link_len` bytes.
fn unwind_mpls(reader: &FrameReader<'_>, link_len: usize) -> Result<Decapsulated, DecapError> {
    let mut offset = link_len;
    let mut entries = 0;
    loop {
        let entry = reader
            .read_slice(offset..offset + layout::MPLS_ENTRY_LEN)
            .map_err(|_| DecapError::UnterminatedLabelStack { entries })?;
        let flags = entry[layout::MPLS_BOS_OCTET];
        offset += layout::MPLS_ENTRY_LEN;
        entries += 1;
        if flags & layout::MPLS_BOS_MASK != 0 {
            break;
        }
    }
    Ok(Decapsulated {
        data_offset: offset,
        hdr_size: 0,
        layers: LinkLayers {
            mpls_labels: entries,
            ..LinkLayers::default()
        },
    })
}

fn is_ppp_ip(protocol: u16) -> bool {
    protocol == layout::PPP_IPV4 || protocol == layout::PPP_IPV6
}

#[cfg(test)]
mod tests {
    use super::{decapsulate, link_header_size};
    use crate::decap::error::DecapError;
    use crate::decap::layout;
    use pcap_parser::Linktype;

    fn ethernet(ethertype: u16, rest: &[u8]) -> Vec<u8> {
        let mut frame = vec![0u8; layout::ETHERNET_HEADER_LEN];
        frame[layout::ETHERTYPE_RANGE].copy_from_slice(&ethertype.to_be_bytes());
        frame.extend_from_slice(rest);
        frame
    }

    fn vlan_tag(vid: u16, inner: u16) -> [u8; 4] {
        let tci = vid.to_be_bytes();
        let inner = inner.to_be_bytes();
        [tci[0], tci[1], inner[0], inner[1]]
    }

    fn mpls_entry(label: u32, bottom: bool) -> [u8; 4] {
        let bottom = if bottom { 0x100 } else { 0 };
        let value = (label << 12) | bottom | 64;
        value.to_be_bytes()
    }

    #[test]
    fn null_accepts_ipv4_family() {
        let mut frame = 2u32.to_le_bytes().to_vec();
        frame.extend_from_slice(&[0x45; 20]);
        let result = decapsulate(Linktype::NULL, 4, &frame).unwrap();
        assert_eq!(result.data_offset, 0);
        assert_eq!(result.payload_offset(), 4);
    }

    #[test]
    fn null_accepts_every_ipv6_encoding() {
        for family in [10u32, 24, 28, 30] {
            let frame = family.to_le_bytes();
            assert!(decapsulate(Linktype::NULL, 4, &frame).is_ok(), "family {family}");
        }
    }

    #[test]
    fn null_rejects_unknown_family() {
        let frame = 99u32.to_le_bytes();
        let err = decapsulate(Linktype::NULL, 4, &frame).unwrap_err();
        assert_eq!(err, DecapError::NonIpNull { family: 99 });
        assert_eq!(err.weird_name(), "non_ip_packet_in_null_transport");
    }

    #[test]
    fn null_short_frame_is_truncated() {
        let err = decapsulate(Linktype::NULL, 4, &[2, 0]).unwrap_err();
        assert!(matches!(err, DecapError::Truncated { needed: 4, actual: 2 }));
    }

    #[test]
    fn ethernet_ipv4_keeps_fixed_header() {
        let frame = ethernet(0x0800, &[0x45; 20]);
        let result = decapsulate(Linktype::ETHERNET, 14, &frame).unwrap();
        assert_eq!(result.data_offset, 0);
        assert_eq!(result.hdr_size, 14);
        assert_eq!(result.layers.vlan_tags, 0);
    }

    #[test]
    fn ethernet_non_ip_ethertype_is_passed_through() {
        let frame = ethernet(0x0806, &[0; 28]);
        let result = decapsulate(Linktype::ETHERNET, 14, &frame).unwrap();
        assert_eq!(result.payload_offset(), 14);
    }

    #[test]
    fn single_vlan_tag_advances_four_bytes() {
        let mut rest = vlan_tag(100, 0x0800).to_vec();
        rest.extend_from_slice(&[0x45, 0x00, 0x00, 0x54]);
        let frame = ethernet(layout::ETHERTYPE_VLAN, &rest);
        let result = decapsulate(Linktype::ETHERNET, 14, &frame).unwrap();
        assert_eq!(result.data_offset, 14 + 4);
        assert_eq!(result.hdr_size, 0);
        assert_eq!(result.layers.vlan_tags, 1);
    }

    #[test]
    fn double_vlan_tag_advances_eight_bytes() {
        let mut rest = vlan_tag(100, layout::ETHERTYPE_VLAN).to_vec();
        rest.extend_from_slice(&vlan_tag(200, 0x0800));
        rest.extend_from_slice(&[0x45; 20]);
        let frame = ethernet(layout::ETHERTYPE_VLAN, &rest);
        let result = decapsulate(Linktype::ETHERNET, 14, &frame).unwrap();
        assert_eq!(result.data_offset, 14 + 8);
        assert_eq!(result.payload_offset(), 22);
        assert_eq!(result.layers.vlan_tags, 2);
    }

    #[test]
    fn nested_vlan_carrying_ipv6_is_not_unwound() {
        let mut rest = vlan_tag(100, layout::ETHERTYPE_VLAN).to_vec();
        rest.extend_from_slice(&vlan_tag(200, 0x86dd));
        rest.extend_from_slice(&[0x60; 40]);
        let frame = ethernet(layout::ETHERTYPE_VLAN, &rest);
        let result = decapsulate(Linktype::ETHERNET, 14, &frame).unwrap();
        assert_eq!(result.data_offset, 18);
    }

    #[test]
    fn vlan_without_tag_bytes_is_truncated() {
        let frame = ethernet(layout::ETHERTYPE_VLAN, &[0x00, 0x64]);
        let err = decapsulate(Linktype::ETHERNET, 14, &frame).unwrap_err();
        assert!(matches!(err, DecapError::Truncated { needed: 18, .. }));
    }

    #[test]
    fn pppoe_ipv4_lands_after_session_header() {
        let mut rest = vec![0x11, 0x00, 0x12, 0x34, 0x00, 0x40];
        rest.extend_from_slice(&layout::PPP_IPV4.to_be_bytes());
        rest.extend_from_slice(&[0x45; 20]);
        let frame = ethernet(layout::ETHERTYPE_PPPOE_SESSION, &rest);
        let result = decapsulate(Linktype::ETHERNET, 14, &frame).unwrap();
        assert_eq!(result.data_offset, 14 + 8);
        assert_eq!(result.hdr_size, 0);
        assert!(result.layers.pppoe);
    }

    #[test]
    fn pppoe_ipv6_lands_after_session_header() {
        let mut rest = vec![0x11, 0x00, 0x12, 0x34, 0x00, 0x40];
        rest.extend_from_slice(&layout::PPP_IPV6.to_be_bytes());
        rest.extend_from_slice(&[0x60; 40]);
        let frame = ethernet(layout::ETHERTYPE_PPPOE_SESSION, &rest);
        let result = decapsulate(Linktype::ETHERNET, 14, &frame).unwrap();
        assert_eq!(result.payload_offset(), 22);
        assert!(result.layers.pppoe);
    }

    #[test]
    fn pppoe_non_ip_is_rejected() {
        let mut rest = vec![0x11, 0x00, 0x12, 0x34, 0x00, 0x40];
        rest.extend_from_slice(&0x00ffu16.to_be_bytes());
        let frame = ethernet(layout::ETHERTYPE_PPPOE_SESSION, &rest);
        let err = decapsulate(Linktype::ETHERNET, 14, &frame).unwrap_err();
        assert_eq!(err, DecapError::NonIpPppoe { protocol: 0x00ff });
        assert_eq!(err.weird_name(), "non_ip_packet_in_pppoe_encapsulation");
    }

    #[test]
    fn ethernet_mpls_single_label() {
        let mut rest = mpls_entry(16, true).to_vec();
        rest.extend_from_slice(&[0x45; 20]);
        let frame = ethernet(layout::ETHERTYPE_MPLS_UNICAST, &rest);
        let result = decapsulate(Linktype::ETHERNET, 14, &frame).unwrap();
        assert_eq!(result.data_offset, 14 + 4);
        assert_eq!(result.hdr_size, 0);
        assert_eq!(result.layers.mpls_labels, 1);
    }

    #[test]
    fn ethernet_mpls_three_labels() {
        let mut rest = Vec::new();
        rest.extend_from_slice(&mpls_entry(16, false));
        rest.extend_from_slice(&mpls_entry(17, false));
        rest.extend_from_slice(&mpls_entry(18, true));
        rest.extend_from_slice(&[0x45; 20]);
        let frame = ethernet(layout::ETHERTYPE_MPLS_UNICAST, &rest);
        let result = decapsulate(Linktype::ETHERNET, 14, &frame).unwrap();
        assert_eq!(result.data_offset, 14 + 12);
        assert_eq!(result.layers.mpls_labels, 3);
    }

    #[test]
    fn mpls_without_bottom_of_stack_stops_at_buffer_end() {
        let mut rest = Vec::new();
        rest.extend_from_slice(&mpls_entry(16, false));
        rest.extend_from_slice(&mpls_entry(17, false));
        let frame = ethernet(layout::ETHERTYPE_MPLS_UNICAST, &rest);
        let err = decapsulate(Linktype::ETHERNET, 14, &frame).unwrap_err();
        assert_eq!(err, DecapError::UnterminatedLabelStack { entries: 2 });
    }

    #[test]
    fn mpls_bottom_label_cut_short_is_rejected() {
        let entry = mpls_entry(16, true);
        let frame = ethernet(layout::ETHERTYPE_MPLS_UNICAST, &entry[..3]);
        assert_eq!(frame.len(), 17);
        let err = decapsulate(Linktype::ETHERNET, 14, &frame).unwrap_err();
        assert_eq!(err, DecapError::UnterminatedLabelStack { entries: 0 });
    }

    #[test]
    fn ppp_serial_ip_protocols_are_accepted() {
        for protocol in [layout::PPP_IPV4, layout::PPP_IPV6] {
            let mut frame = vec![0xff, 0x03];
            frame.extend_from_slice(&protocol.to_be_bytes());
            let result = decapsulate(layout::LINKTYPE_PPP_SERIAL, 4, &frame).unwrap();
            assert_eq!(result.payload_offset(), 4);
        }
    }

    #[test]
    fn ppp_serial_rejects_lcp() {
        let frame = [0xff, 0x03, 0xc0, 0x21];
        let err = decapsulate(layout::LINKTYPE_PPP_SERIAL, 4, &frame).unwrap_err();
        assert_eq!(err.weird_name(), "non_ip_packet_in_ppp_encapsulation");
    }

    #[test]
    fn ppp_serial_mpls_unwinds_after_ppp_header() {
        let mut frame = vec![0xff, 0x03];
        frame.extend_from_slice(&layout::PPP_MPLS_UNICAST.to_be_bytes());
        frame.extend_from_slice(&mpls_entry(42, true));
        let result = decapsulate(layout::LINKTYPE_PPP_SERIAL, 4, &frame).unwrap();
        assert_eq!(result.data_offset, 8);
        assert_eq!(result.hdr_size, 0);
    }

    #[test]
    fn unknown_link_type_uses_reported_header_size() {
        let frame = [0u8; 4];
        let result = decapsulate(Linktype(147), 7, &frame).unwrap();
        assert_eq!(result.data_offset, 0);
        assert_eq!(result.hdr_size, 7);
    }

    #[test]
    fn header_sizes_follow_link_type() {
        assert_eq!(link_header_size(Linktype::NULL), Some(4));
        assert_eq!(link_header_size(layout::LINKTYPE_FDDI), Some(21));
        assert_eq!(link_header_size(layout::LINKTYPE_LINUX_SLL), Some(16));
        assert_eq!(link_header_size(layout::LINKTYPE_PPP_SERIAL), Some(4));
        assert_eq!(link_header_size(Linktype::RAW), Some(0));
    }
}
