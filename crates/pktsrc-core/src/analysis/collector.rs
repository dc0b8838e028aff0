use etherparse::{IpNumber, IpSlice};
use pcap_parser::Linktype;
use tracing::trace;

use super::tally::WeirdTally;
use super::{TsBounds, ts_to_rfc3339};
use crate::context::PacketSink;
use crate::decap::layout;
use crate::source::{PacketArrival, SourceProperties};
use crate::{
    CaptureSummary, DEFAULT_GENERATED_AT, EncapsulationSummary, LinkSummary, NetworkSummary,
    ReplayReport, make_empty_report,
};

/// Packet sink that aggregates accepted frames into report sections.
#[derive(Debug, Default)]
pub struct ReportCollector {
    accepted: u64,
    bounds: TsBounds,
    network: NetworkSummary,
    encapsulation: EncapsulationSummary,
}

impl ReportCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    pub fn network(&self) -> &NetworkSummary {
        &self.network
    }

    pub fn encapsulation(&self) -> &EncapsulationSummary {
        &self.encapsulation
    }

    /// Assemble the report; rejected frames come from `tally`.
    pub fn build_report(&self, input_path: &str, input_bytes: u64, tally: &WeirdTally) -> ReplayReport {
        let mut report = make_empty_report(input_path, input_bytes);
        let rejected = tally.total();
        let bounds = self.bounds.merge(tally.bounds());

        report.capture_summary = Some(CaptureSummary {
            packets_total: self.accepted + rejected,
            packets_accepted: self.accepted,
            packets_rejected: rejected,
            time_start: ts_to_rfc3339(bounds.first),
            time_end: ts_to_rfc3339(bounds.last),
        });
        report.generated_at = report
            .capture_summary
            .as_ref()
            .and_then(|summary| summary.time_end.clone().or(summary.time_start.clone()))
            .unwrap_or_else(|| DEFAULT_GENERATED_AT.to_string());
        report.network = self.network.clone();
        report.encapsulation = self.encapsulation.clone();
        report.weirds = tally.counts();
        report
    }

    fn count_layers(&mut self, arrival: &PacketArrival<'_>) {
        let layers = arrival.layers;
        let encapsulation = &mut self.encapsulation;
        if layers.vlan_tags > 0 {
            encapsulation.vlan += 1;
        }
        if layers.vlan_tags > 1 {
            encapsulation.qinq += 1;
        }
        if layers.pppoe {
            encapsulation.pppoe += 1;
        }
        if layers.mpls_labels > 0 {
            encapsulation.mpls += 1;
            encapsulation.max_mpls_labels = encapsulation.max_mpls_labels.max(layers.mpls_labels);
        }
    }

    fn classify_payload(&mut self, payload: &[u8]) {
        let network = &mut self.network;
        let ip = match IpSlice::from_slice(payload) {
            Ok(ip) => ip,
            Err(err) => {
                trace!(error = %err, len = payload.len(), "payload is not IP");
                network.undecodable += 1;
                return;
            }
        };

        if let IpSlice::Ipv4(_) = ip {
            network.ipv4 += 1;
        } else {
            network.ipv6 += 1;
        }

        let number = ip.payload().ip_number;
        if number == IpNumber::TCP {
            network.tcp += 1;
        } else if number == IpNumber::UDP {
            network.udp += 1;
        } else if number == IpNumber::ICMP || number == IpNumber::IPV6_ICMP {
            network.icmp += 1;
        } else {
            network.other_transport += 1;
        }
    }
}

impl PacketSink for ReportCollector {
    fn on_packet_arrival(&mut self, arrival: PacketArrival<'_>) {
        self.accepted += 1;
        self.bounds.observe(arrival.header.ts);
        self.count_layers(&arrival);
        self.classify_payload(arrival.payload());
    }
}

pub(crate) fn link_summary(props: &SourceProperties) -> LinkSummary {
    LinkSummary {
        link_type: props.link_type.0,
        link_type_name: link_type_name(props.link_type).to_string(),
        hdr_size: props.hdr_size,
    }
}

fn link_type_name(link_type: Linktype) -> &'static str {
    match link_type {
        Linktype::NULL => "null",
        Linktype::ETHERNET => "ethernet",
        Linktype::RAW => "raw",
        layout::LINKTYPE_FDDI => "fddi",
        layout::LINKTYPE_PPP_SERIAL => "ppp_serial",
        layout::LINKTYPE_LINUX_SLL => "linux_sll",
        _ => "unknown",
    }
}
