use thiserror::Error;

/// Reasons a frame cannot be handed to the network layer.
///
/// Every variant maps to a stable diagnostic name via [`DecapError::weird_name`];
/// the frame is dropped and the source keeps running.
///
/// # Examples
/// ```
/// use pktsrc_core::DecapError;
///
/// let err = DecapError::NonIpPppoe { protocol: 0x00ff };
/// assert_eq!(err.weird_name(), "non_ip_packet_in_pppoe_encapsulation");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecapError {
    #[error("non-IP address family {family} in null transport")]
    NonIpNull { family: u32 },
    #[error("non-IP protocol {protocol:#06x} in PPP encapsulation")]
    NonIpPpp { protocol: u16 },
    #[error("non-IP protocol {protocol:#06x} in PPPoE encapsulation")]
    NonIpPppoe { protocol: u16 },
    #[error("frame too short: need {needed} bytes, got {actual}")]
    Truncated { needed: usize, actual: usize },
    #[error("MPLS label stack has no bottom-of-stack entry after {entries} labels")]
    UnterminatedLabelStack { entries: usize },
}

impl DecapError {
    /// Diagnostic event name reported for the dropped frame.
    pub fn weird_name(&self) -> &'static str {
        match self {
            DecapError::NonIpNull { .. } => "non_ip_packet_in_null_transport",
            DecapError::NonIpPpp { .. } => "non_ip_packet_in_ppp_encapsulation",
            DecapError::NonIpPppoe { .. } => "non_ip_packet_in_pppoe_encapsulation",
            DecapError::Truncated { .. } => "truncated_link_header",
            DecapError::UnterminatedLabelStack { .. } => "unterminated_mpls_label_stack",
        }
    }
}
