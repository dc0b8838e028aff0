use super::PacketHeader;

/// Holds the one in-flight frame of a source.
///
/// Only the metadata lives here; the bytes stay with the capture binding
/// until the frame is released. An empty slot means no frame is buffered.
#[derive(Debug, Default)]
pub struct FrameSlot {
    current: Option<PacketHeader>,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_full(&self) -> bool {
        self.current.is_some()
    }

    pub fn header(&self) -> Option<&PacketHeader> {
        self.current.as_ref()
    }

    /// Buffer `header` unless a frame is already held.
    pub fn fill(&mut self, header: PacketHeader) -> bool {
        if self.current.is_some() {
            return false;
        }
        self.current = Some(header);
        true
    }

    pub fn clear(&mut self) -> Option<PacketHeader> {
        self.current.take()
    }
}

#[cfg(test)]
mod tests {
    use super::FrameSlot;
    use crate::source::PacketHeader;

    fn header(ts: f64) -> PacketHeader {
        PacketHeader {
            ts,
            caplen: 60,
            len: 60,
        }
    }

    #[test]
    fn holds_at_most_one_frame() {
        let mut slot = FrameSlot::new();
        assert!(!slot.is_full());
        assert!(slot.fill(header(1.0)));
        assert!(!slot.fill(header(2.0)));
        assert_eq!(slot.header().map(|h| h.ts), Some(1.0));
    }

    #[test]
    fn clear_empties_slot() {
        let mut slot = FrameSlot::new();
        slot.fill(header(1.0));
        assert_eq!(slot.clear().map(|h| h.ts), Some(1.0));
        assert!(!slot.is_full());
        assert!(slot.clear().is_none());
    }
}
