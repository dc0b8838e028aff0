use std::fs::File;
use std::path::{Path, PathBuf};

use pcap_parser::{
    Block, LegacyPcapReader, Linktype, PcapBlockOwned, PcapNGReader, traits::PcapReaderIterator,
};
use tracing::{debug, warn};

use crate::decap::link_header_size;
use crate::source::{CaptureBinding, ExtractOutcome, PacketHeader, SourceError, SourceProperties};

use super::error::PcapSourceError;
use super::layout;
use super::reader::{
    is_nanosecond_magic, is_pcapng_magic, legacy_ts_to_seconds, linktype_for_interface,
    pcapng_ts_to_seconds, read_magic_and_rewind,
};

/// Capture binding that replays a PCAP or PCAPNG trace file.
///
/// # Examples
/// ```no_run
/// use std::path::Path;
///
/// use pktsrc_core::{CaptureBinding, PcapFileBinding};
///
/// let mut binding = PcapFileBinding::new(Path::new("trace.pcap"));
/// let props = binding.open()?;
/// println!("link type {}", props.link_type.0);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct PcapFileBinding {
    path: PathBuf,
    inner: Option<PcapReader>,
    buffer: Vec<u8>,
}

enum PcapReader {
    Legacy {
        reader: LegacyPcapReader<File>,
        linktype: Option<Linktype>,
        nanosecond: bool,
    },
    Ng {
        reader: PcapNGReader<File>,
        linktypes: Vec<Linktype>,
    },
}

impl PcapReader {
    fn primary_linktype(&self) -> Option<Linktype> {
        match self {
            PcapReader::Legacy { linktype, .. } => *linktype,
            PcapReader::Ng { linktypes, .. } => linktypes.first().copied(),
        }
    }
}

impl PcapFileBinding {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            inner: None,
            buffer: Vec::new(),
        }
    }
}

impl CaptureBinding for PcapFileBinding {
    fn open(&mut self) -> Result<SourceProperties, SourceError> {
        let file = File::open(&self.path)?;
        let mut reader = create_reader(file)?;
        read_file_headers(&mut reader)?;
        let link_type = reader.primary_linktype().unwrap_or(Linktype::ETHERNET);
        let hdr_size = link_header_size(link_type).unwrap_or_else(|| {
            warn!(
                path = %self.path.display(),
                link_type = link_type.0,
                "unsupported link type, frames are passed on without a link header"
            );
            0
        });
        self.inner = Some(reader);

        Ok(SourceProperties {
            path: self.path.display().to_string(),
            link_type,
            hdr_size,
            is_live: false,
            selectable_fd: None,
        })
    }

    fn close(&mut self) {
        self.inner = None;
        self.buffer.clear();
    }

    fn extract_next_packet(&mut self) -> Result<ExtractOutcome, SourceError> {
        let reader = self.inner.as_mut().ok_or(SourceError::NotOpen)?;
        match next_packet(reader, &mut self.buffer)? {
            Some(header) => Ok(ExtractOutcome::Packet(header)),
            None => {
                debug!(path = %self.path.display(), "trace file exhausted");
                self.close();
                Ok(ExtractOutcome::Exhausted)
            }
        }
    }

    fn packet_data(&self) -> &[u8] {
        &self.buffer
    }

    fn done_with_packet(&mut self) {
        self.buffer.clear();
    }

    fn tag(&self) -> &'static str {
        layout::BINDING_TAG
    }
}

fn create_reader(file: File) -> Result<PcapReader, PcapSourceError> {
    let mut file = file;
    let magic = read_magic_and_rewind(&mut file)?;

    if is_pcapng_magic(&magic) {
        let reader = PcapNGReader::new(layout::PCAP_READER_BUFFER_SIZE, file).map_err(|e| {
            PcapSourceError::Pcap {
                context: "pcapng reader init",
                message: e.to_string(),
            }
        })?;
        Ok(PcapReader::Ng {
            reader,
            linktypes: Vec::new(),
        })
    } else {
        let reader = LegacyPcapReader::new(layout::PCAP_READER_BUFFER_SIZE, file).map_err(|e| {
            PcapSourceError::Pcap {
                context: "pcap reader init",
                message: e.to_string(),
            }
        })?;
        Ok(PcapReader::Legacy {
            reader,
            linktype: None,
            nanosecond: false,
        })
    }
}

/// Consume header blocks until the link type is known.
///
/// Stops without consuming at the first packet block, so no frame is lost.
fn read_file_headers(reader: &mut PcapReader) -> Result<(), PcapSourceError> {
    while reader.primary_linktype().is_none() {
        match reader {
            PcapReader::Legacy {
                reader,
                linktype,
                nanosecond,
            } => match reader.next() {
                Ok((offset, PcapBlockOwned::LegacyHeader(header))) => {
                    *linktype = Some(header.network);
                    *nanosecond = is_nanosecond_magic(header.magic_number);
                    reader.consume(offset);
                }
                Ok(_) | Err(pcap_parser::PcapError::Eof) => return Ok(()),
                Err(pcap_parser::PcapError::Incomplete(_)) => {
                    reader.refill().map_err(|e| PcapSourceError::Pcap {
                        context: "pcap header refill",
                        message: e.to_string(),
                    })?;
                }
                Err(e) => {
                    return Err(PcapSourceError::Pcap {
                        context: "pcap header",
                        message: e.to_string(),
                    });
                }
            },
            PcapReader::Ng { reader, linktypes } => match reader.next() {
                Ok((offset, block)) => match block {
                    PcapBlockOwned::NG(Block::InterfaceDescription(intf)) => {
                        linktypes.push(intf.linktype);
                        reader.consume(offset);
                    }
                    PcapBlockOwned::NG(Block::EnhancedPacket(_))
                    | PcapBlockOwned::NG(Block::SimplePacket(_)) => return Ok(()),
                    _ => reader.consume(offset),
                },
                Err(pcap_parser::PcapError::Eof) => return Ok(()),
                Err(pcap_parser::PcapError::Incomplete(_)) => {
                    reader.refill().map_err(|e| PcapSourceError::Pcap {
                        context: "pcapng header refill",
                        message: e.to_string(),
                    })?;
                }
                Err(e) => {
                    return Err(PcapSourceError::Pcap {
                        context: "pcapng header",
                        message: e.to_string(),
                    });
                }
            },
        }
    }
    Ok(())
}

/// Stage the next packet's bytes in `buffer`; `None` at end of file.
fn next_packet(
    reader: &mut PcapReader,
    buffer: &mut Vec<u8>,
) -> Result<Option<PacketHeader>, PcapSourceError> {
    loop {
        match reader {
            PcapReader::Legacy {
                reader,
                linktype,
                nanosecond,
            } => match reader.next() {
                Ok((offset, block)) => {
                    let header = match block {
                        PcapBlockOwned::LegacyHeader(header) => {
                            *linktype = Some(header.network);
                            *nanosecond = is_nanosecond_magic(header.magic_number);
                            None
                        }
                        PcapBlockOwned::Legacy(packet) => {
                            stage(buffer, packet.data, packet.caplen);
                            Some(PacketHeader {
                                ts: legacy_ts_to_seconds(
                                    packet.ts_sec,
                                    packet.ts_usec,
                                    *nanosecond,
                                ),
                                caplen: buffer.len() as u32,
                                len: packet.origlen,
                            })
                        }
                        _ => None,
                    };
                    reader.consume(offset);
                    if header.is_some() {
                        return Ok(header);
                    }
                }
                Err(pcap_parser::PcapError::Eof) => return Ok(None),
                Err(pcap_parser::PcapError::Incomplete(_)) => {
                    reader.refill().map_err(|e| PcapSourceError::Pcap {
                        context: "pcap reader refill",
                        message: e.to_string(),
                    })?;
                }
                Err(e) => {
                    return Err(PcapSourceError::Pcap {
                        context: "pcap reader next",
                        message: e.to_string(),
                    });
                }
            },
            PcapReader::Ng { reader, linktypes } => match reader.next() {
                Ok((offset, block)) => {
                    let header = match block {
                        PcapBlockOwned::NG(Block::InterfaceDescription(intf)) => {
                            linktypes.push(intf.linktype);
                            None
                        }
                        PcapBlockOwned::NG(Block::EnhancedPacket(packet)) => {
                            let linktype = linktype_for_interface(linktypes, packet.if_id);
                            if Some(linktype) != linktypes.first().copied() {
                                debug!(
                                    if_id = packet.if_id,
                                    linktype = linktype.0,
                                    "frame on interface with foreign link type"
                                );
                            }
                            stage(buffer, packet.data, packet.caplen);
                            Some(PacketHeader {
                                ts: pcapng_ts_to_seconds(packet.ts_high, packet.ts_low),
                                caplen: buffer.len() as u32,
                                len: packet.origlen,
                            })
                        }
                        _ => None,
                    };
                    reader.consume(offset);
                    if header.is_some() {
                        return Ok(header);
                    }
                }
                Err(pcap_parser::PcapError::Eof) => return Ok(None),
                Err(pcap_parser::PcapError::Incomplete(_)) => {
                    reader.refill().map_err(|e| PcapSourceError::Pcap {
                        context: "pcapng reader refill",
                        message: e.to_string(),
                    })?;
                }
                Err(e) => {
                    return Err(PcapSourceError::Pcap {
                        context: "pcapng reader next",
                        message: e.to_string(),
                    });
                }
            },
        }
    }
}

/// Copy the captured bytes, dropping block padding past `caplen`.
fn stage(buffer: &mut Vec<u8>, data: &[u8], caplen: u32) {
    let len = (caplen as usize).min(data.len());
    buffer.clear();
    buffer.extend_from_slice(&data[..len]);
}
