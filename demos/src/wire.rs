//! Frame codec workloads
//!
//! A packet is split into frames no larger than the negotiated frame size.
//! Each frame carries a 16-byte header (3-byte big-endian payload length,
//! protocol id, context id, frame index, frame count) and a payload padded
//! to a 16-byte boundary. The merger reassembles frames of one context into
//! the original packet.

use netbench::prelude::*;
use std::cell::RefCell;
use std::future::Future;
use std::hint::black_box;
use tokio::sync::mpsc;

/// Header length in bytes.
pub const HEADER_LEN: usize = 16;

/// Payload alignment.
pub const BLOCK: usize = 16;

/// Largest payload a single frame may carry.
pub const MAX_FRAME_PAYLOAD: usize = 1024;

/// Largest payload the 3-byte length field can describe.
pub const MAX_ENCODABLE_PAYLOAD: usize = 0xFF_FFFF;

/// Errors raised while decoding or merging frames.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("frame shorter than header: {0} bytes")]
    Truncated(usize),
    #[error("payload length {declared} exceeds frame body {available}")]
    BadLength { declared: usize, available: usize },
    #[error("frame {index} of context {context} arrived out of order")]
    OutOfOrder { context: u16, index: u16 },
    #[error("packet of {0} bytes needs more than 65535 frames")]
    TooLarge(usize),
    #[error("payload of {0} bytes does not fit the 3-byte length field")]
    PayloadTooLarge(usize),
    #[error("frame channel closed")]
    ChannelClosed,
}

/// Decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub payload_len: usize,
    pub protocol: u16,
    pub context: u16,
    pub index: u16,
    pub count: u16,
}

fn padded(len: usize) -> usize {
    len.div_ceil(BLOCK) * BLOCK
}

/// Encode one frame.
pub fn encode_frame(
    header: FrameHeader,
    payload: &[u8],
    out: &mut Vec<u8>,
) -> Result<(), FrameError> {
    if payload.len() > MAX_ENCODABLE_PAYLOAD {
        return Err(FrameError::PayloadTooLarge(payload.len()));
    }
    let len = payload.len() as u32;
    out.extend_from_slice(&len.to_be_bytes()[1..]);
    out.extend_from_slice(&header.protocol.to_be_bytes());
    out.extend_from_slice(&header.context.to_be_bytes());
    out.extend_from_slice(&header.index.to_be_bytes());
    out.extend_from_slice(&header.count.to_be_bytes());
    out.resize(out.len() + (HEADER_LEN - 11), 0);

    out.extend_from_slice(payload);
    out.resize(out.len() + padded(payload.len()) - payload.len(), 0);
    Ok(())
}

/// Decode the frame at the start of `bytes`, returning the header, the
/// payload and the number of bytes consumed.
pub fn decode_frame(bytes: &[u8]) -> Result<(FrameHeader, &[u8], usize), FrameError> {
    if bytes.len() < HEADER_LEN {
        return Err(FrameError::Truncated(bytes.len()));
    }
    let payload_len = u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]]) as usize;
    let field = |at: usize| u16::from_be_bytes([bytes[at], bytes[at + 1]]);
    let header = FrameHeader {
        payload_len,
        protocol: field(3),
        context: field(5),
        index: field(7),
        count: field(9),
    };

    let body = &bytes[HEADER_LEN..];
    let consumed = padded(payload_len);
    if consumed > body.len() {
        return Err(FrameError::BadLength {
            declared: payload_len,
            available: body.len(),
        });
    }
    Ok((header, &body[..payload_len], HEADER_LEN + consumed))
}

/// Split `packet` into frames of at most `max_payload` bytes each.
pub fn split_packet(
    protocol: u16,
    context: u16,
    packet: &[u8],
    max_payload: usize,
) -> Result<Vec<u8>, FrameError> {
    let chunks: Vec<&[u8]> = packet.chunks(max_payload.max(1)).collect();
    let count =
        u16::try_from(chunks.len().max(1)).map_err(|_| FrameError::TooLarge(packet.len()))?;

    let mut out = Vec::with_capacity(packet.len() + chunks.len() * (HEADER_LEN + BLOCK));
    if chunks.is_empty() {
        let header = FrameHeader {
            payload_len: 0,
            protocol,
            context,
            index: 0,
            count,
        };
        encode_frame(header, &[], &mut out)?;
    }
    for (index, chunk) in chunks.into_iter().enumerate() {
        let header = FrameHeader {
            payload_len: chunk.len(),
            protocol,
            context,
            index: index as u16,
            count,
        };
        encode_frame(header, chunk, &mut out)?;
    }
    Ok(out)
}

/// Reassembles frames of a context into packets.
#[derive(Debug, Default)]
pub struct FrameMerger {
    context: Option<u16>,
    next_index: u16,
    buffer: Vec<u8>,
}

impl FrameMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one decoded frame; returns the packet once its last frame arrives.
    pub fn push(
        &mut self,
        header: FrameHeader,
        payload: &[u8],
    ) -> Result<Option<Vec<u8>>, FrameError> {
        let expected = match self.context {
            Some(ctx) => ctx == header.context && header.index == self.next_index,
            None => header.index == 0,
        };
        if !expected {
            self.reset();
            return Err(FrameError::OutOfOrder {
                context: header.context,
                index: header.index,
            });
        }

        self.context = Some(header.context);
        self.next_index += 1;
        self.buffer.extend_from_slice(payload);

        if self.next_index >= header.count {
            let packet = std::mem::take(&mut self.buffer);
            self.reset();
            return Ok(Some(packet));
        }
        Ok(None)
    }

    fn reset(&mut self) {
        self.context = None;
        self.next_index = 0;
        self.buffer.clear();
    }
}

/// Decode a byte stream of frames and merge them back into packets.
pub fn merge_stream(mut bytes: &[u8]) -> Result<Vec<Vec<u8>>, FrameError> {
    let mut merger = FrameMerger::new();
    let mut packets = Vec::new();
    while !bytes.is_empty() {
        let (header, payload, consumed) = decode_frame(bytes)?;
        if let Some(packet) = merger.push(header, payload)? {
            packets.push(packet);
        }
        bytes = &bytes[consumed..];
    }
    Ok(packets)
}

fn sample_packet(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}

pub(crate) fn frame_encoder(b: &mut Bencher) -> SuiteResult {
    let payload = sample_packet(MAX_FRAME_PAYLOAD);
    let header = FrameHeader {
        payload_len: payload.len(),
        protocol: 0x10,
        context: 1,
        index: 0,
        count: 1,
    };
    let mut result = Ok(());
    b.iter_batched(
        64,
        || payload.clone(),
        |payload| {
            let mut out = Vec::with_capacity(HEADER_LEN + MAX_FRAME_PAYLOAD);
            result = encode_frame(header, payload, &mut out);
            out.len()
        },
    );
    result?;
    Ok(())
}

pub(crate) fn packet_splitter(b: &mut Bencher) -> SuiteResult {
    let packet = sample_packet(16 * 1024 + 7);
    let mut result = Ok(0);
    b.iter(|| {
        result = split_packet(0x10, 7, black_box(&packet), MAX_FRAME_PAYLOAD).map(|f| f.len());
    });
    result?;
    Ok(())
}

pub(crate) fn frame_merger(b: &mut Bencher) -> SuiteResult {
    let frames = split_packet(0x10, 3, &sample_packet(16 * 1024), MAX_FRAME_PAYLOAD)?;
    let mut result = Ok(Vec::new());
    b.iter(|| result = merge_stream(black_box(&frames)));
    if result?.len() != 1 {
        return Err("merger produced the wrong number of packets".into());
    }
    Ok(())
}

/// Time `workload` futures, keeping the first error for the caller.
fn drive<W, Fut>(b: &mut Bencher, mut workload: W) -> SuiteResult
where
    W: FnMut() -> Fut,
    Fut: Future<Output = Result<usize, FrameError>>,
{
    let failure = RefCell::new(None);
    b.iter_async(|| {
        let fut = workload();
        let failure = &failure;
        async move {
            match fut.await {
                Ok(n) => n,
                Err(e) => {
                    let mut slot = failure.borrow_mut();
                    if slot.is_none() {
                        *slot = Some(e);
                    }
                    0
                }
            }
        }
    })?;
    match failure.into_inner() {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

/// Split `packets` and push the frames through a bounded channel to a
/// writer task. Returns the bytes written.
pub async fn send_packets(
    packets: Vec<Vec<u8>>,
    max_payload: usize,
) -> Result<usize, FrameError> {
    let (tx, mut rx) = mpsc::channel::<Vec<u8>>(16);
    let writer = tokio::spawn(async move {
        let mut written = 0usize;
        while let Some(frames) = rx.recv().await {
            written += frames.len();
        }
        written
    });
    for (context, packet) in packets.iter().enumerate() {
        let frames = split_packet(0x10, context as u16, packet, max_payload)?;
        tx.send(frames).await.map_err(|_| FrameError::ChannelClosed)?;
    }
    drop(tx);
    writer.await.map_err(|_| FrameError::ChannelClosed)
}

/// A reader task feeds encoded frame streams through a channel and the
/// receiver merges them back into packets. Returns the packet count.
pub async fn receive_streams(streams: Vec<Vec<u8>>) -> Result<usize, FrameError> {
    let (tx, mut rx) = mpsc::channel::<Vec<u8>>(16);
    tokio::spawn(async move {
        for stream in streams {
            if tx.send(stream).await.is_err() {
                break;
            }
        }
    });
    let mut packets = 0usize;
    while let Some(stream) = rx.recv().await {
        packets += merge_stream(&stream)?.len();
    }
    Ok(packets)
}

fn flow_packets() -> Vec<Vec<u8>> {
    (1..=8).map(|i| sample_packet(i * 512)).collect()
}

fn flow_streams() -> Result<Vec<Vec<u8>>, FrameError> {
    flow_packets()
        .iter()
        .enumerate()
        .map(|(context, packet)| split_packet(0x10, context as u16, packet, MAX_FRAME_PAYLOAD))
        .collect()
}

pub(crate) fn out_flow(b: &mut Bencher) -> SuiteResult {
    let packets = flow_packets();
    drive(b, || send_packets(packets.clone(), MAX_FRAME_PAYLOAD))
}

pub(crate) fn in_flow(b: &mut Bencher) -> SuiteResult {
    let streams = flow_streams()?;
    drive(b, || receive_streams(streams.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_layout() {
        let mut out = Vec::new();
        let header = FrameHeader { payload_len: 5, protocol: 2, context: 9, index: 0, count: 1 };
        encode_frame(header, b"hello", &mut out).unwrap();

        assert_eq!(out.len(), HEADER_LEN + BLOCK);
        assert_eq!(&out[..3], &[0, 0, 5]);

        let (decoded, payload, consumed) = decode_frame(&out).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(payload, b"hello");
        assert_eq!(consumed, out.len());
    }

    #[test]
    fn split_then_merge_restores_packet() {
        let packet = sample_packet(3 * MAX_FRAME_PAYLOAD + 100);
        let frames = split_packet(1, 4, &packet, MAX_FRAME_PAYLOAD).unwrap();

        let packets = merge_stream(&frames).unwrap();
        assert_eq!(packets, vec![packet]);
    }

    #[test]
    fn empty_packet_is_one_frame() {
        let frames = split_packet(1, 1, &[], MAX_FRAME_PAYLOAD).unwrap();
        assert_eq!(frames.len(), HEADER_LEN);
        assert_eq!(merge_stream(&frames).unwrap(), vec![Vec::<u8>::new()]);
    }

    #[test]
    fn truncated_and_overlong_frames_are_rejected() {
        assert_eq!(decode_frame(&[0u8; 4]), Err(FrameError::Truncated(4)));

        let mut out = Vec::new();
        let header = FrameHeader { payload_len: 40, protocol: 0, context: 0, index: 0, count: 1 };
        encode_frame(header, &[1u8; 40], &mut out).unwrap();
        out.truncate(HEADER_LEN + 16);
        assert!(matches!(decode_frame(&out), Err(FrameError::BadLength { declared: 40, .. })));
    }

    #[test]
    fn merger_rejects_out_of_order_frames() {
        let mut merger = FrameMerger::new();
        let header = FrameHeader { payload_len: 1, protocol: 0, context: 2, index: 1, count: 3 };
        assert_eq!(
            merger.push(header, &[0]),
            Err(FrameError::OutOfOrder { context: 2, index: 1 })
        );
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let payload = vec![0u8; MAX_ENCODABLE_PAYLOAD + 1];
        let mut out = Vec::new();
        let header = FrameHeader {
            payload_len: payload.len(),
            protocol: 0,
            context: 0,
            index: 0,
            count: 1,
        };

        assert_eq!(
            encode_frame(header, &payload, &mut out),
            Err(FrameError::PayloadTooLarge(MAX_ENCODABLE_PAYLOAD + 1))
        );
        assert!(out.is_empty());
        assert!(split_packet(0, 0, &payload, usize::MAX).is_err());
    }

    #[test]
    fn corrupted_stream_fails_in_flow() {
        let mut streams = flow_streams().unwrap();
        streams[3].truncate(HEADER_LEN + 8);

        let mut bencher = Bencher::new();
        let err = drive(&mut bencher, || receive_streams(streams.clone())).unwrap_err();
        assert!(err.to_string().contains("exceeds frame body"));
    }

    #[test]
    fn unsplittable_packet_fails_out_flow() {
        let packets = vec![sample_packet(70_000)];

        let mut bencher = Bencher::new();
        let err = drive(&mut bencher, || send_packets(packets.clone(), 1)).unwrap_err();
        assert!(err.to_string().contains("65535 frames"));
    }

    #[test]
    fn healthy_flows_pass() {
        let mut bencher = Bencher::new();
        assert!(in_flow(&mut bencher).is_ok());
        assert!(out_flow(&mut bencher).is_ok());
    }
}
