//! The RFC 6455 wire-format frame codec.

use std::{
    fmt::{self, Display, Formatter},
    io,
};

use rand::{rngs::StdRng, RngCore, SeedableRng};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::{net::buf::ConnBuf, ws::opcode};

/// Errors when parsing WebSocket frames.
#[derive(Debug)]
pub enum Error {
    /// The frame violates the wire format.
    BadFrame,

    /// The source ended inside a frame.
    ShortRead,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Error::BadFrame => write!(f, "malformed WebSocket frame"),
            Error::ShortRead => write!(f, "connection ended inside a frame"),
        }
    }
}

impl std::error::Error for Error {}

fn bad_frame() -> io::Error {
    io::Error::new(io::ErrorKind::Other, Error::BadFrame)
}

fn short_read() -> io::Error {
    io::Error::new(io::ErrorKind::UnexpectedEof, Error::ShortRead)
}

/// A single WebSocket frame: the bit-packed header fields plus the
/// payload bytes.
///
/// Decoding copies the payload out of the connection buffer, so the
/// ring is immediately free for the next frame. Reserved bits and
/// reserved opcodes are surfaced verbatim; whether to tolerate them is
/// the caller's call.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Frame {
    pub payload: Vec<u8>,
    pub fin: bool,
    pub rsv1: bool,
    pub rsv2: bool,
    pub rsv3: bool,
    pub opcode: u8,
    pub masked: bool,
    pub masking_key: [u8; 4],
}

impl Frame {
    /// Creates an unfragmented text frame.
    pub fn text(payload: Vec<u8>) -> Self {
        Frame {
            payload,
            fin: true,
            opcode: opcode::TEXT,
            ..Frame::default()
        }
    }

    /// Creates an unfragmented binary frame.
    pub fn binary(payload: Vec<u8>) -> Self {
        Frame {
            payload,
            fin: true,
            opcode: opcode::BINARY,
            ..Frame::default()
        }
    }

    /// Serializes the frame: two header bytes, the extended payload
    /// length, the masking key when present, then the payload verbatim.
    ///
    /// The caller is responsible for masking the payload beforehand
    /// when the mask flag is set.
    pub fn encode_bytes(&self) -> Vec<u8> {
        let pl = self.payload.len();

        let epl = match pl {
            0..=125 => 0,
            126..=0xFFFF => 2,
            _ => 8,
        };

        let mut data = Vec::with_capacity(2 + epl + if self.masked { 4 } else { 0 } + pl);

        let mut b0 = self.opcode & 0x0F;
        if self.fin {
            b0 |= 0x80;
        }
        if self.rsv1 {
            b0 |= 0x40;
        }
        if self.rsv2 {
            b0 |= 0x20;
        }
        if self.rsv3 {
            b0 |= 0x10;
        }

        let mut b1: u8 = if self.masked { 0x80 } else { 0 };
        b1 |= match epl {
            2 => 126,
            8 => 127,
            _ => pl as u8,
        };

        data.push(b0);
        data.push(b1);

        match epl {
            2 => data.extend_from_slice(&(pl as u16).to_be_bytes()),
            8 => data.extend_from_slice(&(pl as u64).to_be_bytes()),
            _ => {}
        }

        if self.masked {
            data.extend_from_slice(&self.masking_key);
        }

        data.extend_from_slice(&self.payload);

        data
    }

    /// Writes the serialized frame to `w`.
    pub async fn encode<W>(&self, w: &mut W) -> io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        w.write_all(&self.encode_bytes()).await
    }

    /// Reads one frame from `buf`.
    ///
    /// Each stage of the header takes exactly the bytes it needs,
    /// refilling the ring from the source as required; a source that
    /// ends mid-frame is a short read.
    pub async fn decode<R>(&mut self, buf: &mut ConnBuf<R>) -> io::Result<()>
    where
        R: AsyncRead + Unpin,
    {
        let mut head = [0u8; 2];
        read_exact_from(buf, &mut head).await?;

        self.fin = head[0] & 0x80 != 0;
        self.rsv1 = head[0] & 0x40 != 0;
        self.rsv2 = head[0] & 0x20 != 0;
        self.rsv3 = head[0] & 0x10 != 0;
        self.opcode = head[0] & 0x0F;
        self.masked = head[1] & 0x80 != 0;

        let payload_len = match head[1] & 0x7F {
            126 => {
                let mut ext = [0u8; 2];
                read_exact_from(buf, &mut ext).await?;
                u64::from(u16::from_be_bytes(ext))
            }
            127 => {
                let mut ext = [0u8; 8];
                read_exact_from(buf, &mut ext).await?;
                let len = u64::from_be_bytes(ext);
                // The most significant bit must be zero.
                if len > i64::MAX as u64 {
                    return Err(bad_frame());
                }
                len
            }
            len => u64::from(len),
        };

        if opcode::is_control(self.opcode) && (payload_len > 125 || !self.fin) {
            return Err(bad_frame());
        }

        let payload_len = usize::try_from(payload_len).map_err(|_| bad_frame())?;

        if self.masked {
            read_exact_from(buf, &mut self.masking_key).await?;
        } else {
            self.masking_key = [0; 4];
        }

        self.payload = vec![0u8; payload_len];
        read_exact_from(buf, &mut self.payload).await?;

        Ok(())
    }

    /// Masks an unmasked payload, or unmasks a masked one: the XOR
    /// transform is its own inverse. Toggles the mask flag.
    pub fn apply_mask(&mut self) {
        for (i, b) in self.payload.iter_mut().enumerate() {
            *b ^= self.masking_key[i % 4];
        }

        self.masked = !self.masked;
    }

    /// The same transform as [`Frame::apply_mask`], XORing eight bytes
    /// at a time.
    ///
    /// The key is tiled into a native-endian word, which keeps the
    /// result byte-identical to the scalar loop; trailing bytes fall
    /// back to it.
    pub fn apply_mask_words(&mut self) {
        let k = self.masking_key;
        let tile = u64::from_ne_bytes([k[0], k[1], k[2], k[3], k[0], k[1], k[2], k[3]]);

        let mut chunks = self.payload.chunks_exact_mut(8);
        for chunk in chunks.by_ref() {
            let mut word = [0u8; 8];
            word.copy_from_slice(chunk);
            chunk.copy_from_slice(&(u64::from_ne_bytes(word) ^ tile).to_ne_bytes());
        }

        for (i, b) in chunks.into_remainder().iter_mut().enumerate() {
            *b ^= k[i % 4];
        }

        self.masked = !self.masked;
    }

    /// Fills the masking key from a cryptographically secure generator.
    pub fn new_masking_key(&mut self) {
        let mut rng = StdRng::from_entropy();
        rng.fill_bytes(&mut self.masking_key);
    }
}

/// Reads exactly `dst.len()` bytes out of the buffer, refilling from
/// the source between ring drains.
async fn read_exact_from<R>(buf: &mut ConnBuf<R>, dst: &mut [u8]) -> io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut read = 0;

    while read < dst.len() {
        read += buf.read(&mut dst[read..])?;

        if read < dst.len() && buf.fill().await? == 0 {
            return Err(short_read());
        }
    }

    Ok(())
}

/// Serialized close frame; a zero status yields an empty payload.
///
/// Like every control-frame factory, an encoding that would not fit the
/// 7-bit length comes back empty.
pub fn close_frame(status: u16, reason: &str) -> Vec<u8> {
    let mut f = Frame {
        fin: true,
        opcode: opcode::CLOSE,
        ..Frame::default()
    };

    if status != 0 {
        f.payload.extend_from_slice(&status.to_be_bytes());
        f.payload.extend_from_slice(reason.as_bytes());
    }

    control_frame(&f)
}

/// Serialized ping frame.
pub fn ping_frame() -> Vec<u8> {
    control_frame(&Frame {
        fin: true,
        opcode: opcode::PING,
        ..Frame::default()
    })
}

/// Serialized pong frame.
pub fn pong_frame() -> Vec<u8> {
    control_frame(&Frame {
        fin: true,
        opcode: opcode::PONG,
        ..Frame::default()
    })
}

fn control_frame(f: &Frame) -> Vec<u8> {
    let data = f.encode_bytes();
    if data.len() > 125 {
        return Vec::new();
    }

    data
}
