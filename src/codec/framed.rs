use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::config::Limits;
use crate::connection::Role;
use crate::error::{Error, Result};
use crate::protocol::frame::{BaseHeader, check_control};
use crate::protocol::mask::apply_mask;
use crate::protocol::Frame;

/// Generate a random seed for mask generation.
/// Falls back to system time if getrandom fails.
fn random_mask_seed() -> u32 {
    let mut buf = [0u8; 4];
    if getrandom::getrandom(&mut buf).is_ok() {
        u32::from_le_bytes(buf)
    } else {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u32)
            .unwrap_or(0x1234_5678)
    }
}

/// Decodes frames one at a time from the read half of a transport.
///
/// Reads exactly as many bytes as each frame needs, so wrap raw sockets in a
/// `BufReader` to avoid a syscall per header field.
pub struct FrameReader<R> {
    io: R,
    limits: Limits,
}

impl<R> FrameReader<R> {
    #[must_use]
    pub fn new(io: R, limits: Limits) -> Self {
        Self { io, limits }
    }

    #[must_use]
    pub fn get_ref(&self) -> &R {
        &self.io
    }

    #[must_use]
    pub fn into_inner(self) -> R {
        self.io
    }
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Read the next frame.
    ///
    /// # Errors
    ///
    /// - `Error::ConnectionClosed` if the stream ends before the first header byte
    /// - `Error::TruncatedStream` if it ends anywhere inside a frame
    /// - `Error::FrameTooLarge` if the declared length exceeds
    ///   `limits.max_frame_size`; no payload buffer is allocated in that case
    /// - `Error::FragmentedControlFrame` / `Error::ControlFrameTooLarge` for
    ///   control frames breaking RFC 6455 section 5.5
    /// - header errors from [`OpCode::from_u8`](crate::protocol::OpCode::from_u8)
    pub async fn read_frame(&mut self) -> Result<Frame> {
        let mut head = [0u8; 2];
        if self.io.read(&mut head[..1]).await? == 0 {
            return Err(Error::ConnectionClosed);
        }
        self.io.read_exact(&mut head[1..]).await?;
        let base = BaseHeader::decode(head[0], head[1])?;

        let mut ext = [0u8; 8];
        let ext = &mut ext[..base.extended_len_size()];
        self.io.read_exact(ext).await?;
        let declared = base.payload_len(ext)?;

        self.limits.check_frame_size(declared)?;
        check_control(base.opcode, base.fin, declared)?;

        let mask = if base.masked {
            let mut key = [0u8; 4];
            self.io.read_exact(&mut key).await?;
            Some(key)
        } else {
            None
        };

        // Bounded by max_frame_size above.
        let mut payload = vec![0u8; declared as usize];
        if !payload.is_empty() {
            self.io.read_exact(&mut payload).await?;
            if let Some(key) = mask {
                apply_mask(&mut payload, key);
            }
        }

        Ok(Frame::new(base.fin, base.opcode, payload).with_mask(mask))
    }
}

/// Encodes frames onto the write half of a transport.
///
/// Clients mask every frame with a fresh key; servers never mask.
pub struct FrameWriter<W> {
    io: W,
    role: Role,
    buf: BytesMut,
    mask_counter: u32,
}

impl<W> FrameWriter<W> {
    #[must_use]
    pub fn new(io: W, role: Role) -> Self {
        Self {
            io,
            role,
            buf: BytesMut::with_capacity(4096),
            mask_counter: random_mask_seed(),
        }
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    #[must_use]
    pub fn get_ref(&self) -> &W {
        &self.io
    }

    #[must_use]
    pub fn into_inner(self) -> W {
        self.io
    }

    fn generate_mask(&mut self) -> [u8; 4] {
        self.mask_counter = self.mask_counter.wrapping_add(0x9E37_79B9);
        let a = self.mask_counter;
        let b = a.wrapping_mul(0x85EB_CA6B);
        let c = b ^ (b >> 13);
        let d = c.wrapping_mul(0xC2B2_AE35);
        d.to_le_bytes()
    }
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    /// Encode `frame` and write it with a single `write_all`, then flush.
    ///
    /// Any mask already set on `frame` is replaced according to the role.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the transport fails.
    pub async fn write_frame(&mut self, frame: Frame) -> Result<()> {
        let mask = self.role.must_mask().then(|| self.generate_mask());
        let frame = frame.with_mask(mask);

        self.buf.clear();
        frame.encode_into(&mut self.buf);
        self.io.write_all(&self.buf).await?;
        self.io.flush().await?;
        Ok(())
    }

    /// Shut down the write direction of the transport.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the transport fails.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.io.shutdown().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::OpCode;

    fn reader(data: &[u8]) -> FrameReader<&[u8]> {
        FrameReader::new(data, Limits::default())
    }

    #[tokio::test]
    async fn test_read_unmasked_hello() {
        let data = [0x81, 0x05, 0x48, 0x65, 0x6c, 0x6c, 0x6f];
        let frame = reader(&data).read_frame().await.unwrap();
        assert!(frame.fin);
        assert_eq!(frame.opcode, OpCode::Text);
        assert_eq!(frame.mask, None);
        assert_eq!(frame.payload(), b"Hello");
    }

    #[tokio::test]
    async fn test_read_masked_hello() {
        let data = [0x81, 0x85, 0x37, 0xfa, 0x21, 0x3d, 0x7f, 0x9f, 0x4d, 0x51, 0x58];
        let frame = reader(&data).read_frame().await.unwrap();
        assert_eq!(frame.mask, Some([0x37, 0xfa, 0x21, 0x3d]));
        assert_eq!(frame.payload(), b"Hello");
    }

    #[tokio::test]
    async fn test_read_multiple_frames() {
        // "Hi" masked with [0x12, 0x34, 0x56, 0x78], then an unmasked ping.
        let data = [
            0x81, 0x82, 0x12, 0x34, 0x56, 0x78, 0x5a, 0x5d, //
            0x89, 0x00,
        ];
        let mut reader = reader(&data);
        assert_eq!(reader.read_frame().await.unwrap().payload(), b"Hi");

        let ping = reader.read_frame().await.unwrap();
        assert_eq!(ping.opcode, OpCode::Ping);
        assert!(ping.payload().is_empty());

        assert_eq!(reader.read_frame().await.unwrap_err(), Error::ConnectionClosed);
    }

    #[tokio::test]
    async fn test_read_16bit_length() {
        let mut data = vec![0x82, 0x7E, 0x01, 0x2C];
        data.extend(std::iter::repeat_n(0xAB, 300));
        let frame = reader(&data).read_frame().await.unwrap();
        assert_eq!(frame.payload().len(), 300);
        assert!(frame.payload().iter().all(|&b| b == 0xAB));
    }

    #[tokio::test]
    async fn test_clean_eof() {
        assert_eq!(reader(&[]).read_frame().await.unwrap_err(), Error::ConnectionClosed);
    }

    #[tokio::test]
    async fn test_truncated_stream() {
        let cases: [&[u8]; 4] = [
            &[0x81],
            &[0x81, 0x7E, 0x01],
            &[0x81, 0x85, 0x37, 0xfa],
            &[0x81, 0x05, 0x48, 0x65],
        ];
        for data in cases {
            let result = reader(data).read_frame().await;
            assert_eq!(result.unwrap_err(), Error::TruncatedStream, "input {data:02x?}");
        }
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected_from_header() {
        // Declares 2^40 bytes and supplies none of them.
        let data = [0x82, 0x7F, 0, 0, 0x01, 0, 0, 0, 0, 0];
        let result = reader(&data).read_frame().await;
        assert!(matches!(
            result,
            Err(Error::FrameTooLarge { size, .. }) if size == 1 << 40
        ));

        let mut small = FrameReader::new(&[0x82u8, 0x0A][..], Limits::new(8, 8, 1, 64));
        assert!(matches!(
            small.read_frame().await,
            Err(Error::FrameTooLarge { size: 10, max: 8 })
        ));
    }

    #[tokio::test]
    async fn test_msb_length_rejected() {
        let data = [0x82, 0x7F, 0x80, 0, 0, 0, 0, 0, 0, 1];
        let result = FrameReader::new(&data[..], Limits::new(usize::MAX, usize::MAX, 1, 64))
            .read_frame()
            .await;
        assert!(matches!(result, Err(Error::ProtocolError(_))));
    }

    #[tokio::test]
    async fn test_control_frame_rules() {
        let fragmented_ping = [0x09, 0x00];
        assert_eq!(
            reader(&fragmented_ping).read_frame().await.unwrap_err(),
            Error::FragmentedControlFrame
        );

        let mut big_ping = vec![0x89, 0x7E, 0x00, 0x7E];
        big_ping.extend([0u8; 126]);
        assert_eq!(
            reader(&big_ping).read_frame().await.unwrap_err(),
            Error::ControlFrameTooLarge(126)
        );
    }

    #[tokio::test]
    async fn test_reserved_bits_and_opcode() {
        assert_eq!(reader(&[0xC1, 0x00]).read_frame().await.unwrap_err(), Error::ReservedBitsSet);
        assert_eq!(
            reader(&[0x83, 0x00]).read_frame().await.unwrap_err(),
            Error::ReservedOpcode(0x3)
        );
    }

    #[tokio::test]
    async fn test_server_writes_unmasked() {
        let mut writer = FrameWriter::new(Vec::new(), Role::Server);
        writer.write_frame(Frame::text("Hello")).await.unwrap();
        assert_eq!(writer.get_ref(), &[0x81, 0x05, 0x48, 0x65, 0x6c, 0x6c, 0x6f]);
    }

    #[tokio::test]
    async fn test_server_ignores_frame_mask() {
        let mut writer = FrameWriter::new(Vec::new(), Role::Server);
        let frame = Frame::text("Hi").with_mask(Some([1, 2, 3, 4]));
        writer.write_frame(frame).await.unwrap();
        assert_eq!(writer.get_ref(), &[0x81, 0x02, b'H', b'i']);
    }

    #[tokio::test]
    async fn test_client_writes_masked() {
        let mut writer = FrameWriter::new(Vec::new(), Role::Client);
        let payload = bytes::Bytes::from_static(b"Hello");
        writer.write_frame(Frame::text(payload.clone())).await.unwrap();

        let written = writer.into_inner();
        assert_eq!(written[0], 0x81);
        assert_eq!(written[1], 0x85);
        assert_eq!(written.len(), 11);
        assert_eq!(payload, &b"Hello"[..]);

        let frame = reader(&written).read_frame().await.unwrap();
        assert_eq!(frame.payload(), b"Hello");
        assert_eq!(frame.mask.map(|m| m.to_vec()), Some(written[2..6].to_vec()));
    }

    #[tokio::test]
    async fn test_client_masks_vary() {
        let mut writer = FrameWriter::new(Vec::new(), Role::Client);
        for _ in 0..4 {
            writer.write_frame(Frame::binary(vec![0u8; 4])).await.unwrap();
        }
        let written = writer.into_inner();
        let masks: std::collections::HashSet<_> =
            written.chunks(10).map(|frame| frame[2..6].to_vec()).collect();
        assert_eq!(masks.len(), 4);
    }

    #[tokio::test]
    async fn test_shutdown() {
        let (a, mut b) = tokio::io::duplex(64);
        let mut writer = FrameWriter::new(a, Role::Server);
        writer.write_frame(Frame::close(Some(1000))).await.unwrap();
        writer.shutdown().await.unwrap();

        let mut out = Vec::new();
        b.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, [0x88, 0x02, 0x03, 0xE8]);
    }
}
