//! Header/body message codec over a byte-stream connection.

use std::future::Future;
use std::marker::PhantomData;

use ntex_bytes::BytesMut;
use ntex_codec::Decoder;
use rkyv::util::AlignedVec;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};

use beacon_core::{CodecError, Header, Message, TransportError};

use crate::encoding::{Encoding, Format, Rkyv};
use crate::frame::{FrameCodec, LENGTH_PREFIX};

/// Bytes requested from the connection per read.
const READ_CHUNK: usize = 8 * 1024;

/// Capability set for framing RPC exchanges on one connection.
///
/// An exchange is a [`Header`] followed by a body. Reading is split in two
/// so the caller can pick the body type after inspecting the header:
/// `read_header` must come before the matching `read_body`.
///
/// Any error returned by these methods leaves the connection unusable;
/// open a new one to retry.
pub trait Codec: Send {
    /// Wire encoding used for both header and body.
    type Format: Format + Encoding<Header>;

    /// Decode the next header from the connection.
    fn read_header(&mut self) -> impl Future<Output = Result<Header, CodecError>> + Send;

    /// Decode the body that follows the last header.
    fn read_body<B>(&mut self) -> impl Future<Output = Result<B, CodecError>> + Send
    where
        Self::Format: Encoding<B>,
        B: Send;

    /// Write a header and body, flushing once.
    ///
    /// On failure the connection is closed before the error is returned.
    fn write<B>(
        &mut self,
        header: &Header,
        body: &B,
    ) -> impl Future<Output = Result<(), CodecError>> + Send
    where
        Self::Format: Encoding<B>,
        B: Sync;

    /// Close the underlying connection.
    ///
    /// Calling this twice is not guaranteed to succeed.
    fn close(&mut self) -> impl Future<Output = Result<(), CodecError>> + Send;

    /// Read a header and its body in order.
    fn read_message<B>(&mut self) -> impl Future<Output = Result<Message<B>, CodecError>> + Send
    where
        Self::Format: Encoding<B>,
        B: Send,
    {
        async move {
            let header = self.read_header().await?;
            let body = self.read_body().await?;
            Ok(Message { header, body })
        }
    }

    /// Write a whole message.
    fn write_message<B>(
        &mut self,
        message: &Message<B>,
    ) -> impl Future<Output = Result<(), CodecError>> + Send
    where
        Self::Format: Encoding<B>,
        B: Sync,
    {
        self.write(&message.header, &message.body)
    }
}

/// [`Codec`] writing each value as one length-prefixed frame.
///
/// Output goes through a buffered writer; reads accumulate in a local
/// buffer until a whole frame is available.
///
/// ## Example
///
/// ```rust,ignore
/// use beacon_codec::{Codec, FramedCodec};
/// use beacon_core::Header;
///
/// let stream = tokio::net::TcpStream::connect("127.0.0.1:9999").await?;
/// let mut codec = FramedCodec::new(stream);
/// codec.write(&Header::new("Arith.Multiply", 1), &(3i32, 4i32)).await?;
///
/// let header = codec.read_header().await?;
/// let product: i32 = codec.read_body().await?;
/// ```
pub struct FramedCodec<S, F = Rkyv> {
    io: BufWriter<S>,
    read_buf: BytesMut,
    frame: FrameCodec,
    _format: PhantomData<fn() -> F>,
}

impl<S, F> FramedCodec<S, F>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
    F: Format + Encoding<Header>,
{
    /// Wrap a connection with the default frame size limit.
    #[must_use]
    pub fn new(io: S) -> Self {
        Self::with_frame_codec(io, FrameCodec::new())
    }

    /// Wrap a connection with a custom maximum frame size.
    #[must_use]
    pub fn with_max_frame_size(io: S, max_frame_size: usize) -> Self {
        Self::with_frame_codec(io, FrameCodec::with_max_frame_size(max_frame_size))
    }

    fn with_frame_codec(io: S, frame: FrameCodec) -> Self {
        Self {
            io: BufWriter::new(io),
            read_buf: BytesMut::with_capacity(READ_CHUNK),
            frame,
            _format: PhantomData,
        }
    }

    /// Content type of the wire encoding.
    #[must_use]
    pub fn content_type(&self) -> &'static str {
        F::CONTENT_TYPE
    }

    /// Borrow the underlying connection.
    #[must_use]
    pub fn get_ref(&self) -> &S {
        self.io.get_ref()
    }

    /// Unwrap the connection. Buffered but unflushed output is dropped.
    #[must_use]
    pub fn into_inner(self) -> S {
        self.io.into_inner()
    }

    async fn read_frame(&mut self) -> Result<AlignedVec, CodecError> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            if let Some(frame) = self.frame.decode(&mut self.read_buf)? {
                return Ok(frame);
            }

            let n = self.io.read(&mut chunk).await?;
            if n == 0 {
                if self.read_buf.is_empty() {
                    return Err(TransportError::ConnectionClosed.into());
                }
                return Err(CodecError::InvalidFrame(format!(
                    "connection closed with {} bytes of a partial frame buffered",
                    self.read_buf.len()
                )));
            }
            self.read_buf.extend_from_slice(&chunk[..n]);
        }
    }

    async fn buffer_frames<B>(&mut self, header: &Header, body: &B) -> Result<(), CodecError>
    where
        F: Encoding<B>,
    {
        // Encode both before buffering so a failure never leaves half an exchange behind.
        let header_bytes = <F as Encoding<Header>>::encode(header).inspect_err(|e| {
            tracing::error!(error = %e, "rpc codec: error encoding header");
        })?;
        let body_bytes = <F as Encoding<B>>::encode(body).inspect_err(|e| {
            tracing::error!(error = %e, "rpc codec: error encoding body");
        })?;

        let mut buf =
            BytesMut::with_capacity(2 * LENGTH_PREFIX + header_bytes.len() + body_bytes.len());
        self.frame.encode_slice(&header_bytes, &mut buf)?;
        self.frame.encode_slice(&body_bytes, &mut buf)?;

        self.io.write_all(&buf[..]).await?;
        Ok(())
    }
}

impl<S, F> Codec for FramedCodec<S, F>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
    F: Format + Encoding<Header>,
{
    type Format = F;

    async fn read_header(&mut self) -> Result<Header, CodecError> {
        let frame = self.read_frame().await?;
        <F as Encoding<Header>>::decode(&frame)
    }

    async fn read_body<B>(&mut self) -> Result<B, CodecError>
    where
        F: Encoding<B>,
        B: Send,
    {
        let frame = self.read_frame().await?;
        <F as Encoding<B>>::decode(&frame)
    }

    async fn write<B>(&mut self, header: &Header, body: &B) -> Result<(), CodecError>
    where
        F: Encoding<B>,
        B: Sync,
    {
        let buffered = self.buffer_frames(header, body).await;
        // Flush whether or not encoding succeeded.
        let flushed = self.io.flush().await.map_err(CodecError::from);
        let result = buffered.and(flushed);

        if let Err(e) = &result {
            tracing::error!(
                service_method = %header.service_method,
                seq = header.seq,
                error = %e,
                "rpc codec: write failed, closing connection"
            );
            if let Err(close_err) = self.close().await {
                tracing::debug!(error = %close_err, "rpc codec: close after failed write");
            }
        }
        result
    }

    async fn close(&mut self) -> Result<(), CodecError> {
        self.io.shutdown().await?;
        Ok(())
    }
}
