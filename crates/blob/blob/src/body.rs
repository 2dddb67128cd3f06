use std::fmt;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use futures::stream::{self, BoxStream, Stream, StreamExt};

use crate::error::BlobError;

/// Largest buffer `collect_exact` reserves up front, whatever size the
/// caller declared.
const PREALLOC_LIMIT: usize = 8 * 1024 * 1024;

/// A payload travelling into or out of a [`BlobStore`](crate::BlobStore).
///
/// Wraps a boxed stream of byte chunks so uploads and downloads never need to
/// be fully buffered by the caller. Backends that can only accept a single
/// buffer (for example an object store that needs the full body for
/// signing) use [`collect_exact`](Self::collect_exact).
pub struct BlobBody {
    inner: BoxStream<'static, io::Result<Bytes>>,
}

impl BlobBody {
    /// A body yielding `data` as a single chunk.
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        Self {
            inner: stream::once(async move { Ok(data) }).boxed(),
        }
    }

    /// A body yielding no bytes.
    pub fn empty() -> Self {
        Self {
            inner: stream::empty().boxed(),
        }
    }

    /// Wrap an arbitrary chunk stream.
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        Self {
            inner: stream.boxed(),
        }
    }

    /// Unwrap into the underlying chunk stream.
    pub fn into_stream(self) -> BoxStream<'static, io::Result<Bytes>> {
        self.inner
    }

    /// Read the whole body into memory.
    pub async fn collect(mut self) -> io::Result<Bytes> {
        let mut buf = BytesMut::new();
        while let Some(chunk) = self.inner.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(buf.freeze())
    }

    /// Read the whole body, requiring exactly `expected` bytes.
    ///
    /// Reading stops as soon as the stream overruns `expected`, so an
    /// oversized upload is never buffered past the declared size.
    pub async fn collect_exact(mut self, expected: u64) -> Result<Bytes, BlobError> {
        let reserve = usize::try_from(expected)
            .unwrap_or(usize::MAX)
            .min(PREALLOC_LIMIT);
        let mut buf = BytesMut::with_capacity(reserve);

        while let Some(chunk) = self.inner.next().await {
            let chunk = chunk.map_err(|e| BlobError::Payload(e.to_string()))?;
            buf.extend_from_slice(&chunk);
            if buf.len() as u64 > expected {
                return Err(BlobError::SizeMismatch {
                    expected,
                    actual: buf.len() as u64,
                });
            }
        }

        if buf.len() as u64 != expected {
            return Err(BlobError::SizeMismatch {
                expected,
                actual: buf.len() as u64,
            });
        }

        Ok(buf.freeze())
    }
}

impl Stream for BlobBody {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl From<Bytes> for BlobBody {
    fn from(data: Bytes) -> Self {
        Self::from_bytes(data)
    }
}

impl From<Vec<u8>> for BlobBody {
    fn from(data: Vec<u8>) -> Self {
        Self::from_bytes(data)
    }
}

impl fmt::Debug for BlobBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlobBody").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunked(parts: &[&'static [u8]]) -> BlobBody {
        let chunks: Vec<io::Result<Bytes>> =
            parts.iter().map(|p| Ok(Bytes::from_static(p))).collect();
        BlobBody::from_stream(stream::iter(chunks))
    }

    #[tokio::test]
    async fn collect_concatenates_chunks() {
        let body = chunked(&[b"hello ", b"world"]);
        assert_eq!(body.collect().await.unwrap(), Bytes::from_static(b"hello world"));
    }

    #[tokio::test]
    async fn collect_exact_accepts_matching_size() {
        let body = chunked(&[b"abc", b"def"]);
        let data = body.collect_exact(6).await.unwrap();
        assert_eq!(&data[..], b"abcdef");
    }

    #[tokio::test]
    async fn collect_exact_rejects_short_body() {
        let body = chunked(&[b"abc"]);
        let err = body.collect_exact(10).await.unwrap_err();
        assert!(matches!(
            err,
            BlobError::SizeMismatch {
                expected: 10,
                actual: 3
            }
        ));
    }

    #[tokio::test]
    async fn collect_exact_stops_on_overrun() {
        let body = chunked(&[b"abcd", b"efgh", b"ijkl"]);
        let err = body.collect_exact(5).await.unwrap_err();
        assert!(matches!(
            err,
            BlobError::SizeMismatch {
                expected: 5,
                actual: 8
            }
        ));
    }

    #[tokio::test]
    async fn collect_exact_surfaces_stream_errors() {
        let body = BlobBody::from_stream(stream::iter(vec![
            Ok(Bytes::from_static(b"abc")),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "client gone")),
        ]));
        let err = body.collect_exact(3).await.unwrap_err();
        assert!(matches!(err, BlobError::Payload(_)));
    }

    #[tokio::test]
    async fn empty_body_has_no_bytes() {
        assert!(BlobBody::empty().collect().await.unwrap().is_empty());
        assert!(BlobBody::empty().collect_exact(0).await.is_ok());
    }
}
