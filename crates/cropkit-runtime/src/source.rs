//! Image sources: the decode capability the loader and compositor use.
//!
//! An [`ImageSource`] knows its pixel size and can asynchronously produce a
//! [`DecodeResult`] for a [`DecodeRequest`]. Returning `None` means the
//! decode failed; callers treat that as a miss, never as a partial tile.

use std::fs::File;
use std::future::Future;
use std::io::{self, BufRead, BufReader, Cursor, Seek};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cropkit_core::decode::{
    decode_full, decode_region, probe_size, sample_raster, DecodeError, DecodeRequest,
    DecodeResult, FilterType, Raster,
};
use cropkit_core::IntSize;
use log::{debug, warn};

/// Boxed future returned by [`ImageSource::open`].
pub type DecodeFuture<'a> = Pin<Box<dyn Future<Output = Option<DecodeResult>> + Send + 'a>>;

pub trait ImageSource: Send + Sync {
    /// Raw pixel size of the image.
    fn size(&self) -> IntSize;

    /// Decode at least `request.subset` at `request.sample_size`.
    ///
    /// The result's request may name a larger subset than asked for.
    fn open(&self, request: DecodeRequest) -> DecodeFuture<'_>;
}

/// Re-openable byte stream holding an encoded image.
pub trait ImageStream: Send + Sync + 'static {
    type Reader: BufRead + Seek + Send;

    fn open_stream(&self) -> io::Result<Self::Reader>;
}

/// An encoded image file on disk.
#[derive(Debug, Clone)]
pub struct FileStream {
    path: PathBuf,
}

impl FileStream {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl ImageStream for FileStream {
    type Reader = BufReader<File>;

    fn open_stream(&self) -> io::Result<Self::Reader> {
        File::open(&self.path).map(BufReader::new)
    }
}

/// An encoded image held in memory.
#[derive(Debug, Clone)]
pub struct BytesStream {
    bytes: Arc<[u8]>,
}

impl BytesStream {
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }
}

impl ImageStream for BytesStream {
    type Reader = Cursor<Arc<[u8]>>;

    fn open_stream(&self) -> io::Result<Self::Reader> {
        Ok(Cursor::new(self.bytes.clone()))
    }
}

/// Decodes requests from an [`ImageStream`].
///
/// Requests outside the header size are rejected up front. Region
/// decodes are tried first; after the first codec failure the source
/// switches to full decodes at the requested sample size for good.
pub struct StreamImageSource<S> {
    stream: Arc<S>,
    size: IntSize,
    allow_region: Arc<AtomicBool>,
    filter: FilterType,
}

impl<S: ImageStream> StreamImageSource<S> {
    /// Probe the stream's size. Returns `None` if the header cannot be read.
    pub async fn new(stream: S, filter: FilterType) -> Option<Self> {
        let stream = Arc::new(stream);
        let probe = stream.clone();
        let size = tokio::task::spawn_blocking(move || -> Result<IntSize, DecodeError> {
            probe_size(probe.open_stream()?)
        })
        .await;
        match size {
            Ok(Ok(size)) if !size.is_empty() => Some(Self {
                stream,
                size,
                allow_region: Arc::new(AtomicBool::new(true)),
                filter,
            }),
            Ok(Ok(_)) => None,
            Ok(Err(e)) => {
                warn!("could not read image header: {}", e);
                None
            }
            Err(e) => {
                warn!("image probe task failed: {}", e);
                None
            }
        }
    }

    /// False once a region decode has failed to read the stream.
    pub fn region_decoding_enabled(&self) -> bool {
        self.allow_region.load(Ordering::Acquire)
    }
}

impl<S: ImageStream> ImageSource for StreamImageSource<S> {
    fn size(&self) -> IntSize {
        self.size
    }

    fn open(&self, request: DecodeRequest) -> DecodeFuture<'_> {
        let stream = self.stream.clone();
        let size = self.size;
        let allow_region = self.allow_region.clone();
        let filter = self.filter;
        Box::pin(async move {
            let decoded = tokio::task::spawn_blocking(move || {
                decode_stream(&*stream, size, request, &allow_region, filter)
            })
            .await;
            match decoded {
                Ok(result) => result,
                Err(e) => {
                    warn!("decode task failed: {}", e);
                    None
                }
            }
        })
    }
}

fn decode_stream<S: ImageStream>(
    stream: &S,
    size: IntSize,
    request: DecodeRequest,
    allow_region: &AtomicBool,
    filter: FilterType,
) -> Option<DecodeResult> {
    if request.sample_size == 0
        || request.subset.is_empty()
        || !size.to_int_rect().contains_inclusive(&request.subset)
    {
        warn!("rejecting decode request {:?} for {:?} image", request, size);
        return None;
    }
    if allow_region.load(Ordering::Acquire) {
        let region = stream
            .open_stream()
            .map_err(DecodeError::from)
            .and_then(|reader| decode_region(reader, &request, filter));
        match region {
            Ok(raster) => return Some(DecodeResult { request, raster }),
            Err(e @ (DecodeError::RegionOutOfBounds { .. } | DecodeError::InvalidRequest(_))) => {
                warn!("region decode rejected: {}", e);
                return None;
            }
            Err(e) => {
                warn!("region decode failed, falling back to full decode: {}", e);
                allow_region.store(false, Ordering::Release);
            }
        }
    }
    let full = stream
        .open_stream()
        .map_err(DecodeError::from)
        .and_then(|reader| decode_full(reader, request.sample_size, filter));
    match full {
        Ok((full, raster)) if full.covers(&request) => {
            debug!(
                "full decode at sample size {} ({} bytes)",
                full.sample_size,
                raster.byte_size()
            );
            Some(DecodeResult {
                request: full,
                raster,
            })
        }
        Ok((full, _)) => {
            warn!("full decode {:?} does not cover {:?}", full, request);
            None
        }
        Err(e) => {
            warn!("full decode failed: {}", e);
            None
        }
    }
}

/// Serves requests from an already decoded raster.
#[derive(Debug, Clone)]
pub struct RasterImageSource {
    raster: Arc<Raster>,
    filter: FilterType,
}

impl RasterImageSource {
    pub fn new(raster: Raster, filter: FilterType) -> Self {
        Self {
            raster: Arc::new(raster),
            filter,
        }
    }
}

impl ImageSource for RasterImageSource {
    fn size(&self) -> IntSize {
        self.raster.size()
    }

    fn open(&self, request: DecodeRequest) -> DecodeFuture<'_> {
        let raster = self.raster.clone();
        let filter = self.filter;
        Box::pin(async move {
            let sampled =
                tokio::task::spawn_blocking(move || sample_raster(&raster, &request, filter)).await;
            match sampled {
                Ok(Ok(raster)) => Some(DecodeResult { request, raster }),
                Ok(Err(e)) => {
                    warn!("raster sampling failed: {}", e);
                    None
                }
                Err(e) => {
                    warn!("raster sampling task failed: {}", e);
                    None
                }
            }
        })
    }
}
