use image::ImageReader;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use thiserror::Error;
use urban_vision::{OwnedFrame, SourceError};

/// Largest accepted width or height, in pixels.
pub const MAX_SIDE: u32 = 4096;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("{path} has no pixels")]
    Empty { path: PathBuf },
    #[error("{path} is {width}x{height}, larger than {MAX_SIDE}x{MAX_SIDE}")]
    TooLarge { path: PathBuf, width: u32, height: u32 },
}

impl From<IngestError> for SourceError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::Io { source, .. } => SourceError::Io(source),
            other => SourceError::Decode(other.to_string()),
        }
    }
}

pub fn check_dimensions(path: &Path, width: u32, height: u32) -> Result<(), IngestError> {
    if width == 0 || height == 0 {
        return Err(IngestError::Empty { path: path.to_path_buf() });
    }
    if width > MAX_SIDE || height > MAX_SIDE {
        return Err(IngestError::TooLarge {
            path: path.to_path_buf(),
            width,
            height,
        });
    }
    Ok(())
}

fn reader<'a>(path: &Path, bytes: &'a [u8]) -> Result<ImageReader<Cursor<&'a [u8]>>, IngestError> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|source| IngestError::Io {
            path: path.to_path_buf(),
            source,
        })
}

/// Decodes an encoded image (PNG, JPEG, ...) into an RGB frame. The dimensions are
/// read from the header and checked before any pixel data is decoded.
pub fn decode_frame(path: &Path, bytes: &[u8]) -> Result<OwnedFrame, IngestError> {
    let decode_error = |source: image::ImageError| IngestError::Decode {
        path: path.to_path_buf(),
        source,
    };
    let (width, height) = reader(path, bytes)?.into_dimensions().map_err(decode_error)?;
    check_dimensions(path, width, height)?;

    let image = reader(path, bytes)?.decode().map_err(decode_error)?;
    Ok(OwnedFrame::from_dynamic_image(&image))
}

pub fn load_frame(path: &Path) -> Result<OwnedFrame, IngestError> {
    let bytes = std::fs::read(path).map_err(|source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    decode_frame(path, &bytes)
}
