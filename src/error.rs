/// Error types for the fallible edges of the renderer.
/// Frame rendering itself never fails; only asset ingestion does.
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnvironmentError {
    #[error("failed to decode environment image {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("environment image is {width}x{height} but holds {len} texels")]
    InvalidImage {
        width: usize,
        height: usize,
        len: usize,
    },

    #[error("environment image is empty ({width}x{height})")]
    Empty { width: usize, height: usize },
}
