use crate::{
    config::ConfigError, correlate::CorrelateError, sampler::SampleError, scan::ScanError,
    solar::SolarError,
};
use thiserror::Error;

/// Coarse classification shared by every error in the crate.
///
/// Callers use the kind to decide whether to abandon a dataset
/// (`ConfigInvalid`), skip a capture (`NotFound`), skip a single sample
/// (`OutOfBounds`) or fix their request (`UnsupportedParameter`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ConfigInvalid,
    NotFound,
    OutOfBounds,
    UnsupportedParameter,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Correlate(#[from] CorrelateError),
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error(transparent)]
    Sample(#[from] SampleError),
    #[error(transparent)]
    Solar(#[from] SolarError),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config(err) => err.kind(),
            Error::Correlate(err) => err.kind(),
            Error::Scan(err) => err.kind(),
            Error::Sample(err) => err.kind(),
            Error::Solar(err) => err.kind(),
        }
    }
}
