//! Spectroradiometer scan files.
//!
//! A scan is a text file converted from the instrument's native format with
//! one header line followed by whitespace delimited `wavelength radiance`
//! rows.

use crate::error::ErrorKind;
use std::{
    fs::File,
    io::{self, BufRead, BufReader},
    ops::RangeInclusive,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("failed to read scan {path:?}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("failed to read scan: {0}")]
    Read(#[from] io::Error),
    #[error("scan line {line} is not a wavelength and radiance pair: {content:?}")]
    Malformed { line: usize, content: String },
    #[error("row step must be at least 1")]
    ZeroStep,
}

impl ScanError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScanError::ZeroStep => ErrorKind::UnsupportedParameter,
            _ => ErrorKind::NotFound,
        }
    }
}

/// Radiance measured by one scan, ordered as recorded.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Spectrum {
    wavelengths: Vec<f64>,
    radiances: Vec<f64>,
}

impl Spectrum {
    /// Load every `step`-th row of the scan at `path`.
    ///
    /// A `step` of 1 loads every row.
    pub fn load(path: impl AsRef<Path>, step: usize) -> Result<Self, ScanError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| ScanError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let spectrum = Self::from_reader(BufReader::new(file), step)?;
        debug!(?path, rows = spectrum.len(), "loaded scan");
        Ok(spectrum)
    }

    /// Read every `step`-th row following the header line of `reader`.
    ///
    /// The stride counts blank lines so that decimated reads select the same
    /// rows as the file's line numbering suggests.
    pub fn from_reader(reader: impl BufRead, step: usize) -> Result<Self, ScanError> {
        if step == 0 {
            return Err(ScanError::ZeroStep);
        }

        let mut spectrum = Self::default();
        for (index, line) in reader.lines().enumerate().skip(1).step_by(step) {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            let (wavelength, radiance) =
                parse_row(&line).ok_or_else(|| ScanError::Malformed {
                    line: index + 1,
                    content: line.clone(),
                })?;
            spectrum.wavelengths.push(wavelength);
            spectrum.radiances.push(radiance);
        }

        Ok(spectrum)
    }

    /// Wavelengths in nanometers.
    pub fn wavelengths(&self) -> &[f64] {
        &self.wavelengths
    }

    pub fn radiances(&self) -> &[f64] {
        &self.radiances
    }

    pub fn len(&self) -> usize {
        self.wavelengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wavelengths.is_empty()
    }

    /// `(wavelength, radiance)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.wavelengths
            .iter()
            .copied()
            .zip(self.radiances.iter().copied())
    }

    /// The rows whose wavelength falls within `range`.
    pub fn within(&self, range: &RangeInclusive<f64>) -> Self {
        let (wavelengths, radiances) = self
            .iter()
            .filter(|(wavelength, _)| range.contains(wavelength))
            .unzip();
        Self {
            wavelengths,
            radiances,
        }
    }
}

fn parse_row(line: &str) -> Option<(f64, f64)> {
    let mut tokens = line.split_whitespace();
    let wavelength = tokens.next()?.parse().ok()?;
    let radiance = tokens.next()?.parse().ok()?;
    match tokens.next() {
        Some(_) => None,
        None => Some((wavelength, radiance)),
    }
}
