//! Capture time lookup from photograph metadata.
//!
//! Tag extraction from image files is left to the caller, which hands over
//! whatever key/value view of the tags it already has.

use chrono::NaiveDateTime;
use std::collections::{BTreeMap, HashMap};

/// Tag holding the instant the shutter fired.
pub const DATE_TIME_ORIGINAL: &str = "EXIF DateTimeOriginal";

const EXIF_DATE_TIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// Read access to the tags of one photograph.
pub trait ExifLookup {
    fn tag(&self, key: &str) -> Option<String>;
}

impl ExifLookup for HashMap<String, String> {
    fn tag(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl ExifLookup for BTreeMap<String, String> {
    fn tag(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// The local instant a photograph was taken, if its tags record one.
pub fn capture_time(lookup: &impl ExifLookup) -> Option<NaiveDateTime> {
    let value = lookup.tag(DATE_TIME_ORIGINAL)?;
    NaiveDateTime::parse_from_str(value.trim(), EXIF_DATE_TIME_FORMAT).ok()
}
