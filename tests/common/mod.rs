#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::{Value, json};
use std::{
    f64::consts::FRAC_PI_2,
    fs,
    path::{Path, PathBuf},
};
use tempfile::TempDir;

pub const PATTERN: [[f64; 2]; 7] = [
    [0., 90.],
    [0., 53.75],
    [90., 53.75],
    [180., 53.75],
    [270., 53.75],
    [0., 12.1151],
    [180., 12.1151],
];

pub fn config_json(epsilon: f64) -> Value {
    json!({
        "CaptureEpsilon": epsilon,
        "SpectrumStart": 350,
        "SpectrumEnd": 1000,
        "SamplingPattern": PATTERN,
        "Exposures": [0.000125, 0.001, 0.008, 0.066666, 0.5],
        "Lens": {
            "Linearity": [0, 0, 0, 1.0 / FRAC_PI_2, 0],
            "Inverse": [0, 0, 0, FRAC_PI_2, 0]
        },
        "SkyCover": [
            ["06/01/2017", "10:00", "11:30", "CLR"],
            ["06/01/2017", "11:31", "13:00", "SCT"]
        ],
        "SPA": {
            "time_zone": -4,
            "delta_ut1": 0,
            "delta_t": 68,
            "longitude": -81.2001,
            "latitude": 28.6024,
            "elevation": 30,
            "pressure": 1013,
            "temperature": 25,
            "slope": 0,
            "azm_rotation": 0,
            "atmos_refract": 0.5667
        }
    })
}

pub fn at(hour: u32, minute: u32, second: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2017, 6, 1)
        .unwrap()
        .and_hms_opt(hour, minute, second)
        .unwrap()
}

/// A dataset directory tree in a temporary directory.
pub struct Dataset {
    dir: TempDir,
}

impl Dataset {
    pub fn new(epsilon: f64) -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("config.json"),
            config_json(epsilon).to_string(),
        )
        .unwrap();
        Self { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Write `count` scans recorded at `time` on 2017-06-01.
    pub fn with_scans(self, time: &str, count: usize) -> Self {
        let dir = self.root().join("2017-06-01").join("ASD").join(time);
        fs::create_dir_all(&dir).unwrap();
        for index in 0..count {
            fs::write(dir.join(format!("{index}_00000.asd.rad.txt")), scan(index)).unwrap();
        }
        self
    }

    /// Write an empty photograph named `name` on 2017-06-01.
    pub fn with_photo_file(self, name: &str) -> Self {
        let dir = self.photo_dir();
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(name), b"").unwrap();
        self
    }

    /// Write an exposure bracket of `count` empty photographs taken at `time`.
    pub fn with_bracket(self, time: &str, count: usize) -> Self {
        let dir = self.photo_dir().join(time);
        fs::create_dir_all(&dir).unwrap();
        for index in 0..count {
            fs::write(dir.join(format!("IMG_{:04}.JPG", index + 1)), b"").unwrap();
        }
        self
    }

    pub fn photo_dir(&self) -> PathBuf {
        self.root().join("2017-06-01").join("HDR")
    }
}

/// Scan text whose radiance encodes the sampling pattern index.
fn scan(index: usize) -> String {
    let mut text = String::from("Wavelength\tradiance\n");
    for wavelength in (300..=1100).step_by(50) {
        text.push_str(&format!("{wavelength}\t{}\n", index as f64 + 0.5));
    }
    text
}
