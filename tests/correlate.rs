mod common;

use common::{Dataset, at};
use skydata::{correlate::CorrelateError, prelude::*};

fn correlator(dataset: &Dataset) -> Correlator {
    let config = Configuration::load_from_dataset(dataset.root()).unwrap();
    Correlator::new(dataset.root(), &config)
}

#[test]
fn photo_within_epsilon_matches() {
    let dataset = Dataset::new(300.).with_scans("12.00.00", 7);
    let dir = correlator(&dataset).find_scan_directory(at(12, 3, 0)).unwrap();
    assert_eq!(dir, dataset.root().join("2017-06-01/ASD/12.00.00"));
}

#[test]
fn photo_outside_epsilon_is_not_found() {
    let dataset = Dataset::new(300.).with_scans("12.00.00", 7);
    let err = correlator(&dataset)
        .find_scan_directory(at(12, 10, 0))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn nearest_of_several_directories() {
    let dataset = Dataset::new(60.)
        .with_scans("12.00.00", 7)
        .with_scans("12.05.00", 7);
    let correlator = correlator(&dataset);

    assert_eq!(
        correlator.find_scan_directory(at(12, 0, 30)).unwrap(),
        dataset.root().join("2017-06-01/ASD/12.00.00")
    );
    assert_eq!(
        correlator.find_scan_directory(at(12, 5, 59)).unwrap(),
        dataset.root().join("2017-06-01/ASD/12.05.00")
    );
}

#[test]
fn scan_file_by_index() {
    let dataset = Dataset::new(300.).with_scans("12.00.00", 7);
    let correlator = correlator(&dataset);

    let set = correlator.find_scan_set(at(12, 3, 0)).unwrap();
    assert_eq!(set.len(), 7);
    for index in 0..7 {
        let path = correlator.find_scan_file(at(12, 3, 0), index).unwrap();
        assert_eq!(path, set.file(index).unwrap());
        assert!(
            path.file_name()
                .unwrap()
                .to_str()
                .unwrap()
                .starts_with(&format!("{index}_"))
        );
    }
}

#[test]
fn incomplete_scan_set_is_rejected() {
    // Index 2 exists by name, but the set is one scan short.
    let dataset = Dataset::new(300.).with_scans("12.00.00", 6);
    let err = correlator(&dataset)
        .find_scan_file(at(12, 3, 0), 2)
        .unwrap_err();
    assert!(matches!(
        err,
        CorrelateError::ScanCountMismatch {
            found: 6,
            expected: 7,
            ..
        }
    ));
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn other_files_are_not_scans() {
    let dataset = Dataset::new(300.).with_scans("12.00.00", 7);
    let dir = dataset.root().join("2017-06-01/ASD/12.00.00");
    std::fs::write(dir.join("7_00000.asd"), b"raw").unwrap();
    std::fs::create_dir(dir.join("8_subdir.txt")).unwrap();

    assert!(correlator(&dataset).find_scan_file(at(12, 3, 0), 6).is_ok());
}

#[test]
fn scan_loads_within_spectral_range() {
    let dataset = Dataset::new(300.).with_scans("12.00.00", 7);
    let config = Configuration::load_from_dataset(dataset.root()).unwrap();
    let path = Correlator::new(dataset.root(), &config)
        .find_scan_file(at(12, 3, 0), 3)
        .unwrap();

    let spectrum = Spectrum::load(&path, 1)
        .unwrap()
        .within(config.spectral_range());
    assert_eq!(spectrum.wavelengths().first(), Some(&350.));
    assert_eq!(spectrum.wavelengths().last(), Some(&1000.));
    assert!(spectrum.radiances().iter().all(|r| *r == 3.5));
}

#[test]
fn photos_of_a_day() {
    let dataset = Dataset::new(300.)
        .with_photo_file("12.03.00.jpg")
        .with_photo_file("12.03.05.JPG")
        .with_photo_file("12.09.00.jpg")
        .with_photo_file("12.03.00.cr2")
        .with_photo_file("thumbs.jpg");
    let correlator = correlator(&dataset);

    assert_eq!(
        correlator.capture_dates().unwrap(),
        vec![at(0, 0, 0).date()]
    );

    let photos = correlator.photos(at(0, 0, 0).date(), "jpg").unwrap();
    let times: Vec<_> = photos.iter().map(Timed::time).collect();
    assert_eq!(times, vec![at(12, 3, 0), at(12, 3, 5), at(12, 9, 0)]);

    let groups = find_photo_groups(&photos, 5);
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].time(), at(12, 3, 5));
    assert_eq!(groups[1].time(), at(12, 9, 0));

    assert_eq!(
        correlator.find_photo(at(12, 3, 0), "cr2").unwrap(),
        dataset.photo_dir().join("12.03.00.cr2")
    );
    assert!(correlator.find_photo(at(12, 4, 0), "jpg").is_err());
    assert_eq!(
        correlator.find_photo(at(12, 3, 5), "jpg").unwrap(),
        dataset.photo_dir().join("12.03.05.JPG")
    );
}

#[test]
fn exposure_bracket() {
    let dataset = Dataset::new(300.)
        .with_photo_file("12.03.00.jpg")
        .with_bracket("12.03.00", 3);
    let correlator = correlator(&dataset);
    let bracket = dataset.photo_dir().join("12.03.00");

    assert_eq!(
        correlator
            .find_exposure_photo(at(12, 3, 0), 0.000125, "jpg")
            .unwrap(),
        bracket.join("IMG_0001.JPG")
    );
    assert_eq!(
        correlator
            .find_exposure_photo(at(12, 3, 0), 0.008, "jpg")
            .unwrap(),
        bracket.join("IMG_0003.JPG")
    );

    // The fourth exposure was never taken.
    let err = correlator
        .find_exposure_photo(at(12, 3, 0), 0.066666, "jpg")
        .unwrap_err();
    assert!(matches!(err, CorrelateError::NoExposurePhoto { index: 3, .. }));
    assert_eq!(err.kind(), ErrorKind::NotFound);

    assert!(matches!(
        correlator.find_exposure_photo(at(12, 3, 0), 2.0, "jpg"),
        Err(CorrelateError::UnknownExposure { .. })
    ));

    // The bracket directory is not a photograph of the day.
    let photos = correlator.photos(at(0, 0, 0).date(), "jpg").unwrap();
    assert_eq!(photos.len(), 1);
}

#[test]
fn empty_dataset() {
    let dataset = Dataset::new(300.);
    let correlator = correlator(&dataset);
    assert!(correlator.capture_dates().unwrap().is_empty());
    assert!(
        correlator
            .photos(at(0, 0, 0).date(), "jpg")
            .unwrap()
            .is_empty()
    );
    assert!(matches!(
        correlator.find_scan_set(at(12, 0, 0)),
        Err(CorrelateError::NoScanDirectory { .. })
    ));
    assert!(!dataset.root().join("2017-06-01").exists());
}
