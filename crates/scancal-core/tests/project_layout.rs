use std::fs;

use scancal_core::{
    CameraPair, DetectionRecord, ProjectDescription, ProjectLayout, Pt2, ScanError, Validity,
    parse_camera_pairs,
};

const PROJECT: &str = r#"{
    "Cameras": [
        {"id": 1, "name": "top-left"},
        {"id": 2, "name": "top-right"},
        {"id": 3, "name": "bottom"}
    ],
    "ImageSets": [
        {"id": 1, "path": "2024-05-01_01", "images": [
            {"id": 1, "path": "c1.bmp"}, {"id": 2, "path": "c2.bmp"}, {"id": 3, "path": "c3.bmp"}
        ]},
        {"id": 2, "path": "2024-05-01_02", "images": [
            {"id": 1, "path": "c1.bmp"}, {"id": 2, "path": "c2.bmp"}
        ]}
    ]
}"#;

const PAIRS: &str = r#"[
    {"pairId": 1, "LeftCamera": 1, "RightCamera": 2},
    {"pairId": 2, "LeftCamera": 2, "RightCamera": 3}
]"#;

fn write_project(root: &std::path::Path, missing: &[(&str, &str)]) -> ProjectLayout {
    let layout = ProjectLayout::new(root);
    fs::write(layout.project_file(), PROJECT).unwrap();
    let project = layout.load_project().unwrap();
    for set in &project.image_sets {
        fs::create_dir_all(layout.set_dir(&set.path)).unwrap();
        for image in &set.images {
            if !missing.contains(&(set.path.as_str(), image.path.as_str())) {
                fs::write(layout.image_path(&set.path, &image.path), b"bmp").unwrap();
            }
        }
    }
    layout
}

#[test]
fn sets_built_from_disk_follow_pair_rules() {
    let dir = tempfile::tempdir().unwrap();
    let layout = write_project(dir.path(), &[("2024-05-01_01", "c3.bmp")]);
    let project = layout.load_project().unwrap();
    let pairs = parse_camera_pairs(PAIRS).unwrap();

    let mut first = ProjectDescription::build_set(&project.image_sets[0], &layout);
    let mut second = ProjectDescription::build_set(&project.image_sets[1], &layout);
    assert_eq!(first.image(3).unwrap().validity, Validity::Missing);

    first.evaluate(&pairs, &layout);
    second.evaluate(&pairs, &layout);
    assert_eq!(first.pairs(), &[Validity::Pending, Validity::Missing]);
    // Camera 3 was not captured in the second set.
    assert_eq!(second.pairs(), &[Validity::Pending, Validity::Uncaptured]);
    assert_eq!(first.selectable_pairs(), vec![0]);

    for camera in [1, 2] {
        first.image_mut(camera).unwrap().validity = Validity::Valid;
    }
    first.evaluate(&pairs, &layout);
    assert_eq!(first.rollup(), Validity::Valid);

    // The file disappearing turns the pair Missing again.
    fs::remove_file(layout.image_path("2024-05-01_01", "c2.bmp")).unwrap();
    first.evaluate(&pairs, &layout);
    assert_eq!(first.pairs()[0], Validity::Missing);
    assert_eq!(first.rollup(), Validity::Pending);
}

#[test]
fn detection_records_live_next_to_their_set() {
    let dir = tempfile::tempdir().unwrap();
    let layout = write_project(dir.path(), &[]);
    let path = layout.detection_path("2024-05-01_02", "c1.bmp");
    assert!(path.ends_with("2024-05-01_02/calibration/c1.conf"));

    fs::create_dir_all(layout.detection_dir("2024-05-01_02")).unwrap();
    let record = DetectionRecord::new(2, [Pt2::new(10.0, 20.0)]);
    fs::write(&path, serde_json::to_string(&record).unwrap()).unwrap();

    assert_eq!(DetectionRecord::load_for_set(&path, 2).unwrap(), record);
    assert!(matches!(
        DetectionRecord::load_for_set(&path, 1),
        Err(ScanError::SetIndexMismatch {
            expected: 1,
            found: 2,
            ..
        })
    ));
}

#[test]
fn artifact_paths_use_camera_names_and_pair_ids() {
    let layout = ProjectLayout::new("/scans/rig");
    assert!(
        layout
            .intrinsic_artifact_path("top-left")
            .ends_with("calibration/top-left-calibration.json")
    );
    assert!(layout.stereo_artifact_path(2).ends_with("calibration/2.json"));
}

#[test]
fn device_pair_list_round_trips_field_names() {
    let pairs = parse_camera_pairs(PAIRS).unwrap();
    assert_eq!(pairs[1], CameraPair::new(2, 2, 3));
    let json = serde_json::to_value(pairs[0]).unwrap();
    assert_eq!(json["LeftCamera"], 1);
    assert!(matches!(
        parse_camera_pairs("Fail: no rig"),
        Err(ScanError::DeviceRefused(_))
    ));
}
