use std::path::PathBuf;

use scancal_core::{CameraId, CameraPair, ProjectDescription, ProjectLayout};
use serde::{Deserialize, Serialize};

use crate::align::DetectionSource;

/// Inputs for one camera's intrinsic calibration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraPlan {
    pub camera_id: CameraId,
    pub name: String,
    /// Detection records of this camera, one per set that captured it.
    pub sources: Vec<DetectionSource>,
    /// First captured image, used by the backend to read the image size.
    pub sample_image: Option<PathBuf>,
}

/// Everything a calibration run needs to know about the project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalibrationPlan {
    pub cameras: Vec<CameraPlan>,
    pub pairs: Vec<CameraPair>,
}

impl CalibrationPlan {
    /// Derive camera sources from the project's image sets.
    ///
    /// Each source carries the id of its set as the set index.
    pub fn from_project(
        project: &ProjectDescription,
        pairs: &[CameraPair],
        layout: &ProjectLayout,
    ) -> Self {
        let cameras = project
            .cameras
            .iter()
            .map(|camera| {
                let mut sources = Vec::new();
                let mut sample_image = None;
                for set in &project.image_sets {
                    for image in set.images.iter().filter(|img| img.id == camera.id) {
                        sources.push(DetectionSource::new(
                            set.id,
                            layout.detection_path(&set.path, &image.path),
                        ));
                        if sample_image.is_none() {
                            sample_image = Some(layout.image_path(&set.path, &image.path));
                        }
                    }
                }
                CameraPlan {
                    camera_id: camera.id,
                    name: camera.name.clone(),
                    sources,
                    sample_image,
                }
            })
            .collect();

        Self {
            cameras,
            pairs: pairs.to_vec(),
        }
    }

    pub fn camera(&self, camera_id: CameraId) -> Option<&CameraPlan> {
        self.cameras.iter().find(|c| c.camera_id == camera_id)
    }

    /// Detection sources of a camera (empty if the camera is unknown).
    pub fn sources(&self, camera_id: CameraId) -> &[DetectionSource] {
        self.camera(camera_id)
            .map(|c| c.sources.as_slice())
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROJECT: &str = r#"{
        "Cameras": [{"id": 1, "name": "left"}, {"id": 2, "name": "right"}],
        "ImageSets": [
            {"id": 1, "path": "scan1", "images": [{"id": 1, "path": "a.png"}, {"id": 2, "path": "b.png"}]},
            {"id": 3, "path": "scan3", "images": [{"id": 2, "path": "b.png"}]}
        ]
    }"#;

    #[test]
    fn sources_carry_set_ids() {
        let project = ProjectDescription::from_json(PROJECT).unwrap();
        let layout = ProjectLayout::new("/proj");
        let plan = CalibrationPlan::from_project(&project, &[CameraPair::new(7, 1, 2)], &layout);

        assert_eq!(plan.cameras.len(), 2);
        assert_eq!(
            plan.sources(1),
            &[DetectionSource::new(1, "/proj/scan1/calibration/a.conf")]
        );
        let right: Vec<_> = plan.sources(2).iter().map(|s| s.set_index).collect();
        assert_eq!(right, vec![1, 3]);
        assert_eq!(
            plan.camera(2).unwrap().sample_image,
            Some(PathBuf::from("/proj/scan1/b.png"))
        );
        assert!(plan.sources(9).is_empty());
        assert_eq!(plan.pairs, vec![CameraPair::new(7, 1, 2)]);
    }
}
