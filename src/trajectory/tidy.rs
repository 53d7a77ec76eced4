//! Long-form ("tidy") view of a trajectory: one row per frame and marker, with columns
//! `frame, keypoint, x, y, z`, and its CSV export.
use camino::Utf8Path;
use serde::Serialize;

use crate::bonefit_errors::BonefitError;
use crate::trajectory::Trajectory;

/// One row of the tidy view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TidyRow<'a> {
    pub frame: usize,
    pub keypoint: &'a str,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Trajectory {
    /// Flatten the trajectory into rows ordered by frame, then by marker.
    pub fn tidy_rows(&self) -> impl Iterator<Item = TidyRow<'_>> {
        self.frames().enumerate().flat_map(move |(frame, row)| {
            self.marker_names()
                .iter()
                .zip(row)
                .map(move |(keypoint, position)| TidyRow {
                    frame,
                    keypoint,
                    x: position.x,
                    y: position.y,
                    z: position.z,
                })
        })
    }

    /// Write the tidy rows to a CSV file with a `frame,keypoint,x,y,z` header.
    pub fn write_csv(&self, path: &Utf8Path) -> Result<(), BonefitError> {
        let mut writer = csv::Writer::from_path(path)?;
        for row in self.tidy_rows() {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tidy_test {
    use super::*;
    use crate::constants::Position;

    fn two_markers() -> Trajectory {
        Trajectory::new(
            "3d_xyz",
            vec![
                Position::new(0.0, 1.0, 2.0),
                Position::new(3.0, 4.0, 5.0),
                Position::new(6.0, 7.0, 8.0),
                Position::new(9.0, 10.0, 11.0),
            ],
            vec!["nose".into(), "chin".into()],
            2,
        )
        .unwrap()
    }

    #[test]
    fn test_tidy_rows_order() {
        let traj = two_markers();
        let rows: Vec<_> = traj.tidy_rows().collect();
        assert_eq!(rows.len(), 4);
        assert_eq!(
            rows[1],
            TidyRow {
                frame: 0,
                keypoint: "chin",
                x: 3.0,
                y: 4.0,
                z: 5.0
            }
        );
        assert_eq!(rows[2].frame, 1);
        assert_eq!(rows[2].keypoint, "nose");
    }

    #[test]
    fn test_write_csv() {
        let traj = two_markers();
        let dir = std::env::temp_dir();
        let path = camino::Utf8PathBuf::from_path_buf(dir.join("bonefit_tidy_test.csv")).unwrap();
        traj.write_csv(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next(), Some("frame,keypoint,x,y,z"));
        assert_eq!(lines.next(), Some("0,nose,0.0,1.0,2.0"));
        assert_eq!(content.lines().count(), 5);
        std::fs::remove_file(&path).unwrap();
    }
}
