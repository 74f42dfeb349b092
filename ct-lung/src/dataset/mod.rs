//! 数据集操作.

use std::path::{Path, PathBuf};

pub mod series;
pub mod labels;
pub mod patients;
pub mod processed;

pub use series::{load_scan, RawScan, ScanLoadError, ScanMeta, SliceHeader, SpacingSource};
pub use labels::{CancerStatus, LabelsError, PatientLabels};
pub use patients::{patient_ids, resumable_scan_loader, scan_loader, ScanLoader};
pub use processed::{Artifact, ArtifactError, ArtifactStore, ProcessedPatient};

/// 获取 `{用户主目录}/dataset` 目录.
pub fn home_dataset_dir() -> Option<PathBuf> {
    let mut ans = dirs::home_dir()?;
    ans.push("dataset");
    Some(ans)
}

/// 获取 `{用户主目录}/dataset` 目录下给定继续项组成的全路径.
pub fn home_dataset_dir_with<P: AsRef<Path>, I: IntoIterator<Item = P>>(it: I) -> Option<PathBuf> {
    let mut ans = home_dataset_dir()?;
    ans.extend(it);
    Some(ans)
}
