//! 🫁欢迎光临🩻
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{Idx2d, Idx3d};

pub use crate::data::slice::{ImgWriteVis, MaskSlice, ScanSlice};
pub use crate::data::window::CtWindow;
pub use crate::data::{HuVolume, LungMask, VoxelGrid};

#[cfg(feature = "plot")]
pub use crate::data::slice::ImgDisplay;

pub use crate::calibrate::{calibrate, calibrate_scan, normalize, zero_center};
pub use crate::config::PipelineConfig;
pub use crate::resample::{Interpolation, Resampler};
pub use crate::segment::{segment_lung_mask, LungSegmenter};
pub use crate::tissue::{slice_to_rgb, value_to_tissue, Tissue};
pub use crate::vis::{PlotTarget, RenderConfig, Visualizer};

pub use crate::dataset::home_dataset_dir_with;
pub use crate::dataset::{self, ArtifactStore, CancerStatus, PatientLabels};
