//! 预处理结果的持久化.
//!
//! 每个病人一个目录, 其中包含四个互相独立的 `.npy` 文件:
//!
//! - `pixels_resampled.npy`: 重采样后的 HU 值, `i16` 3D;
//! - `pixels_resampled_spacing.npy`: 实际体素分辨率, `f64` 1D, 长度 3;
//! - `segmented_lungs.npy`: 未填充的肺掩码, `i8` 3D, 0/1;
//! - `segmented_lungs_fill.npy`: 填充后的肺掩码, `i8` 3D, 0/1.
//!
//! 写入总是完整覆盖, 因此重复运行是幂等的.

use crate::{HuVolume, LungMask, VolumeError, VoxelGrid};
use ndarray::{Array1, Array3};
use ndarray_npy::{read_npy, write_npy, ReadNpyError, WriteNpyError};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// 读写预处理结果时的错误.
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// 创建目录失败.
    #[error("cannot create `{path}`: {source}")]
    Io {
        /// 目录路径.
        path: PathBuf,
        /// 底层错误.
        source: std::io::Error,
    },

    /// 写入 npy 失败.
    #[error("cannot write `{path}`: {source}")]
    Write {
        /// 文件路径.
        path: PathBuf,
        /// 底层错误.
        source: WriteNpyError,
    },

    /// 读取 npy 失败.
    #[error("cannot read `{path}`: {source}")]
    Read {
        /// 文件路径.
        path: PathBuf,
        /// 底层错误.
        source: ReadNpyError,
    },

    /// 分辨率数组长度不为 3.
    #[error("spacing array must have 3 elements, found {0}")]
    SpacingLength(usize),

    /// 掩码与扫描形状不一致.
    #[error("mask shape {mask:?} does not match volume shape {volume:?}")]
    ShapeMismatch {
        /// 扫描形状.
        volume: crate::Idx3d,
        /// 掩码形状.
        mask: crate::Idx3d,
    },

    /// 读取的数据不满足体数据不变量.
    #[error(transparent)]
    Volume(#[from] VolumeError),
}

/// 预处理结果文件.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Artifact {
    /// 重采样后的扫描.
    PixelsResampled,
    /// 实际体素分辨率.
    PixelsResampledSpacing,
    /// 未填充的肺掩码.
    SegmentedLungs,
    /// 填充后的肺掩码.
    SegmentedLungsFill,
}

impl Artifact {
    /// 全部四种结果.
    pub const ALL: [Artifact; 4] = [
        Artifact::PixelsResampled,
        Artifact::PixelsResampledSpacing,
        Artifact::SegmentedLungs,
        Artifact::SegmentedLungsFill,
    ];

    /// 不含扩展名的文件名.
    pub const fn file_stem(self) -> &'static str {
        match self {
            Artifact::PixelsResampled => "pixels_resampled",
            Artifact::PixelsResampledSpacing => "pixels_resampled_spacing",
            Artifact::SegmentedLungs => "segmented_lungs",
            Artifact::SegmentedLungsFill => "segmented_lungs_fill",
        }
    }

    /// 文件名.
    #[inline]
    pub fn file_name(self) -> String {
        format!("{}.npy", self.file_stem())
    }
}

/// 单个病人的全部预处理结果.
#[derive(Debug, Clone)]
pub struct ProcessedPatient {
    /// 重采样后的扫描, 携带实际体素分辨率.
    pub volume: HuVolume,
    /// 未填充的肺掩码.
    pub lungs: LungMask,
    /// 填充后的肺掩码.
    pub lungs_fill: LungMask,
}

/// 预处理结果存储, 以 `root/<patient_id>/` 组织.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

fn write_one<A: ndarray_npy::WritableElement, D: ndarray::Dimension>(
    path: PathBuf,
    array: &ndarray::Array<A, D>,
) -> Result<(), ArtifactError> {
    write_npy(&path, array).map_err(|source| ArtifactError::Write { path, source })
}

fn read_one<T: ndarray_npy::ReadableElement, D: ndarray::Dimension>(
    path: PathBuf,
) -> Result<ndarray::Array<T, D>, ArtifactError> {
    read_npy(&path).map_err(|source| ArtifactError::Read { path, source })
}

impl ArtifactStore {
    /// 以 `root` 为根目录.
    #[inline]
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_owned(),
        }
    }

    /// 根目录.
    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 病人目录.
    #[inline]
    pub fn patient_dir(&self, patient_id: &str) -> PathBuf {
        self.root.join(patient_id)
    }

    /// 某个结果文件的路径.
    #[inline]
    pub fn path(&self, patient_id: &str, artifact: Artifact) -> PathBuf {
        self.patient_dir(patient_id).join(artifact.file_name())
    }

    /// 缺失的结果文件.
    pub fn missing(&self, patient_id: &str) -> Vec<Artifact> {
        Artifact::ALL
            .into_iter()
            .filter(|a| !self.path(patient_id, *a).is_file())
            .collect()
    }

    /// 四个结果文件是否全部存在?
    #[inline]
    pub fn is_complete(&self, patient_id: &str) -> bool {
        self.missing(patient_id).is_empty()
    }

    /// 写入 (覆盖) 一个病人的全部结果.
    pub fn write(
        &self,
        patient_id: &str,
        volume: &HuVolume,
        lungs: &LungMask,
        lungs_fill: &LungMask,
    ) -> Result<(), ArtifactError> {
        for mask in [lungs, lungs_fill] {
            if mask.shape() != volume.shape() {
                return Err(ArtifactError::ShapeMismatch {
                    volume: volume.shape(),
                    mask: mask.shape(),
                });
            }
        }
        let dir = self.patient_dir(patient_id);
        std::fs::create_dir_all(&dir).map_err(|source| ArtifactError::Io {
            path: dir.clone(),
            source,
        })?;

        write_one(
            self.path(patient_id, Artifact::PixelsResampled),
            &volume.data().to_owned(),
        )?;
        write_one(
            self.path(patient_id, Artifact::PixelsResampledSpacing),
            &Array1::from(volume.spacing().to_vec()),
        )?;
        write_one(self.path(patient_id, Artifact::SegmentedLungs), &lungs.to_i8())?;
        write_one(
            self.path(patient_id, Artifact::SegmentedLungsFill),
            &lungs_fill.to_i8(),
        )?;
        log::debug!("wrote artifacts to `{}`", dir.display());
        Ok(())
    }

    /// 读取与 `volume` 对应的掩码.
    fn read_mask(&self, patient_id: &str, artifact: Artifact, volume: &HuVolume) -> Result<LungMask, ArtifactError> {
        let raw: Array3<i8> = read_one(self.path(patient_id, artifact))?;
        let mask = LungMask::from_i8(raw, volume.spacing())?;
        if mask.shape() != volume.shape() {
            return Err(ArtifactError::ShapeMismatch {
                volume: volume.shape(),
                mask: mask.shape(),
            });
        }
        Ok(mask)
    }

    /// 读取一个病人的全部结果.
    pub fn read(&self, patient_id: &str) -> Result<ProcessedPatient, ArtifactError> {
        let spacing: Array1<f64> = read_one(self.path(patient_id, Artifact::PixelsResampledSpacing))?;
        let spacing: [f64; 3] = spacing
            .as_slice()
            .and_then(|s| s.try_into().ok())
            .ok_or(ArtifactError::SpacingLength(spacing.len()))?;

        let pixels: Array3<i16> = read_one(self.path(patient_id, Artifact::PixelsResampled))?;
        let volume = HuVolume::new(pixels, spacing)?;

        let lungs = self.read_mask(patient_id, Artifact::SegmentedLungs, &volume)?;
        let lungs_fill = self.read_mask(patient_id, Artifact::SegmentedLungsFill, &volume)?;
        Ok(ProcessedPatient {
            volume,
            lungs,
            lungs_fill,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::segment_lung_mask;
    use ndarray::s;

    fn sample() -> HuVolume {
        let mut data = Array3::<i16>::from_elem((3, 6, 6), 40);
        data.slice_mut(s![1, 1..5, 1..5]).fill(-900);
        data[(1, 2, 2)] = 40;
        HuVolume::new(data, [1.25, 0.75, 0.75]).unwrap()
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        assert_eq!(store.missing("p1"), Artifact::ALL.to_vec());

        let v = sample();
        let lungs = segment_lung_mask(&v, false);
        let lungs_fill = segment_lung_mask(&v, true);
        store.write("p1", &v, &lungs, &lungs_fill).unwrap();
        assert!(store.is_complete("p1"));
        assert!(store
            .path("p1", Artifact::SegmentedLungsFill)
            .ends_with("p1/segmented_lungs_fill.npy"));

        let back = store.read("p1").unwrap();
        assert_eq!(back.volume.data(), v.data());
        assert_eq!(back.volume.spacing(), [1.25, 0.75, 0.75]);
        assert_eq!(back.lungs, lungs);
        assert_eq!(back.lungs_fill, lungs_fill);
        assert!(back.lungs_fill.count() > back.lungs.count());

        // 覆盖写入.
        store.write("p1", &v, &lungs_fill, &lungs_fill).unwrap();
        assert_eq!(store.read("p1").unwrap().lungs, lungs_fill);
    }

    #[test]
    fn test_incomplete_patient() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let v = sample();
        let lungs = segment_lung_mask(&v, false);
        store.write("p2", &v, &lungs, &lungs).unwrap();
        std::fs::remove_file(store.path("p2", Artifact::SegmentedLungs)).unwrap();
        assert_eq!(store.missing("p2"), vec![Artifact::SegmentedLungs]);
        assert!(matches!(store.read("p2"), Err(ArtifactError::Read { .. })));
    }

    #[test]
    fn test_stored_mask_is_i8() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let v = sample();
        let lungs = segment_lung_mask(&v, false);
        store.write("p3", &v, &lungs, &lungs).unwrap();
        let raw: Array3<i8> = read_npy(store.path("p3", Artifact::SegmentedLungs)).unwrap();
        assert_eq!(raw.iter().filter(|v| **v == 1).count(), lungs.count());
        assert!(raw.iter().all(|v| matches!(*v, 0 | 1)));
    }
}
