//! 基于阈值与连通域分析的肺分割.
//!
//! # 算法
//!
//! 1. 以 -320 HU 为阈值, 将体素分为致密 ([`Density::Dense`]) 与稀疏
//!    ([`Density::Sparse`]) 两类. 两类都参与连通域标记.
//! 2. 26-邻域标记整个 3D 体数据, 包含体素 `(0, 0, 0)` 的连通域视为体外空气,
//!    全部改为致密.
//! 3. (可选) 逐层填充肺内结构: 每个水平切片只保留最大的致密 8-邻域连通域,
//!    其余像素全部视为稀疏. 没有致密像素的切片保持不变.
//! 4. 稀疏体素即为肺; 最后只保留最大的 26-邻域肺连通域.
//!
//! 退化输入 (全空气, 全组织) 不会出错, 只会得到空掩码.

mod label;

pub use label::{keep_largest_component, label_2d, label_3d, Labeling, Labeling2d, Labeling3d};

use crate::consts::hu::LUNG_THRESHOLD;
use crate::{HuVolume, LungMask, VoxelGrid};
use ndarray::{Array3, ArrayViewMut2, Axis, Zip};

/// 体素的二值密度分类.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Density {
    /// HU 值不高于阈值: 空气, 肺.
    Sparse,

    /// HU 值高于阈值: 软组织, 骨骼等.
    Dense,
}

impl Density {
    /// 按阈值分类. 严格大于 `threshold` 为致密.
    #[inline]
    pub fn classify(hu: i16, threshold: i16) -> Self {
        if hu > threshold {
            Self::Dense
        } else {
            Self::Sparse
        }
    }
}

/// 对单个水平切片执行填充: 只保留最大的致密连通域, 其余像素改为稀疏.
fn fill_slice(mut slice: ArrayViewMut2<'_, Density>) {
    let labeling = label_2d(slice.view(), Some(Density::Sparse));
    let Some(keep) = labeling.largest() else {
        return;
    };
    Zip::from(&mut slice)
        .and(labeling.labels())
        .for_each(|d, &l| {
            if l != keep {
                *d = Density::Sparse;
            }
        });
}

/// 肺分割器.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LungSegmenter {
    threshold: i16,
}

impl Default for LungSegmenter {
    /// 阈值 -320 HU.
    fn default() -> Self {
        Self {
            threshold: LUNG_THRESHOLD,
        }
    }
}

impl LungSegmenter {
    /// 以给定阈值构建分割器.
    #[inline]
    pub fn new(threshold: i16) -> Self {
        Self { threshold }
    }

    /// 空气/组织阈值.
    #[inline]
    pub fn threshold(&self) -> i16 {
        self.threshold
    }

    /// 阈值化, 并把包含角点 `(0, 0, 0)` 的连通域改为致密.
    fn classify_and_clear_background(&self, volume: &HuVolume) -> Array3<Density> {
        let t = self.threshold;
        let mut density = volume.data().mapv(|hu| Density::classify(hu, t));
        let labeling = label_3d(density.view(), None);
        let background = labeling.labels()[(0, 0, 0)];
        log::debug!(
            "{} density components, background has {} voxels",
            labeling.len(),
            labeling.size_of(background)
        );
        Zip::from(&mut density)
            .and(labeling.labels())
            .for_each(|d, &l| {
                if l == background {
                    *d = Density::Dense;
                }
            });
        density
    }

    /// 由密度分类生成最终掩码.
    fn finish(density: Array3<Density>, spacing: [f64; 3]) -> LungMask {
        let lungs = density.mapv(|d| d == Density::Sparse);
        LungMask::from_raw(keep_largest_component(lungs.view()), spacing)
    }

    /// 分割肺部. `fill_lung_structures` 为 `true` 时会逐层填充肺内的血管等结构.
    pub fn segment(&self, volume: &HuVolume, fill_lung_structures: bool) -> LungMask {
        let mut density = self.classify_and_clear_background(volume);
        if fill_lung_structures {
            density.axis_iter_mut(Axis(0)).for_each(fill_slice);
        }
        Self::finish(density, volume.spacing())
    }

    /// 同 [`LungSegmenter::segment`], 但借助 `rayon` 并行地逐层填充. 结果与串行版本完全一致.
    #[cfg(feature = "rayon")]
    pub fn par_segment(&self, volume: &HuVolume, fill_lung_structures: bool) -> LungMask {
        use ndarray::parallel::prelude::*;

        let mut density = self.classify_and_clear_background(volume);
        if fill_lung_structures {
            density
                .axis_iter_mut(Axis(0))
                .into_par_iter()
                .for_each(fill_slice);
        }
        Self::finish(density, volume.spacing())
    }
}

/// 以默认阈值分割肺部.
#[inline]
pub fn segment_lung_mask(volume: &HuVolume, fill_lung_structures: bool) -> LungMask {
    LungSegmenter::default().segment(volume, fill_lung_structures)
}

/// 以默认阈值并行分割肺部.
#[cfg(feature = "rayon")]
#[inline]
pub fn par_segment_lung_mask(volume: &HuVolume, fill_lung_structures: bool) -> LungMask {
    LungSegmenter::default().par_segment(volume, fill_lung_structures)
}
