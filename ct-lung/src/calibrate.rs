//! 原始像素值到 HU 值的校准, 以及网络输入前的归一化.
//!
//! 校准公式为 `HU = raw * slope + intercept`, 其中 `slope` 与 `intercept`
//! 取自 DICOM 的 RescaleSlope / RescaleIntercept, 且假设整个序列共用一组取值.

use crate::consts::hu::{NORMALIZE_MAX, NORMALIZE_MIN, OUTSIDE_SCAN_SENTINEL, PIXEL_MEAN};
use crate::dataset::ScanMeta;
use crate::{HuVolume, Idx3d, VolumeError};
use ndarray::{Array3, ArrayView3, Zip};
use thiserror::Error;

/// HU 校准错误.
#[derive(Debug, Error)]
pub enum CalibrateError {
    /// 原始像素值无法以 `i16` 表示.
    #[error("raw pixel value {value} at {pos:?} does not fit in i16")]
    RawOutOfRange {
        /// 体素索引.
        pos: Idx3d,
        /// 原始值.
        value: i32,
    },

    /// 校准后的 HU 值无法以 `i16` 表示.
    #[error("calibrated value {value} at {pos:?} does not fit in i16")]
    ResultOutOfRange {
        /// 体素索引.
        pos: Idx3d,
        /// 校准后的值.
        value: i64,
    },

    /// slope 或 intercept 非有限, 或 intercept 截断后超出 `i16` 范围.
    #[error("invalid rescale parameters: intercept {intercept}, slope {slope}")]
    InvalidRescale {
        /// RescaleIntercept.
        intercept: f64,
        /// RescaleSlope.
        slope: f64,
    },

    /// 校准结果无法构成合法体数据.
    #[error(transparent)]
    Volume(#[from] VolumeError),
}

/// 校准单个体素. `raw` 已确认位于 `i16` 范围内. 结果溢出 `i64` 时返回 `None`.
#[inline]
fn calibrate_one(raw: i16, intercept: i64, slope: f64) -> Option<i64> {
    let raw = if raw as i32 == OUTSIDE_SCAN_SENTINEL {
        0
    } else {
        raw
    };
    let scaled = if slope != 1.0 {
        // 向零截断, 超出 i64 时饱和.
        (raw as f64 * slope) as i64
    } else {
        raw as i64
    };
    scaled.checked_add(intercept)
}

/// 将堆叠好的原始像素 (z, 高, 宽) 转换为 HU 值.
///
/// 1. 原始值 `-2000` 视为扫描范围外的填充, 先置为 `0` (因此总是映射为 `intercept`);
/// 2. 若 `slope != 1`, 以 `f64` 计算 `raw * slope` 并向零截断;
/// 3. 加上向零截断后的 `intercept`.
///
/// 任何原始值或结果超出 `i16` 范围都会返回 `Err`, 而不是截断.
/// 截断后的 `intercept` 本身超出 `i16` 范围时, 直接返回 [`CalibrateError::InvalidRescale`].
pub fn calibrate(
    raw: ArrayView3<'_, i32>,
    intercept: f64,
    slope: f64,
) -> Result<Array3<i16>, CalibrateError> {
    let intercept_range = i16::MIN as f64..=i16::MAX as f64;
    if !intercept.is_finite() || !slope.is_finite() || !intercept_range.contains(&intercept.trunc()) {
        return Err(CalibrateError::InvalidRescale { intercept, slope });
    }
    let intercept_i = intercept as i64;

    let mut out = Array3::<i16>::zeros(raw.dim());
    for ((pos, &value), slot) in raw.indexed_iter().zip(out.iter_mut()) {
        let narrow = i16::try_from(value).map_err(|_| CalibrateError::RawOutOfRange { pos, value })?;
        // 溢出时按乘积的符号报告饱和值.
        let hu = calibrate_one(narrow, intercept_i, slope).ok_or_else(|| {
            let value = if narrow as f64 * slope > 0.0 { i64::MAX } else { i64::MIN };
            CalibrateError::ResultOutOfRange { pos, value }
        })?;
        *slot = i16::try_from(hu).map_err(|_| CalibrateError::ResultOutOfRange { pos, value: hu })?;
    }
    Ok(out)
}

/// 使用扫描元数据中的 (intercept, slope) 与体素分辨率校准, 直接得到 [`HuVolume`].
pub fn calibrate_scan(raw: ArrayView3<'_, i32>, meta: &ScanMeta) -> Result<HuVolume, CalibrateError> {
    let hu = calibrate(raw, meta.intercept, meta.slope)?;
    log::debug!(
        "calibrated {:?} voxels with intercept {}, slope {}",
        hu.dim(),
        meta.intercept,
        meta.slope
    );
    Ok(HuVolume::new(hu, meta.spacing)?)
}

/// 将 HU 值线性映射到 `[0, 1]`: `min_bound` 以下为 0, `max_bound` 以上为 1.
///
/// `max_bound <= min_bound` 时, 结果以 `min_bound` 为阈值二值化.
pub fn normalize_with(volume: &HuVolume, min_bound: f32, max_bound: f32) -> Array3<f32> {
    let span = max_bound - min_bound;
    volume.data().mapv(|hu| {
        let hu = hu as f32;
        if span <= 0.0 {
            return if hu > min_bound { 1.0 } else { 0.0 };
        }
        ((hu - min_bound) / span).clamp(0.0, 1.0)
    })
}

/// 以 `[-1000, 400]` 为边界归一化.
#[inline]
pub fn normalize(volume: &HuVolume) -> Array3<f32> {
    normalize_with(volume, NORMALIZE_MIN, NORMALIZE_MAX)
}

/// 减去数据集像素均值 `pixel_mean`.
pub fn zero_center_with(image: ArrayView3<'_, f32>, pixel_mean: f32) -> Array3<f32> {
    let mut out = image.to_owned();
    Zip::from(&mut out).for_each(|v| *v -= pixel_mean);
    out
}

/// 减去默认像素均值 `0.25`.
#[inline]
pub fn zero_center(image: ArrayView3<'_, f32>) -> Array3<f32> {
    zero_center_with(image, PIXEL_MEAN)
}
