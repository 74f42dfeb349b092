//! 将 3D 扫描重采样到统一的物理体素分辨率.
//!
//! 目标形状为 `round(old_shape * native / target)` (四舍六入五成双),
//! 实际达到的分辨率为 `native * old_shape / new_shape`, 因此两者的物理尺寸一致.
//!
//! 默认使用镜像边界的三次 B 样条插值: 先沿每个轴做递归预滤波得到样条系数,
//! 再以 4 个相邻系数加权求值. 样条在原始采样点上精确插值, 但在阶跃附近会出现过冲.

use crate::consts::DEFAULT_TARGET_SPACING;
use crate::{HuVolume, Idx3d, VolumeError, VoxelGrid};
use ndarray::{Array3, ArrayView3, Axis, CowArray, Ix3, Zip};
use thiserror::Error;

/// 重采样错误.
#[derive(Debug, Error)]
pub enum ResampleError {
    /// 目标分辨率非正或非有限.
    #[error("target spacing must be positive and finite, got {0:?}")]
    InvalidTargetSpacing([f64; 3]),

    /// 输入在某个维度上为空.
    #[error("cannot resample a volume with an empty axis: shape {0:?}")]
    EmptyInput(Idx3d),

    /// 某个维度按比例取整后长度为 0.
    #[error("axis {axis} would shrink to zero length (input length {len}, factor {factor})")]
    EmptyOutput {
        /// 维度编号, 0 为 z.
        axis: usize,
        /// 输入长度.
        len: usize,
        /// 缩放倍率.
        factor: f64,
    },

    /// 重采样结果无法构成合法体数据.
    #[error(transparent)]
    Volume(#[from] VolumeError),
}

/// 插值方式.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum Interpolation {
    /// 三次 B 样条插值, 镜像边界.
    #[default]
    CubicSpline,

    /// 三线性插值 (逐轴线性).
    Trilinear,

    /// 最近邻插值.
    Nearest,
}

/// 重采样方案: 输出形状与实际达到的体素分辨率.
#[derive(Debug, Clone, PartialEq)]
pub struct ResamplePlan {
    /// 输出形状.
    pub new_shape: Idx3d,
    /// 实际体素分辨率.
    pub achieved_spacing: [f64; 3],
}

/// 重采样器. 仅保存配置, 不持有任何数据.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Resampler {
    target_spacing: [f64; 3],
    interpolation: Interpolation,
}

impl Default for Resampler {
    /// 1x1x1 mm, 三次 B 样条插值.
    fn default() -> Self {
        Self {
            target_spacing: DEFAULT_TARGET_SPACING,
            interpolation: Interpolation::default(),
        }
    }
}

impl Resampler {
    /// 以给定目标分辨率 (z, 高, 宽) 构建重采样器.
    pub fn new(target_spacing: [f64; 3]) -> Result<Self, ResampleError> {
        if target_spacing.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(ResampleError::InvalidTargetSpacing(target_spacing));
        }
        Ok(Self {
            target_spacing,
            interpolation: Interpolation::default(),
        })
    }

    /// 更换插值方式.
    #[inline]
    pub fn with_interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = interpolation;
        self
    }

    /// 目标体素分辨率.
    #[inline]
    pub fn target_spacing(&self) -> [f64; 3] {
        self.target_spacing
    }

    /// 插值方式.
    #[inline]
    pub fn interpolation(&self) -> Interpolation {
        self.interpolation
    }

    /// 计算给定形状与原始分辨率下的重采样方案.
    pub fn plan(&self, shape: Idx3d, native: [f64; 3]) -> Result<ResamplePlan, ResampleError> {
        let (z, h, w) = shape;
        if z == 0 || h == 0 || w == 0 {
            return Err(ResampleError::EmptyInput(shape));
        }
        let old = [z, h, w];
        let mut new = [0usize; 3];
        let mut achieved = [0.0; 3];
        for axis in 0..3 {
            let factor = native[axis] / self.target_spacing[axis];
            let len = (old[axis] as f64 * factor).round_ties_even();
            if !(len >= 1.0) {
                return Err(ResampleError::EmptyOutput {
                    axis,
                    len: old[axis],
                    factor,
                });
            }
            new[axis] = len as usize;
            let actual = len / old[axis] as f64;
            achieved[axis] = native[axis] / actual;
        }
        Ok(ResamplePlan {
            new_shape: (new[0], new[1], new[2]),
            achieved_spacing: achieved,
        })
    }

    /// 重采样. 返回的扫描携带实际达到的体素分辨率.
    pub fn resample(&self, volume: &HuVolume) -> Result<HuVolume, ResampleError> {
        let plan = self.plan(volume.shape(), volume.spacing())?;
        let (nz, nh, nw) = plan.new_shape;

        let mut buf = volume.data().mapv(f32::from);
        for (axis, len) in [nz, nh, nw].into_iter().enumerate() {
            if buf.len_of(Axis(axis)) != len {
                buf = zoom_axis(buf.view(), Axis(axis), len, self.interpolation);
            }
        }
        let data = buf.mapv(|v| v.round_ties_even().clamp(i16::MIN as f32, i16::MAX as f32) as i16);

        log::debug!(
            "resampled {:?} @ {:?} -> {:?} @ {:?}",
            volume.shape(),
            volume.spacing(),
            plan.new_shape,
            plan.achieved_spacing
        );
        Ok(HuVolume::new(data, plan.achieved_spacing)?)
    }
}

/// 输出坐标 `out` 对应的输入坐标: `out * (in_len - 1) / (out_len - 1)`.
#[inline]
fn source_coord(out: usize, in_len: usize, out_len: usize) -> f64 {
    if out_len <= 1 {
        0.0
    } else {
        out as f64 * (in_len - 1) as f64 / (out_len - 1) as f64
    }
}

/// 三次 B 样条递归滤波器的极点 `sqrt(3) - 2`.
const SPLINE_POLE: f64 = -0.267_949_192_431_122_7;

/// 镜像边界下的下标映射, 周期为 `2 * (len - 1)`.
#[inline]
fn mirror_index(i: isize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let period = 2 * (len as isize - 1);
    let i = i.rem_euclid(period);
    if i >= len as isize {
        (period - i) as usize
    } else {
        i as usize
    }
}

/// 将一维采样原地转换为三次 B 样条系数 (镜像边界).
fn prefilter_mirror(c: &mut [f64]) {
    let n = c.len();
    if n < 2 {
        return;
    }
    let z = SPLINE_POLE;
    c.iter_mut().for_each(|v| *v *= 6.0);

    // 因果方向的初值: 对镜像延拓后的信号精确求和.
    let mut sum = c[0] + z.powi(n as i32 - 1) * c[n - 1];
    for (k, v) in c.iter().enumerate().take(n - 1).skip(1) {
        sum += (z.powi(k as i32) + z.powi((2 * n - 2 - k) as i32)) * v;
    }
    c[0] = sum / (1.0 - z.powi(2 * n as i32 - 2));
    for k in 1..n {
        c[k] += z * c[k - 1];
    }

    c[n - 1] = z / (z * z - 1.0) * (c[n - 1] + z * c[n - 2]);
    for k in (0..n - 1).rev() {
        c[k] = z * (c[k + 1] - c[k]);
    }
}

/// 小数偏移 `t` 处, 下标 `i - 1 ..= i + 2` 四个系数的三次 B 样条权重.
#[inline]
fn bspline_weights(t: f64) -> [f64; 4] {
    let t2 = t * t;
    let t3 = t2 * t;
    let u = 1.0 - t;
    [
        u * u * u / 6.0,
        (4.0 - 6.0 * t2 + 3.0 * t3) / 6.0,
        (1.0 + 3.0 * t + 3.0 * t2 - 3.0 * t3) / 6.0,
        t3 / 6.0,
    ]
}

/// 沿 `axis` 的每一条线做样条预滤波.
fn spline_coefficients(input: ArrayView3<'_, f32>, axis: Axis) -> Array3<f32> {
    let mut coef = input.to_owned();
    let mut line = Vec::with_capacity(input.len_of(axis));
    for mut lane in coef.lanes_mut(axis) {
        line.clear();
        line.extend(lane.iter().map(|&v| v as f64));
        prefilter_mirror(&mut line);
        lane.iter_mut().zip(&line).for_each(|(d, &s)| *d = s as f32);
    }
    coef
}

/// 沿单个维度缩放到 `out_len`.
fn zoom_axis(
    input: ArrayView3<'_, f32>,
    axis: Axis,
    out_len: usize,
    interpolation: Interpolation,
) -> Array3<f32> {
    let in_len = input.len_of(axis);
    let mut shape = input.raw_dim();
    shape[axis.index()] = out_len;
    let mut out = Array3::<f32>::zeros(shape);

    let source: CowArray<'_, f32, Ix3> = match interpolation {
        Interpolation::CubicSpline => spline_coefficients(input, axis).into(),
        _ => input.into(),
    };

    for o in 0..out_len {
        let c = source_coord(o, in_len, out_len);
        let mut dst = out.index_axis_mut(axis, o);
        match interpolation {
            Interpolation::Nearest => {
                let i = (c.round() as usize).min(in_len - 1);
                Zip::from(dst)
                    .and(source.index_axis(axis, i))
                    .for_each(|d, &s| *d = s);
            }
            Interpolation::Trilinear => {
                let i0 = (c.floor() as usize).min(in_len - 1);
                let i1 = (i0 + 1).min(in_len - 1);
                let t = (c - i0 as f64) as f32;
                Zip::from(dst)
                    .and(source.index_axis(axis, i0))
                    .and(source.index_axis(axis, i1))
                    .for_each(|d, &a, &b| *d = a + (b - a) * t);
            }
            Interpolation::CubicSpline => {
                let i = c.floor() as isize;
                for (k, w) in bspline_weights(c - i as f64).into_iter().enumerate() {
                    let w = w as f32;
                    Zip::from(&mut dst)
                        .and(source.index_axis(axis, mirror_index(i - 1 + k as isize, in_len)))
                        .for_each(|d, &s| *d += w * s);
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_plan_keeps_extent(
            (z, h, w) in (1usize..200, 1usize..600, 1usize..600),
            native in prop::array::uniform3(0.3f64..3.0),
            target in prop::array::uniform3(0.5f64..2.0),
        ) {
            let plan = match Resampler::new(target).unwrap().plan((z, h, w), native) {
                Ok(plan) => plan,
                Err(ResampleError::EmptyOutput { .. }) => return Ok(()),
                Err(e) => return Err(TestCaseError::fail(e.to_string())),
            };
            let old = [z, h, w];
            let new = [plan.new_shape.0, plan.new_shape.1, plan.new_shape.2];
            for axis in 0..3 {
                prop_assert!(new[axis] >= 1);
                let expected = (old[axis] as f64 * (native[axis] / target[axis])).round_ties_even();
                prop_assert_eq!(new[axis] as f64, expected);
                let extent = plan.achieved_spacing[axis] * new[axis] as f64;
                let original = native[axis] * old[axis] as f64;
                prop_assert!((extent - original).abs() <= 1e-9 * original);
            }
        }

        #[test]
        fn prop_resample_constant_volume(
            (z, h, w) in (2usize..6, 2usize..6, 2usize..6),
            native in prop::array::uniform3(prop::sample::select(vec![0.5f64, 1.0, 2.0])),
            hu in -1000i16..400,
            interpolation in prop::sample::select(vec![
                Interpolation::CubicSpline,
                Interpolation::Trilinear,
                Interpolation::Nearest,
            ]),
        ) {
            let v = HuVolume::new(Array3::from_elem((z, h, w), hu), native).unwrap();
            let out = Resampler::default().with_interpolation(interpolation).resample(&v).unwrap();
            prop_assert!(out.data().iter().all(|&x| x == hu));
            let (a, b) = (out.extent_mm(), v.extent_mm());
            for axis in 0..3 {
                prop_assert!((a[axis] - b[axis]).abs() < 1e-9);
            }
        }
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_plan_shape_consistency() {
        let r = Resampler::default();
        let native = [2.5, 0.7, 0.7];
        let shape = (10, 37, 41);
        let plan = r.plan(shape, native).unwrap();
        // 25, 25.9 -> 26, 28.7 -> 29
        assert_eq!(plan.new_shape, (25, 26, 29));
        let old = [10.0, 37.0, 41.0];
        let new = [25.0, 26.0, 29.0];
        for axis in 0..3 {
            assert!(close(
                plan.achieved_spacing[axis] * new[axis],
                native[axis] * old[axis]
            ));
        }
    }

    #[test]
    fn test_plan_rounds_half_to_even() {
        let r = Resampler::new([2.0, 1.0, 1.0]).unwrap();
        // 5 * 1 / 2 = 2.5 -> 2, 7 * 1 / 2 = 3.5 -> 4
        assert_eq!(r.plan((5, 1, 1), [1.0; 3]).unwrap().new_shape.0, 2);
        assert_eq!(r.plan((7, 1, 1), [1.0; 3]).unwrap().new_shape.0, 4);
    }

    #[test]
    fn test_plan_errors() {
        assert!(Resampler::new([0.0, 1.0, 1.0]).is_err());
        assert!(Resampler::new([1.0, f64::INFINITY, 1.0]).is_err());

        let r = Resampler::new([10.0, 1.0, 1.0]).unwrap();
        assert!(matches!(
            r.plan((2, 4, 4), [1.0; 3]),
            Err(ResampleError::EmptyOutput { axis: 0, len: 2, .. })
        ));
        assert!(matches!(
            r.plan((0, 4, 4), [1.0; 3]),
            Err(ResampleError::EmptyInput((0, 4, 4)))
        ));
    }

    #[test]
    fn test_resample_identity() {
        let data = Array3::from_shape_fn((3, 4, 5), |(z, h, w)| (z * 100 + h * 10 + w) as i16);
        let v = HuVolume::new(data.clone(), [1.0; 3]).unwrap();
        let out = Resampler::default().resample(&v).unwrap();
        assert_eq!(out.data(), data.view());
        assert_eq!(out.spacing(), [1.0; 3]);
    }

    #[test]
    fn test_resample_linear_upsample() {
        // z: 2 -> 4 at spacing 2 -> 1, positions 0, 1/3, 2/3, 1.
        let mut data = Array3::<i16>::zeros((2, 1, 1));
        data[(1, 0, 0)] = 300;
        let v = HuVolume::new(data, [2.0, 1.0, 1.0]).unwrap();
        let out = Resampler::default()
            .with_interpolation(Interpolation::Trilinear)
            .resample(&v)
            .unwrap();
        assert_eq!(out.shape(), (4, 1, 1));
        assert_eq!(out.spacing(), [1.0, 1.0, 1.0]);
        let col: Vec<i16> = out.data().iter().copied().collect();
        assert_eq!(col, vec![0, 100, 200, 300]);

        let near = Resampler::default()
            .with_interpolation(Interpolation::Nearest)
            .resample(&v)
            .unwrap();
        let col: Vec<i16> = near.data().iter().copied().collect();
        assert_eq!(col, vec![0, 0, 300, 300]);
    }

    #[test]
    fn test_resample_cubic_overshoots_step() {
        // z: 4 -> 8, 阶跃 0 0 100 100; 参考值为镜像边界三次样条的结果.
        let mut data = Array3::<i16>::zeros((4, 1, 1));
        data[(2, 0, 0)] = 100;
        data[(3, 0, 0)] = 100;
        let v = HuVolume::new(data, [2.0, 1.0, 1.0]).unwrap();
        let r = Resampler::default();
        assert_eq!(r.interpolation(), Interpolation::CubicSpline);
        let out = r.resample(&v).unwrap();
        assert_eq!(out.shape(), (8, 1, 1));
        let col: Vec<i16> = out.data().iter().copied().collect();
        assert_eq!(col, vec![0, -6, -6, 25, 75, 106, 106, 100]);
        assert!(col.iter().any(|&hu| hu < 0));
        assert!(col.iter().any(|&hu| hu > 100));

        let linear = Resampler::default()
            .with_interpolation(Interpolation::Trilinear)
            .resample(&v)
            .unwrap();
        assert!(linear.data().iter().all(|&hu| (0..=100).contains(&hu)));
    }

    #[test]
    fn test_spline_interpolates_samples() {
        let samples = [5.0, -3.0, 7.0, 2.0, 9.0];
        let mut coef = samples;
        prefilter_mirror(&mut coef);
        for (i, &expected) in samples.iter().enumerate() {
            let w = bspline_weights(0.0);
            let value: f64 = (0..4)
                .map(|k| w[k] * coef[mirror_index(i as isize - 1 + k as isize, samples.len())])
                .sum();
            assert!((value - expected).abs() < 1e-9);
        }
        assert_eq!(mirror_index(-1, 4), 1);
        assert_eq!(mirror_index(4, 4), 2);
        assert_eq!(mirror_index(5, 1), 0);
    }

    #[test]
    fn test_resample_downsample_keeps_extent() {
        let data = Array3::<i16>::from_elem((4, 6, 6), -1000);
        let v = HuVolume::new(data, [1.0, 0.5, 0.5]).unwrap();
        let out = Resampler::default().resample(&v).unwrap();
        assert_eq!(out.shape(), (4, 3, 3));
        assert!(out.data().iter().all(|&hu| hu == -1000));
        assert_eq!(out.extent_mm(), v.extent_mm());
    }
}
