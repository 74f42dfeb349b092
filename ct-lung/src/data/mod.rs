use std::ops::Index;

use ndarray::{Array3, ArrayView3, Axis};
use thiserror::Error;

use crate::{Idx2d, Idx3d};

pub mod slice;
pub mod window;

pub use slice::{ImgWriteVis, MaskSlice, ScanSlice};

#[cfg(feature = "plot")]
pub use slice::ImgDisplay;

pub use window::CtWindow;

/// 构建体数据时的错误.
#[derive(Debug, Error)]
pub enum VolumeError {
    /// 某个维度长度为 0.
    #[error("volume has an empty axis: shape {0:?}")]
    EmptyAxis(Idx3d),

    /// 体素分辨率非正或非有限.
    #[error("voxel spacing must be positive and finite, got {0:?}")]
    InvalidSpacing([f64; 3]),

    /// 掩码中出现了 0/1 以外的值.
    #[error("mask may only contain 0 or 1, found {0}")]
    InvalidMaskValue(i8),
}

/// 检查形状与体素分辨率是否满足体数据不变量.
fn validate(shape: Idx3d, spacing: [f64; 3]) -> Result<(), VolumeError> {
    let (z, h, w) = shape;
    if z == 0 || h == 0 || w == 0 {
        return Err(VolumeError::EmptyAxis(shape));
    }
    if spacing.iter().any(|s| !s.is_finite() || *s <= 0.0) {
        return Err(VolumeError::InvalidSpacing(spacing));
    }
    Ok(())
}

/// 3D 体数据的共用属性和部分通用操作.
///
/// 所有体数据均按 (z, 高, 宽) 的顺序组织, 体素分辨率以毫米为单位.
pub trait VoxelGrid {
    /// 获取数据形状大小.
    fn shape(&self) -> Idx3d;

    /// 获取单个体素分辨率, 分别代表空间 (相邻切片方向), 高, 宽.
    fn spacing(&self) -> [f64; 3];

    /// 获取数据水平切片形状大小.
    #[inline]
    fn slice_shape(&self) -> Idx2d {
        let (_, h, w) = self.shape();
        (h, w)
    }

    /// 获取水平切片个数.
    #[inline]
    fn len_z(&self) -> usize {
        self.shape().0
    }

    /// 获取数据体素个数.
    #[inline]
    fn size(&self) -> usize {
        let (z, h, w) = self.shape();
        z * h * w
    }

    /// 空间方向 (相邻 2D 切片的方向) 体素分辨率.
    #[inline]
    fn z_mm(&self) -> f64 {
        self.spacing()[0]
    }

    /// height 方向体素分辨率.
    #[inline]
    fn height_mm(&self) -> f64 {
        self.spacing()[1]
    }

    /// width 方向体素分辨率.
    #[inline]
    fn width_mm(&self) -> f64 {
        self.spacing()[2]
    }

    /// 体素分辨率在三个维度上是否是各向同的?
    #[inline]
    fn is_isotropic(&self) -> bool {
        let [z, h, w] = self.spacing();
        z == h && z == w
    }

    /// 获取体素的实际体积值, 以立方毫米为单位.
    #[inline]
    fn voxel(&self) -> f64 {
        self.spacing().iter().product()
    }

    /// 获取三个方向上的物理尺寸 (毫米), 即 `shape * spacing`.
    #[inline]
    fn extent_mm(&self) -> [f64; 3] {
        let (z, h, w) = self.shape();
        let [sz, sh, sw] = self.spacing();
        [z as f64 * sz, h as f64 * sh, w as f64 * sw]
    }
}

/// 以 HU 值保存的 3D CT 扫描. HU 值以 `i16` 保存.
#[derive(Debug, Clone)]
pub struct HuVolume {
    data: Array3<i16>,
    spacing: [f64; 3],
}

impl VoxelGrid for HuVolume {
    #[inline]
    fn shape(&self) -> Idx3d {
        self.data.dim()
    }

    #[inline]
    fn spacing(&self) -> [f64; 3] {
        self.spacing
    }
}

impl Index<Idx3d> for HuVolume {
    type Output = i16;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

impl HuVolume {
    /// 由 (z, 高, 宽) 组织的数据与对应体素分辨率构建扫描.
    ///
    /// 任一维度为空, 或分辨率不是正的有限值时返回 `Err`.
    pub fn new(data: Array3<i16>, spacing: [f64; 3]) -> Result<Self, VolumeError> {
        validate(data.dim(), spacing)?;
        Ok(Self { data, spacing })
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView3<'_, i16> {
        self.data.view()
    }

    /// 获取 3D 扫描 z 空间的第 `z_index` 层切片视图.
    ///
    /// 当 `z_index` 越界时 panic.
    #[inline]
    pub fn slice_at(&self, z_index: usize) -> ScanSlice<'_> {
        ScanSlice::new(self.data.index_axis(Axis(0), z_index))
    }

    /// 获取能按升序迭代 3D 扫描水平不可变切片的迭代器.
    #[inline]
    pub fn slice_iter(&self) -> impl ExactSizeIterator<Item = ScanSlice> {
        self.data.axis_iter(Axis(0)).map(ScanSlice::new)
    }

    /// 获取最小与最大 HU 值.
    pub fn min_max(&self) -> (i16, i16) {
        self.data
            .iter()
            .fold((i16::MAX, i16::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)))
    }
}

/// 3D 肺部二值掩码. `true` 代表肺组织.
///
/// 掩码由分割器一次性生成, 此后不再修改, 因此不提供任何可变访问.
#[derive(Debug, Clone, PartialEq)]
pub struct LungMask {
    data: Array3<bool>,
    spacing: [f64; 3],
}

impl VoxelGrid for LungMask {
    #[inline]
    fn shape(&self) -> Idx3d {
        self.data.dim()
    }

    #[inline]
    fn spacing(&self) -> [f64; 3] {
        self.spacing
    }
}

impl Index<Idx3d> for LungMask {
    type Output = bool;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

impl LungMask {
    /// 直接包装分割结果. 调用者保证形状与分辨率来自合法的 [`HuVolume`].
    #[inline]
    pub(crate) fn from_raw(data: Array3<bool>, spacing: [f64; 3]) -> Self {
        debug_assert!(validate(data.dim(), spacing).is_ok());
        Self { data, spacing }
    }

    /// 从以 `i8` 存储的 0/1 数组恢复掩码.
    pub fn from_i8(data: Array3<i8>, spacing: [f64; 3]) -> Result<Self, VolumeError> {
        validate(data.dim(), spacing)?;
        if let Some(&bad) = data.iter().find(|v| !matches!(**v, 0 | 1)) {
            return Err(VolumeError::InvalidMaskValue(bad));
        }
        Ok(Self {
            data: data.mapv(|v| v == 1),
            spacing,
        })
    }

    /// 转为 0/1 的 `i8` 数组, 便于持久化存储.
    #[inline]
    pub fn to_i8(&self) -> Array3<i8> {
        self.data.mapv(i8::from)
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView3<'_, bool> {
        self.data.view()
    }

    /// 获取肺体素个数.
    #[inline]
    pub fn count(&self) -> usize {
        self.data.iter().filter(|p| **p).count()
    }

    /// 掩码中是否不存在肺体素?
    #[inline]
    pub fn is_empty(&self) -> bool {
        !self.data.iter().any(|p| *p)
    }

    /// 肺的实际体积, 以立方毫米为单位.
    #[inline]
    pub fn volume_mm3(&self) -> f64 {
        self.count() as f64 * self.voxel()
    }

    /// 获取 3D 掩码 z 空间的第 `z_index` 层切片.
    ///
    /// 当 `z_index` 越界时 panic.
    #[inline]
    pub fn slice_at(&self, z_index: usize) -> MaskSlice<'_> {
        MaskSlice::new(self.data.index_axis(Axis(0), z_index))
    }

    /// 获取能按升序迭代 3D 掩码水平切片的迭代器.
    #[inline]
    pub fn slice_iter(&self) -> impl ExactSizeIterator<Item = MaskSlice> {
        self.data.axis_iter(Axis(0)).map(MaskSlice::new)
    }

    /// 收集所有肺体素对应的下标. 结果按行优先存储.
    pub fn lung_pos(&self) -> Vec<Idx3d> {
        self.data
            .indexed_iter()
            .filter_map(|(pos, lung)| lung.then_some(pos))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_rejects_empty_axis() {
        let data = Array3::<i16>::zeros((0, 4, 4));
        assert!(matches!(
            HuVolume::new(data, [1.0; 3]),
            Err(VolumeError::EmptyAxis((0, 4, 4)))
        ));
    }

    #[test]
    fn test_volume_rejects_bad_spacing() {
        let data = Array3::<i16>::zeros((2, 2, 2));
        assert!(HuVolume::new(data.clone(), [1.0, 0.0, 1.0]).is_err());
        assert!(HuVolume::new(data.clone(), [1.0, -0.5, 1.0]).is_err());
        assert!(HuVolume::new(data, [f64::NAN, 1.0, 1.0]).is_err());
    }

    #[test]
    fn test_voxel_grid_attrs() {
        let v = HuVolume::new(Array3::zeros((3, 4, 5)), [2.5, 0.5, 0.5]).unwrap();
        assert_eq!(v.slice_shape(), (4, 5));
        assert_eq!(v.len_z(), 3);
        assert_eq!(v.size(), 60);
        assert!(!v.is_isotropic());
        assert_eq!(v.voxel(), 0.625);
        assert_eq!(v.extent_mm(), [7.5, 2.0, 2.5]);
    }

    #[test]
    fn test_min_max() {
        let mut data = Array3::<i16>::from_elem((1, 2, 2), -1000);
        data[(0, 1, 1)] = 0;
        let v = HuVolume::new(data, [1.0; 3]).unwrap();
        assert_eq!(v.min_max(), (-1000, 0));
    }

    #[test]
    fn test_mask_i8_conversion() {
        let mut raw = Array3::<i8>::zeros((2, 2, 2));
        raw[(1, 0, 1)] = 1;
        let mask = LungMask::from_i8(raw.clone(), [1.0; 3]).unwrap();
        assert_eq!(mask.count(), 1);
        assert_eq!(mask.lung_pos(), vec![(1, 0, 1)]);
        assert_eq!(mask.to_i8(), raw);

        raw[(0, 0, 0)] = 2;
        assert!(matches!(
            LungMask::from_i8(raw, [1.0; 3]),
            Err(VolumeError::InvalidMaskValue(2))
        ));
    }
}
