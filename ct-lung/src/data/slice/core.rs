use crate::consts::gray;
use crate::Idx2d;
use ndarray::iter::Iter;
use ndarray::{ArrayView2, Ix2};
use std::ops::Index;

/// 不可变、借用的二维水平 CT 扫描切片. 像素为 HU 值.
pub struct ScanSlice<'a> {
    /// 底层数据的轻量级视图, 借用于 [`crate::HuVolume`].
    data: ArrayView2<'a, i16>,
}

impl Index<Idx2d> for ScanSlice<'_> {
    type Output = i16;

    #[inline]
    fn index(&self, index: Idx2d) -> &Self::Output {
        &self.data[index]
    }
}

impl<'a> ScanSlice<'a> {
    /// 直接初始化.
    #[inline]
    pub(crate) fn new(data: ArrayView2<'a, i16>) -> Self {
        Self { data }
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView2<'a, i16> {
        self.data.clone()
    }

    /// 获取可以迭代图像像素的迭代器.
    #[inline]
    pub fn iter(&self) -> Iter<'_, i16, Ix2> {
        self.data.iter()
    }

    /// 获取给定位置 (高, 宽) 的像素值. 越界时返回 `None`.
    #[inline]
    pub fn get(&self, pos: Idx2d) -> Option<&i16> {
        self.data.get(pos)
    }

    /// 图像的分辨率 (高, 宽).
    #[inline]
    pub fn shape(&self) -> Idx2d {
        self.data.dim()
    }

    /// 图像的像素个数.
    #[inline]
    pub fn size(&self) -> usize {
        let (h, w) = self.shape();
        h * w
    }

    /// 以行优先规则, 获取能迭代图像所有 `(索引, HU 值)` 的迭代器.
    #[inline]
    pub fn indexed_iter(&self) -> impl Iterator<Item = (Idx2d, &i16)> {
        self.data.indexed_iter()
    }

    /// 以行优先规则, 获取能迭代图像所有索引的迭代器.
    #[inline]
    pub fn pos_iter(&self) -> impl Iterator<Item = Idx2d> {
        super::iter::PosIter::new(self.shape())
    }
}

/// 不可变、借用的二维水平肺掩码切片.
pub struct MaskSlice<'a> {
    /// 底层数据的轻量级视图, 借用于 [`crate::LungMask`].
    data: ArrayView2<'a, bool>,
}

impl Index<Idx2d> for MaskSlice<'_> {
    type Output = bool;

    #[inline]
    fn index(&self, index: Idx2d) -> &Self::Output {
        &self.data[index]
    }
}

impl<'a> MaskSlice<'a> {
    /// 直接初始化.
    #[inline]
    pub(crate) fn new(data: ArrayView2<'a, bool>) -> Self {
        Self { data }
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView2<'a, bool> {
        self.data.clone()
    }

    /// 图像的分辨率 (高, 宽).
    #[inline]
    pub fn shape(&self) -> Idx2d {
        self.data.dim()
    }

    /// 该图是否为全背景图?
    #[inline]
    pub fn is_background(&self) -> bool {
        !self.data.iter().any(|p| *p)
    }

    /// 统计图像中肺像素总个数.
    #[inline]
    pub fn count(&self) -> usize {
        self.data.iter().filter(|p| **p).count()
    }

    /// 以行优先规则, 获取能迭代图像所有 `(索引, 是否为肺)` 的迭代器.
    #[inline]
    pub fn indexed_iter(&self) -> impl Iterator<Item = (Idx2d, &bool)> {
        self.data.indexed_iter()
    }

    /// 将掩码转化为行优先的可视化灰度序列 (肺为白色, 背景为黑色).
    pub fn as_row_major_gray(&self) -> Vec<u8> {
        self.data.iter().map(|&p| gray::pretty(p)).collect()
    }
}
