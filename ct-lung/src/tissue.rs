//! HU 值到组织类型的映射, 用于伪彩色可视化.

use crate::ScanSlice;
use image::{Rgb, RgbImage};
use std::fmt;

/// 组织类型.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Tissue {
    /// 空气.
    Air,
    /// 肺.
    Lung,
    /// 脂肪.
    Fat,
    /// 水.
    Water,
    /// 肌肉.
    Muscle,
    /// 血液.
    Blood,
    /// 肝脏.
    Liver,
    /// 软组织 (造影增强).
    SoftTissue,
    /// 骨骼.
    Bone,
}

impl Tissue {
    /// 名称.
    pub const fn name(self) -> &'static str {
        match self {
            Tissue::Air => "air",
            Tissue::Lung => "lung",
            Tissue::Fat => "fat",
            Tissue::Water => "water",
            Tissue::Muscle => "muscle",
            Tissue::Blood => "blood",
            Tissue::Liver => "liver",
            Tissue::SoftTissue => "soft_tissue",
            Tissue::Bone => "bone",
        }
    }
}

impl fmt::Display for Tissue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 组织表中的一项.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TissueEntry {
    /// 组织类型.
    pub tissue: Tissue,
    /// 典型 HU 值.
    pub reference: i16,
    /// 可视化颜色.
    pub color: [u8; 3],
    /// HU 下界.
    pub lower_bound: i16,
}

const fn entry(tissue: Tissue, reference: i16, color: [u8; 3], lower_bound: i16) -> TissueEntry {
    TissueEntry {
        tissue,
        reference,
        color,
        lower_bound,
    }
}

/// 固定的有序组织表. 下界严格递增.
pub const TISSUE_TABLE: [TissueEntry; 9] = [
    entry(Tissue::Air, -1000, [0, 0, 0], -2000),
    entry(Tissue::Lung, -700, [194, 105, 82], -950),
    entry(Tissue::Fat, -100, [194, 166, 115], -150),
    entry(Tissue::Water, 0, [102, 205, 170], -10),
    entry(Tissue::Muscle, 40, [192, 104, 88], 10),
    entry(Tissue::Blood, 50, [255, 0, 0], 30),
    entry(Tissue::Liver, 60, [221, 130, 101], 50),
    entry(Tissue::SoftTissue, 100, [255, 192, 203], 70),
    entry(Tissue::Bone, 700, [241, 214, 145], 300),
];

/// 查找 HU 值 `hu` 所属的组织项.
///
/// 选择 `hu - lower_bound` 为正且最小的项, 平局取表中靠前者.
/// 不存在这样的项 (即 `hu` 不高于所有下界) 时返回第一项 (空气).
pub fn lookup(hu: i16) -> &'static TissueEntry {
    let mut best: Option<(&TissueEntry, i32)> = None;
    for e in TISSUE_TABLE.iter() {
        let diff = hu as i32 - e.lower_bound as i32;
        if diff > 0 && best.map_or(true, |(_, d)| diff < d) {
            best = Some((e, diff));
        }
    }
    best.map_or(&TISSUE_TABLE[0], |(e, _)| e)
}

/// HU 值对应的组织类型.
#[inline]
pub fn value_to_tissue(hu: i16) -> Tissue {
    lookup(hu).tissue
}

/// HU 值对应的可视化颜色.
#[inline]
pub fn value_to_color(hu: i16) -> [u8; 3] {
    lookup(hu).color
}

/// 将整个切片按组织类型着色.
pub fn slice_to_rgb(slice: &ScanSlice<'_>) -> RgbImage {
    let (height, width) = slice.shape();
    let mut buf = RgbImage::new(width as u32, height as u32);
    for ((h, w), &hu) in slice.indexed_iter() {
        buf.put_pixel(w as u32, h as u32, Rgb(value_to_color(hu)));
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HuVolume;
    use ndarray::array;

    #[test]
    fn test_required_lookups() {
        assert_eq!(value_to_tissue(-1000), Tissue::Air);
        assert_eq!(value_to_tissue(700), Tissue::Bone);
        assert_eq!(value_to_tissue(25), Tissue::Muscle);
    }

    #[test]
    fn test_lookup_boundaries() {
        // 恰好等于下界不属于该组织.
        assert_eq!(value_to_tissue(-950), Tissue::Air);
        assert_eq!(value_to_tissue(-949), Tissue::Lung);
        assert_eq!(value_to_tissue(-10), Tissue::Fat);
        assert_eq!(value_to_tissue(0), Tissue::Water);
        assert_eq!(value_to_tissue(55), Tissue::Liver);
        // 不高于所有下界时回退到空气.
        assert_eq!(value_to_tissue(-2000), Tissue::Air);
        assert_eq!(value_to_tissue(i16::MIN), Tissue::Air);
        assert_eq!(value_to_tissue(i16::MAX), Tissue::Bone);
    }

    #[test]
    fn test_table_order() {
        assert!(TISSUE_TABLE
            .windows(2)
            .all(|w| w[0].lower_bound < w[1].lower_bound));
        assert_eq!(Tissue::SoftTissue.to_string(), "soft_tissue");
    }

    #[test]
    fn test_slice_to_rgb() {
        let v = HuVolume::new(array![[[-1000, 700], [25, -800]]], [1.0; 3]).unwrap();
        let img = slice_to_rgb(&v.slice_at(0));
        assert_eq!(img.dimensions(), (2, 2));
        assert_eq!(img.get_pixel(0, 0).0, value_to_color(-1000));
        assert_eq!(img.get_pixel(1, 0).0, value_to_color(700));
        assert_eq!(img.get_pixel(0, 1).0, value_to_color(25));
        assert_eq!(img.get_pixel(1, 1).0, value_to_color(-800));
    }
}
