//! 通用常量.

/// CT HU 值相关常量.
pub mod hu {
    /// 原始像素中代表 "扫描范围外" 的填充值. 校准前会被置为 0.
    pub const OUTSIDE_SCAN_SENTINEL: i32 = -2000;

    /// 空气与组织的分界阈值. 严格大于该值的体素视为致密组织.
    pub const LUNG_THRESHOLD: i16 = -320;

    /// 归一化时的 HU 下限.
    pub const NORMALIZE_MIN: f32 = -1000.0;

    /// 归一化时的 HU 上限.
    pub const NORMALIZE_MAX: f32 = 400.0;

    /// 归一化之后的数据集像素均值, 用于零中心化.
    pub const PIXEL_MEAN: f32 = 0.25;

    /// 绘制 3D 表面时默认的等值面阈值.
    pub const SURFACE_THRESHOLD: f32 = -300.0;
}

/// 单通道颜色.
pub mod gray {
    /// 单通道黑色.
    pub const BLACK: u8 = 0b_0000_0000;

    /// 单通道白色.
    pub const WHITE: u8 = 0b_1111_1111;

    /// 肺掩码像素的可视化灰度.
    #[inline]
    pub const fn pretty(lung: bool) -> u8 {
        if lung {
            WHITE
        } else {
            BLACK
        }
    }
}

/// 重采样的默认目标体素分辨率 (毫米), 顺序为 (z, 高, 宽).
pub const DEFAULT_TARGET_SPACING: [f64; 3] = [1.0, 1.0, 1.0];

/// 直方图默认的分箱个数.
pub const HISTOGRAM_BINS: usize = 80;

/// 默认绘制的水平切片索引.
pub const DEFAULT_SLICE_INDEX: usize = 80;
