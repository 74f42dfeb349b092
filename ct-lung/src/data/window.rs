//! 用于灰度显示的 CT 窗.

use crate::consts::gray;

/// CT 窗: 把 `[level - width / 2, level + width / 2]` 内的 HU 值线性拉伸到 `0..=255`.
///
/// 窗外的值分别截断为黑色与白色. 实例不可变.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CtWindow {
    level: f32,
    width: f32,
}

impl Default for CtWindow {
    /// 肺窗.
    #[inline]
    fn default() -> Self {
        Self::from_lung_visual()
    }
}

impl CtWindow {
    /// 以窗位 `level` 与窗宽 `width` 构建.
    ///
    /// `width` 必须为正, 且两者都必须有限, 否则返回 `None`.
    pub fn new(level: f32, width: f32) -> Option<CtWindow> {
        (level.is_finite() && width.is_finite() && width > 0.0).then_some(Self { level, width })
    }

    /// 肺窗: 窗位 -600, 窗宽 1500.
    #[inline]
    pub const fn from_lung_visual() -> CtWindow {
        Self {
            level: -600.0,
            width: 1500.0,
        }
    }

    /// 纵隔窗: 窗位 40, 窗宽 400.
    #[inline]
    pub const fn from_mediastinal_visual() -> CtWindow {
        Self {
            level: 40.0,
            width: 400.0,
        }
    }

    /// 窗位.
    #[inline]
    pub fn level(&self) -> f32 {
        self.level
    }

    /// 窗宽.
    #[inline]
    pub fn width(&self) -> f32 {
        self.width
    }

    /// 窗的 HU 范围 `(下限, 上限)`.
    #[inline]
    pub fn bounds(&self) -> (f32, f32) {
        let half = self.width / 2.0;
        (self.level - half, self.level + half)
    }

    /// `hu` 在窗内的相对位置, 截断到 `[0, 1]`. `hu` 非有限时返回 `None`.
    pub fn eval_f32(&self, hu: f32) -> Option<f32> {
        if !hu.is_finite() {
            return None;
        }
        let (lo, _) = self.bounds();
        Some(((hu - lo) / self.width).clamp(0.0, 1.0))
    }

    /// `hu` 对应的灰度值. `hu` 非有限时返回 `None`.
    #[inline]
    pub fn eval(&self, hu: f32) -> Option<u8> {
        self.eval_f32(hu).map(|t| (t * gray::WHITE as f32) as u8)
    }

    /// 同 [`CtWindow::eval`], 输入为扫描中存储的 `i16` HU 值.
    #[inline]
    pub fn eval_hu(&self, hu: i16) -> u8 {
        self.eval(hu as f32).unwrap_or(gray::BLACK)
    }
}
