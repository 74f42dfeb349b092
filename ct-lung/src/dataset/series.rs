//! 单个病人 DICOM 序列的加载.
//!
//! 每个病人目录中包含若干单层 DICOM 文件. 切片按 InstanceNumber 升序排列,
//! 层间距由前两层的 ImagePositionPatient (z 分量) 之差推导; 缺失时依次回退到
//! SliceLocation 之差与 SliceThickness 标签.

use dicom::object::{open_file, FileDicomObject, InMemDicomObject};
use dicom::pixeldata::{ConvertOptions, ModalityLutOption, PixelDecoder};
use dicom_dictionary_std::tags;
use ndarray::{Array2, Array3, Axis};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// 加载扫描时的错误.
#[derive(Debug, Error)]
pub enum ScanLoadError {
    /// 读取目录失败.
    #[error("cannot read scan directory `{path}`: {source}")]
    Io {
        /// 目录路径.
        path: PathBuf,
        /// 底层错误.
        source: std::io::Error,
    },

    /// 文件不是合法的 DICOM 文件.
    #[error("cannot parse DICOM file `{path}`: {source}")]
    Dicom {
        /// 文件路径.
        path: PathBuf,
        /// 底层错误.
        source: dicom::object::ReadError,
    },

    /// 像素数据解码失败.
    #[error("cannot decode pixel data of `{path}`: {message}")]
    PixelData {
        /// 文件路径.
        path: PathBuf,
        /// 底层错误信息.
        message: String,
    },

    /// 缺少必需的标签, 或标签值无法解析.
    #[error("`{path}` has no usable {tag} element")]
    MissingTag {
        /// 文件路径.
        path: PathBuf,
        /// 标签名.
        tag: &'static str,
    },

    /// 像素个数与 Rows * Columns 不符.
    #[error("`{path}` holds {found} pixels, expected {expected}")]
    PixelCount {
        /// 文件路径.
        path: PathBuf,
        /// Rows * Columns.
        expected: usize,
        /// 实际个数.
        found: usize,
    },

    /// 目录中没有任何切片.
    #[error("no slices found in `{0}`")]
    NoSlices(PathBuf),

    /// 两个切片具有相同的 InstanceNumber.
    #[error("duplicate InstanceNumber {0}")]
    DuplicateInstance(i32),

    /// 切片分辨率不一致.
    #[error("slice {instance} has shape {found:?}, expected {expected:?}")]
    InconsistentDimensions {
        /// 出错切片的 InstanceNumber.
        instance: i32,
        /// 第一层的 (Rows, Columns).
        expected: (usize, usize),
        /// 出错切片的 (Rows, Columns).
        found: (usize, usize),
    },

    /// 无法确定层间距.
    #[error("cannot determine slice spacing: no usable ImagePositionPatient, SliceLocation or SliceThickness")]
    MissingSliceSpacing,
}

/// 单层切片的头信息. 在加载时一次性解析.
#[derive(Debug, Clone, PartialEq)]
pub struct SliceHeader {
    /// InstanceNumber, 采集顺序.
    pub instance_number: i32,
    /// ImagePositionPatient.
    pub image_position: Option<[f64; 3]>,
    /// SliceLocation.
    pub slice_location: Option<f64>,
    /// SliceThickness 标签 (仅作为最后的回退).
    pub slice_thickness: Option<f64>,
    /// PixelSpacing, (行间距, 列间距).
    pub pixel_spacing: [f64; 2],
    /// Rows.
    pub rows: usize,
    /// Columns.
    pub columns: usize,
    /// RescaleIntercept.
    pub intercept: f64,
    /// RescaleSlope.
    pub slope: f64,
}

/// 层间距的来源.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SpacingSource {
    /// ImagePositionPatient z 分量之差.
    ImagePosition,
    /// SliceLocation 之差.
    SliceLocation,
    /// SliceThickness 标签.
    SliceThickness,
}

/// 整个扫描的元数据. 由第一层的头信息与层间距组成.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanMeta {
    /// 切片个数.
    pub slice_count: usize,
    /// 单层 (Rows, Columns).
    pub slice_shape: (usize, usize),
    /// 体素分辨率 (层间距, 行间距, 列间距), 毫米.
    pub spacing: [f64; 3],
    /// 层间距的来源.
    pub spacing_source: SpacingSource,
    /// RescaleIntercept, 假设对整个序列相同.
    pub intercept: f64,
    /// RescaleSlope, 假设对整个序列相同.
    pub slope: f64,
}

/// 原始 (未校准) 扫描.
#[derive(Debug, Clone)]
pub struct RawScan {
    /// 按 (z, 高, 宽) 堆叠的原始像素.
    pub pixels: Array3<i32>,
    /// 元数据.
    pub meta: ScanMeta,
}

/// 按 InstanceNumber 升序排列. 存在重复 InstanceNumber 时返回 `Err`.
pub fn sort_by_instance<T>(mut slices: Vec<(SliceHeader, T)>) -> Result<Vec<(SliceHeader, T)>, ScanLoadError> {
    slices.sort_by_key(|(h, _)| h.instance_number);
    if let Some(w) = slices
        .windows(2)
        .find(|w| w[0].0.instance_number == w[1].0.instance_number)
    {
        return Err(ScanLoadError::DuplicateInstance(w[0].0.instance_number));
    }
    Ok(slices)
}

/// 正的有限值.
#[inline]
fn positive(v: f64) -> Option<f64> {
    (v.is_finite() && v > 0.0).then_some(v)
}

/// 由已排序的切片头推导层间距.
///
/// 依次尝试前两层 ImagePositionPatient z 分量之差, 前两层 SliceLocation 之差,
/// 第一层的 SliceThickness. 只接受正的有限值.
pub fn slice_spacing(sorted: &[SliceHeader]) -> Result<(f64, SpacingSource), ScanLoadError> {
    let first = sorted.first().ok_or(ScanLoadError::MissingSliceSpacing)?;
    if let [a, b, ..] = sorted {
        if let (Some(pa), Some(pb)) = (a.image_position, b.image_position) {
            if let Some(t) = positive((pa[2] - pb[2]).abs()) {
                return Ok((t, SpacingSource::ImagePosition));
            }
        }
        if let (Some(la), Some(lb)) = (a.slice_location, b.slice_location) {
            if let Some(t) = positive((la - lb).abs()) {
                log::warn!("ImagePositionPatient unusable, slice spacing taken from SliceLocation");
                return Ok((t, SpacingSource::SliceLocation));
            }
        }
    }
    match first.slice_thickness.and_then(positive) {
        Some(t) => {
            log::warn!("slice spacing taken from the SliceThickness tag");
            Ok((t, SpacingSource::SliceThickness))
        }
        None => Err(ScanLoadError::MissingSliceSpacing),
    }
}

/// 由已排序的切片头构建扫描元数据, 同时检查每层分辨率是否一致.
pub fn scan_meta(sorted: &[SliceHeader]) -> Result<ScanMeta, ScanLoadError> {
    let first = sorted.first().ok_or(ScanLoadError::MissingSliceSpacing)?;
    let expected = (first.rows, first.columns);
    if let Some(bad) = sorted.iter().find(|h| (h.rows, h.columns) != expected) {
        return Err(ScanLoadError::InconsistentDimensions {
            instance: bad.instance_number,
            expected,
            found: (bad.rows, bad.columns),
        });
    }
    let (thickness, spacing_source) = slice_spacing(sorted)?;
    Ok(ScanMeta {
        slice_count: sorted.len(),
        slice_shape: expected,
        spacing: [thickness, first.pixel_spacing[0], first.pixel_spacing[1]],
        spacing_source,
        intercept: first.intercept,
        slope: first.slope,
    })
}

/// 解析单个文件的头信息.
fn read_header(obj: &FileDicomObject<InMemDicomObject>, path: &Path) -> Result<SliceHeader, ScanLoadError> {
    let missing = |tag: &'static str| ScanLoadError::MissingTag {
        path: path.to_owned(),
        tag,
    };
    let float = |tag| obj.element(tag).ok().and_then(|e| e.to_float64().ok());
    let floats = |tag| obj.element(tag).ok().and_then(|e| e.to_multi_float64().ok());

    let instance_number = obj
        .element(tags::INSTANCE_NUMBER)
        .ok()
        .and_then(|e| e.to_int::<i32>().ok())
        .ok_or_else(|| missing("InstanceNumber"))?;
    let rows = obj
        .element(tags::ROWS)
        .ok()
        .and_then(|e| e.to_int::<u16>().ok())
        .ok_or_else(|| missing("Rows"))?;
    let columns = obj
        .element(tags::COLUMNS)
        .ok()
        .and_then(|e| e.to_int::<u16>().ok())
        .ok_or_else(|| missing("Columns"))?;
    let pixel_spacing = match floats(tags::PIXEL_SPACING).as_deref() {
        Some([r, c, ..]) => [*r, *c],
        _ => return Err(missing("PixelSpacing")),
    };
    let image_position = match floats(tags::IMAGE_POSITION_PATIENT).as_deref() {
        Some([x, y, z, ..]) => Some([*x, *y, *z]),
        _ => None,
    };

    Ok(SliceHeader {
        instance_number,
        image_position,
        slice_location: float(tags::SLICE_LOCATION),
        slice_thickness: float(tags::SLICE_THICKNESS),
        pixel_spacing,
        rows: rows as usize,
        columns: columns as usize,
        intercept: float(tags::RESCALE_INTERCEPT).unwrap_or(0.0),
        slope: float(tags::RESCALE_SLOPE).unwrap_or(1.0),
    })
}

/// 解码单个文件的原始像素 (不应用 modality LUT).
fn read_pixels(
    obj: &FileDicomObject<InMemDicomObject>,
    header: &SliceHeader,
    path: &Path,
) -> Result<Array2<i32>, ScanLoadError> {
    let pixel_err = |e: &dyn std::fmt::Display| ScanLoadError::PixelData {
        path: path.to_owned(),
        message: e.to_string(),
    };
    let decoded = obj.decode_pixel_data().map_err(|e| pixel_err(&e))?;
    let options = ConvertOptions::new().with_modality_lut(ModalityLutOption::None);
    let mut values: Vec<i32> = decoded
        .to_vec_with_options(&options)
        .map_err(|e| pixel_err(&e))?;

    // 多帧文件只取第一帧.
    let expected = header.rows * header.columns;
    if values.len() < expected {
        return Err(ScanLoadError::PixelCount {
            path: path.to_owned(),
            expected,
            found: values.len(),
        });
    }
    values.truncate(expected);
    Array2::from_shape_vec((header.rows, header.columns), values).map_err(|_| ScanLoadError::PixelCount {
        path: path.to_owned(),
        expected,
        found: expected,
    })
}

/// 读取单个 DICOM 切片文件.
pub fn read_slice<P: AsRef<Path>>(path: P) -> Result<(SliceHeader, Array2<i32>), ScanLoadError> {
    let path = path.as_ref();
    let obj = open_file(path).map_err(|source| ScanLoadError::Dicom {
        path: path.to_owned(),
        source,
    })?;
    let header = read_header(&obj, path)?;
    let pixels = read_pixels(&obj, &header, path)?;
    Ok((header, pixels))
}

/// 列出目录中所有可见的普通文件, 按文件名排序.
pub(crate) fn visible_entries<P: AsRef<Path>>(dir: P, want_dirs: bool) -> Result<Vec<PathBuf>, ScanLoadError> {
    let dir = dir.as_ref();
    let io_err = |source| ScanLoadError::Io {
        path: dir.to_owned(),
        source,
    };
    let mut ans = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        let is_dir = entry.file_type().map_err(io_err)?.is_dir();
        if !hidden && is_dir == want_dirs {
            ans.push(entry.path());
        }
    }
    ans.sort();
    Ok(ans)
}

/// 加载一个病人目录下的完整 DICOM 序列.
///
/// 目录中所有可见文件都被视为切片; 以 `.` 开头的文件 (如 `.DS_Store`) 会被忽略.
pub fn load_scan<P: AsRef<Path>>(dir: P) -> Result<RawScan, ScanLoadError> {
    let dir = dir.as_ref();
    let files = visible_entries(dir, false)?;
    if files.is_empty() {
        return Err(ScanLoadError::NoSlices(dir.to_owned()));
    }

    let slices = files.iter().map(read_slice).collect::<Result<Vec<_>, _>>()?;
    let slices = sort_by_instance(slices)?;
    let headers: Vec<SliceHeader> = slices.iter().map(|(h, _)| h.clone()).collect();
    let meta = scan_meta(&headers)?;

    let (rows, columns) = meta.slice_shape;
    let mut pixels = Array3::<i32>::zeros((slices.len(), rows, columns));
    for (mut dst, (_, src)) in pixels.axis_iter_mut(Axis(0)).zip(slices.iter()) {
        dst.assign(src);
    }
    log::debug!(
        "loaded {} slices of {:?} from `{}`, spacing {:?} ({:?})",
        meta.slice_count,
        meta.slice_shape,
        dir.display(),
        meta.spacing,
        meta.spacing_source
    );
    Ok(RawScan { pixels, meta })
}
