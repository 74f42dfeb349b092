//! 病人级别的扫描加载器.
//!
//! 提供迭代器风格的数据集获取模式.

use super::series::{load_scan, visible_entries, RawScan, ScanLoadError};
use std::path::{Path, PathBuf};

/// 列出 `images_dir` 下所有病人编号 (子目录名), 按字典序排列.
///
/// 以 `.` 开头的条目 (如 `.DS_Store`) 与普通文件会被忽略.
pub fn patient_ids<P: AsRef<Path>>(images_dir: P) -> Result<Vec<String>, ScanLoadError> {
    Ok(visible_entries(images_dir, true)?
        .into_iter()
        .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .collect())
}

/// 从给定病人编号与路径创建扫描加载器. 编号按给定顺序加载.
pub fn scan_loader<I: IntoIterator<Item = String>, P: AsRef<Path>>(ids: I, images_dir: P) -> ScanLoader {
    let mut ids: Vec<String> = ids.into_iter().collect();
    ids.reverse();
    ScanLoader {
        path: images_dir.as_ref().to_owned(),
        ids_rev: ids,
    }
}

/// 加载 `images_dir` 下全部病人, 跳过排序后的前 `resume_from` 个.
pub fn resumable_scan_loader<P: AsRef<Path>>(images_dir: P, resume_from: usize) -> Result<ScanLoader, ScanLoadError> {
    let ids = patient_ids(images_dir.as_ref())?;
    Ok(scan_loader(ids.into_iter().skip(resume_from), images_dir))
}

/// DICOM 序列数据加载器. 每次迭代加载一个病人.
pub struct ScanLoader {
    path: PathBuf,
    ids_rev: Vec<String>,
}

impl Iterator for ScanLoader {
    type Item = (String, Result<RawScan, ScanLoadError>);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.ids_rev.pop()?;

        self.path.push(&id);
        let scan = load_scan(self.path.as_path());
        self.path.pop();

        Some((id, scan))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.ids_rev.len(), Some(self.ids_rev.len()))
    }
}

impl ExactSizeIterator for ScanLoader {
    #[inline]
    fn len(&self) -> usize {
        self.ids_rev.len()
    }
}
