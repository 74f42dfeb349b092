//! 病人癌症标签表 (`stage1_labels.csv`).

use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

/// 读取标签表时的错误.
#[derive(Debug, Error)]
pub enum LabelsError {
    /// CSV 解析错误 (包括文件不存在).
    #[error("cannot read label table: {0}")]
    Csv(#[from] csv::Error),

    /// `cancer` 列出现 0/1 以外的值.
    #[error("patient `{id}` has cancer flag {flag}, expected 0 or 1")]
    InvalidFlag {
        /// 病人编号.
        id: String,
        /// 标签值.
        flag: u8,
    },

    /// 同一病人出现多次.
    #[error("patient `{0}` appears more than once")]
    DuplicateId(String),
}

/// CSV 中的一行.
#[derive(Debug, Deserialize)]
struct LabelRecord {
    id: String,
    cancer: u8,
}

/// 病人的癌症状态.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum CancerStatus {
    /// 良性 (cancer = 0).
    Benign,
    /// 癌变 (cancer = 1).
    Cancerous,
    /// 不在标签表中.
    #[default]
    Unknown,
}

impl CancerStatus {
    /// 小写名称, 用于文件名与标题.
    pub const fn as_str(self) -> &'static str {
        match self {
            CancerStatus::Benign => "benign",
            CancerStatus::Cancerous => "cancerous",
            CancerStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for CancerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 只读的病人标签表: 病人编号 -> 是否癌变.
#[derive(Debug, Clone, Default)]
pub struct PatientLabels {
    cancer: HashMap<String, bool>,
}

impl PatientLabels {
    /// 从任意 CSV 数据源读取. 表头必须包含 `id` 与 `cancer` 两列.
    pub fn from_reader<R: Read>(rdr: R) -> Result<Self, LabelsError> {
        let mut reader = csv::Reader::from_reader(rdr);
        let mut cancer = HashMap::new();
        for record in reader.deserialize() {
            let LabelRecord { id, cancer: flag } = record?;
            let flag = match flag {
                0 => false,
                1 => true,
                flag => return Err(LabelsError::InvalidFlag { id, flag }),
            };
            if cancer.insert(id.clone(), flag).is_some() {
                return Err(LabelsError::DuplicateId(id));
            }
        }
        Ok(Self { cancer })
    }

    /// 从 CSV 文件读取.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, LabelsError> {
        let file = std::fs::File::open(path).map_err(csv::Error::from)?;
        let labels = Self::from_reader(file)?;
        log::debug!("loaded {} patient labels", labels.len());
        Ok(labels)
    }

    /// 病人个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.cancer.len()
    }

    /// 标签表是否为空?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cancer.is_empty()
    }

    /// 原始癌症标签. 不在表中时返回 `None`.
    #[inline]
    pub fn cancer(&self, patient_id: &str) -> Option<bool> {
        self.cancer.get(patient_id).copied()
    }

    /// 病人的癌症状态.
    pub fn cancer_status(&self, patient_id: &str) -> CancerStatus {
        match self.cancer(patient_id) {
            Some(true) => CancerStatus::Cancerous,
            Some(false) => CancerStatus::Benign,
            None => CancerStatus::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "id,cancer\n0015ceb851d7251b8f399e39779d1e7d,1\n0030a160d58723ff36d73f41b170ec21,0\n";

    #[test]
    fn test_cancer_status() {
        let labels = PatientLabels::from_reader(TABLE.as_bytes()).unwrap();
        assert_eq!(labels.len(), 2);
        assert_eq!(
            labels.cancer_status("0015ceb851d7251b8f399e39779d1e7d"),
            CancerStatus::Cancerous
        );
        assert_eq!(
            labels.cancer_status("0030a160d58723ff36d73f41b170ec21"),
            CancerStatus::Benign
        );
        assert_eq!(labels.cancer_status("nobody"), CancerStatus::Unknown);
        assert_eq!(CancerStatus::Unknown.to_string(), "unknown");
    }

    #[test]
    fn test_invalid_tables() {
        let bad_flag = "id,cancer\na,2\n";
        assert!(matches!(
            PatientLabels::from_reader(bad_flag.as_bytes()),
            Err(LabelsError::InvalidFlag { flag: 2, .. })
        ));

        let dup = "id,cancer\na,1\na,0\n";
        assert!(matches!(
            PatientLabels::from_reader(dup.as_bytes()),
            Err(LabelsError::DuplicateId(_))
        ));

        let not_a_number = "id,cancer\na,yes\n";
        assert!(matches!(
            PatientLabels::from_reader(not_a_number.as_bytes()),
            Err(LabelsError::Csv(_))
        ));
    }

    #[test]
    fn test_open_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stage1_labels.csv");
        std::fs::write(&path, TABLE).unwrap();
        let labels = PatientLabels::open(&path).unwrap();
        assert_eq!(labels.cancer("0030a160d58723ff36d73f41b170ec21"), Some(false));

        assert!(PatientLabels::open(dir.path().join("missing.csv")).is_err());
    }
}
