//! Shared test helpers for dpx-sync integration tests

#![allow(dead_code)]

pub mod fake_api;
pub mod log_capture;
pub mod submitter;

use std::path::Path;
use std::time::{Duration, SystemTime};

pub const HEADER_LINE: &str =
    "SalesOrder,SalesOrderItem,YY1_SALESFORCEID_I_SDI,Customer,AccountingDocument,CompanyCode,FiscalYear";

/// Write an extract file with the given data lines and modification time
pub fn write_extract(path: &Path, lines: &[&str], modified_secs: u64) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let mut content = String::from(HEADER_LINE);
    content.push('\n');
    for line in lines {
        content.push_str(line);
        content.push('\n');
    }
    std::fs::write(path, content).unwrap();
    set_mtime(path, modified_secs);
}

pub fn set_mtime(path: &Path, modified_secs: u64) {
    let time = SystemTime::UNIX_EPOCH + Duration::from_secs(modified_secs);
    filetime::set_file_mtime(path, filetime::FileTime::from_system_time(time)).unwrap();
}

/// File names directly inside `dir`, sorted
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    };
    names.sort();
    names
}
