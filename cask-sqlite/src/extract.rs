use cask_core::{ColumnInfo, Columns, DbError, Result, Value, logged};
use libsqlite3_sys::*;
use std::ffi::{CStr, c_int};

pub(crate) fn extract_value(statement: *mut sqlite3_stmt, index: c_int) -> Result<Value> {
    unsafe {
        let column_type = sqlite3_column_type(statement, index);
        Ok(match column_type {
            SQLITE_NULL => Value::Null,
            SQLITE_INTEGER => Value::Integer(sqlite3_column_int64(statement, index)),
            SQLITE_FLOAT => Value::Real(sqlite3_column_double(statement, index)),
            SQLITE_BLOB => {
                let ptr = sqlite3_column_blob(statement, index) as *const u8;
                let len = sqlite3_column_bytes(statement, index) as usize;
                if ptr.is_null() {
                    Value::Blob(Box::default())
                } else {
                    Value::Blob(std::slice::from_raw_parts(ptr, len).into())
                }
            }
            SQLITE_TEXT => {
                let ptr = sqlite3_column_text(statement, index);
                let len = sqlite3_column_bytes(statement, index) as usize;
                if ptr.is_null() {
                    Value::Text(String::new())
                } else {
                    let bytes = std::slice::from_raw_parts(ptr, len);
                    Value::Text(String::from_utf8_lossy(bytes).into_owned())
                }
            }
            _ => {
                return Err(logged!(DbError::query(format!(
                    "Unexpected column type {}",
                    column_type
                ))));
            }
        })
    }
}

pub(crate) fn extract_row(statement: *mut sqlite3_stmt, count: usize) -> Result<Box<[Value]>> {
    (0..count)
        .map(|i| extract_value(statement, i as c_int))
        .collect()
}

pub(crate) fn extract_name(statement: *mut sqlite3_stmt, index: c_int) -> Result<String> {
    unsafe {
        let ptr = sqlite3_column_name(statement, index);
        if ptr.is_null() {
            return Err(logged!(DbError::query(format!(
                "Could not read the name of column {}",
                index
            ))));
        }
        Ok(CStr::from_ptr(ptr).to_string_lossy().into_owned())
    }
}

pub(crate) fn extract_decltype(statement: *mut sqlite3_stmt, index: c_int) -> Option<String> {
    unsafe {
        let ptr = sqlite3_column_decltype(statement, index);
        if ptr.is_null() {
            return None;
        }
        Some(CStr::from_ptr(ptr).to_string_lossy().into_owned())
    }
}

/// Names and declared types of the result columns, empty for statements returning no rows.
pub(crate) fn extract_columns(statement: *mut sqlite3_stmt) -> Result<Columns> {
    let count = unsafe { sqlite3_column_count(statement) };
    (0..count)
        .map(|i| {
            Ok(ColumnInfo::new(
                extract_name(statement, i)?,
                extract_decltype(statement, i),
            ))
        })
        .collect()
}
