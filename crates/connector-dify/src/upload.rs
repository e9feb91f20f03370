use std::fs::File;
use std::path::Path;

use connector_core::ConnectorError;
use reqwest::blocking::multipart::{Form, Part};

/// File extensions the upload endpoint accepts.
pub const ALLOWED_EXTENSIONS: [&str; 6] = ["xlsx", "xls", "csv", "docx", "doc", "txt"];

/// Returns the lowercased file type of `path` if it is on the allow-list.
///
/// The type is whatever follows the last `.` of the file name, so a dotfile
/// such as `.txt` counts as `txt`.
pub fn upload_extension(path: &Path) -> Result<String, ConnectorError> {
    let extension = path
        .file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.rsplit('.').next())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        Ok(extension)
    } else {
        Err(ConnectorError::Validation(format!(
            "unsupported file type '{extension}' for {}",
            path.display()
        )))
    }
}

fn mime_for(extension: &str) -> &'static str {
    match extension {
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "xls" => "application/vnd.ms-excel",
        "csv" => "text/csv",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "doc" => "application/msword",
        _ => "text/plain",
    }
}

/// Opens `path` and builds the multipart body `{file, user, type}`.
///
/// The opened file is owned by the form and closed when the request (or the
/// form, on an early error) is dropped.
pub(crate) fn build_form(path: &Path, extension: &str, user: &str) -> Result<Form, ConnectorError> {
    let display = path.display().to_string();
    let file = File::open(path).map_err(|e| ConnectorError::io(&display, &e))?;
    let length = file
        .metadata()
        .map_err(|e| ConnectorError::io(&display, &e))?
        .len();
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("upload")
        .to_string();
    let part = Part::reader_with_length(file, length)
        .file_name(file_name)
        .mime_str(mime_for(extension))
        .map_err(|e| ConnectorError::Validation(format!("invalid mime type: {e}")))?;
    Ok(Form::new()
        .part("file", part)
        .text("user", user.to_string())
        .text("type", extension.to_string()))
}
