//! Input validation for uploads and account forms

use image::ImageFormat;
use regex::Regex;
use std::sync::OnceLock;

use crate::error::FieldErrors;

const MAX_TEXT_CHARS: usize = 255;

pub const IMAGE_REQUIRED: &str = "請選擇要上傳的圖片";
pub const IMAGE_TOO_LARGE: &str = "圖片檔案大小不能超過 2MB";

/// A file part taken from a multipart body
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Upload form fields as received
#[derive(Debug, Clone, Default)]
pub struct UploadForm {
    pub name: Option<String>,
    pub vibe: Option<String>,
    pub image: Option<UploadedFile>,
}

/// An upload that passed validation
#[derive(Debug, Clone)]
pub struct ValidUpload {
    pub name: String,
    pub vibe: String,
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
}

/// Formats accepted for uploads, detected from the file content
fn accepted_format(bytes: &[u8]) -> Option<ImageFormat> {
    match image::guess_format(bytes) {
        Ok(
            format @ (ImageFormat::Jpeg
            | ImageFormat::Png
            | ImageFormat::Gif
            | ImageFormat::Bmp
            | ImageFormat::WebP),
        ) => Some(format),
        _ => None,
    }
}

fn required_text(
    errors: &mut FieldErrors,
    field: &str,
    value: Option<String>,
    required: &str,
    too_long: &str,
) -> String {
    let value = value.map(|v| v.trim().to_string()).unwrap_or_default();
    if value.is_empty() {
        errors.add(field, required);
    } else if value.chars().count() > MAX_TEXT_CHARS {
        errors.add(field, too_long);
    }
    value
}

/// Check an upload form. Every field is checked so all messages come back
/// together.
pub fn validate_upload(form: UploadForm, max_bytes: usize) -> Result<ValidUpload, FieldErrors> {
    let mut errors = FieldErrors::new();

    let name = required_text(
        &mut errors,
        "name",
        form.name,
        "圖片名稱是必填的",
        "圖片名稱不能超過 255 個字元",
    );
    let vibe = required_text(
        &mut errors,
        "vibe",
        form.vibe,
        "圖片描述是必填的",
        "圖片描述不能超過 255 個字元",
    );

    let mut accepted = None;
    match form.image {
        Some(file) if !file.bytes.is_empty() => match accepted_format(&file.bytes) {
            None => errors.add("image", "上傳的檔案必須是圖片格式"),
            Some(_) if file.bytes.len() > max_bytes => {
                errors.add("image", IMAGE_TOO_LARGE)
            }
            Some(format) => accepted = Some((file.bytes, format)),
        },
        _ => errors.add("image", IMAGE_REQUIRED),
    }

    match accepted {
        Some((bytes, format)) if errors.is_empty() => Ok(ValidUpload {
            name,
            vibe,
            bytes,
            format,
        }),
        _ => Err(errors),
    }
}

/// Validate a display name
pub fn validate_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("Name is required".to_string());
    }

    if name.chars().count() > MAX_TEXT_CHARS {
        return Err("Name must be at most 255 characters long".to_string());
    }

    Ok(())
}

/// Validate email
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }

    if email.len() > 254 {
        return Err("Email must be at most 254 characters long".to_string());
    }

    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("Failed to compile email regex")
    });

    if !regex.is_match(email) {
        return Err("Invalid email format".to_string());
    }

    Ok(())
}

/// Validate password
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.is_empty() {
        return Err("Password is required".to_string());
    }

    if password.len() < 8 {
        return Err("Password must be at least 8 characters long".to_string());
    }

    if password.len() > 128 {
        return Err("Password must be at most 128 characters long".to_string());
    }

    Ok(())
}

/// Check a registration form, collecting one message per field
pub fn validate_registration(name: &str, email: &str, password: &str) -> FieldErrors {
    let mut errors = FieldErrors::new();
    if let Err(message) = validate_name(name) {
        errors.add("name", message);
    }
    if let Err(message) = validate_email(email) {
        errors.add("email", message);
    }
    if let Err(message) = validate_password(password) {
        errors.add("password", message);
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
    const JPEG_MAGIC: &[u8] = b"\xff\xd8\xff\xe0\0\x10JFIF\0";

    fn file(bytes: &[u8]) -> Option<UploadedFile> {
        Some(UploadedFile {
            file_name: Some("upload".to_string()),
            content_type: None,
            bytes: bytes.to_vec(),
        })
    }

    fn form(name: &str, vibe: &str, image: Option<UploadedFile>) -> UploadForm {
        UploadForm {
            name: Some(name.to_string()),
            vibe: Some(vibe.to_string()),
            image,
        }
    }

    #[test]
    fn test_valid_upload() {
        let upload = validate_upload(form(" Sunset ", "peaceful", file(JPEG_MAGIC)), 1024).unwrap();
        assert_eq!(upload.name, "Sunset");
        assert_eq!(upload.vibe, "peaceful");
        assert_eq!(upload.format, ImageFormat::Jpeg);

        let upload = validate_upload(form("a", "b", file(PNG_MAGIC)), 1024).unwrap();
        assert_eq!(upload.format, ImageFormat::Png);
    }

    #[test]
    fn test_missing_fields_report_every_message() {
        let errors = validate_upload(UploadForm::default(), 1024).unwrap_err();
        assert_eq!(errors.first("name"), Some("圖片名稱是必填的"));
        assert_eq!(errors.first("vibe"), Some("圖片描述是必填的"));
        assert_eq!(errors.first("image"), Some("請選擇要上傳的圖片"));

        let errors = validate_upload(form("", "  ", file(b"")), 1024).unwrap_err();
        assert!(errors.contains("name"));
        assert!(errors.contains("vibe"));
        assert_eq!(errors.first("image"), Some("請選擇要上傳的圖片"));
    }

    #[test]
    fn test_rejects_non_images_and_oversized_files() {
        let errors = validate_upload(form("a", "b", file(b"plain text")), 1024).unwrap_err();
        assert_eq!(errors.first("image"), Some("上傳的檔案必須是圖片格式"));

        let mut big = JPEG_MAGIC.to_vec();
        big.resize(2048, 0);
        let errors = validate_upload(form("a", "b", file(&big)), 1024).unwrap_err();
        assert_eq!(errors.first("image"), Some("圖片檔案大小不能超過 2MB"));
    }

    #[test]
    fn test_length_limits_count_characters() {
        let exactly = "圖".repeat(255);
        assert!(validate_upload(form(&exactly, "b", file(PNG_MAGIC)), 1024).is_ok());

        let over = "a".repeat(256);
        let errors = validate_upload(form(&over, &over, file(PNG_MAGIC)), 1024).unwrap_err();
        assert_eq!(errors.first("name"), Some("圖片名稱不能超過 255 個字元"));
        assert_eq!(errors.first("vibe"), Some("圖片描述不能超過 255 個字元"));
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("test@example.com").is_ok());
        assert!(validate_email("").is_err());
        assert!(validate_email("invalid").is_err());
        assert!(validate_email("@example.com").is_err());
    }

    #[test]
    fn test_validate_registration() {
        assert!(validate_registration("Ada", "ada@example.com", "longenough").is_empty());

        let errors = validate_registration("", "nope", "short");
        assert!(errors.contains("name"));
        assert!(errors.contains("email"));
        assert_eq!(
            errors.first("password"),
            Some("Password must be at least 8 characters long")
        );
    }
}
