use crate::error::{Result, TrailError};
use crate::formats::FormatValidation;
use std::path::Path;

/// Cheap structural checks shared by the source readers
pub struct FormatValidator;

impl FormatValidator {
    /// Validate that a file exists and is readable
    pub fn validate_file_exists(path: &Path) -> FormatValidation {
        let mut validation = FormatValidation::default();

        if !path.exists() {
            validation.errors.push(format!("File not found: {}", path.display()));
            return validation;
        }
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() == 0 => validation.warnings.push("File is empty".to_string()),
            Ok(_) => {}
            Err(e) => validation.errors.push(format!("Cannot access file: {}", e)),
        }

        validation
    }

    /// Validate that a text file is valid UTF-8
    pub fn validate_utf8(path: &Path) -> FormatValidation {
        let mut validation = FormatValidation::default();
        if let Err(e) = std::fs::read_to_string(path) {
            validation
                .errors
                .push(format!("File is not valid UTF-8 or cannot be read: {}", e));
        }
        validation
    }

    /// Validate XML structure by scanning every event
    pub fn validate_xml_structure(path: &Path) -> FormatValidation {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::validate_xml_str(&content),
            Err(e) => FormatValidation {
                errors: vec![format!("Cannot read file: {}", e)],
                warnings: Vec::new(),
            },
        }
    }

    /// Validate XML structure of in-memory content
    pub fn validate_xml_str(content: &str) -> FormatValidation {
        use quick_xml::events::Event;
        use quick_xml::Reader;

        let mut validation = FormatValidation::default();
        let mut reader = Reader::from_str(content);
        reader.config_mut().trim_text(true);

        let mut saw_element = false;
        loop {
            match reader.read_event() {
                Ok(Event::Eof) => break,
                Ok(Event::Start(_)) | Ok(Event::Empty(_)) => saw_element = true,
                Err(e) => {
                    validation.errors.push(format!("Invalid XML structure: {}", e));
                    break;
                }
                _ => {}
            }
        }
        if validation.is_valid() && !saw_element {
            validation.errors.push("Invalid XML structure: no root element".to_string());
        }

        validation
    }

    /// Merge multiple validation results
    pub fn merge_validations(validations: Vec<FormatValidation>) -> FormatValidation {
        let mut merged = FormatValidation::default();
        for validation in validations {
            merged.errors.extend(validation.errors);
            merged.warnings.extend(validation.warnings);
        }
        merged
    }

    /// Convert a validation result to a Result type
    pub fn validation_to_result(validation: &FormatValidation, format_name: &str) -> Result<()> {
        if validation.is_valid() {
            Ok(())
        } else {
            Err(TrailError::FormatValidation {
                format: format_name.to_string(),
                reason: validation.errors.join("; "),
            })
        }
    }
}
