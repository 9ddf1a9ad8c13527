//! One module per resource; each handler validates, authorizes, and delegates
//! to the repository.
pub mod bugs;
pub mod groups;
pub mod login;
pub mod profile;
pub mod sub_tasks;
pub mod tasks;
pub mod users;

use super::error::{field_error, FieldErrors};

/// Required text field: absent and blank values produce field errors, valid
/// values come back trimmed.
fn require_text(
    errors: &mut FieldErrors,
    field: &str,
    blank_message: &str,
    value: Option<&str>,
) -> Option<String> {
    match value {
        None => {
            field_error(errors, field, "This field is required.");
            None
        }
        Some(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                field_error(errors, field, blank_message);
                None
            } else {
                Some(trimmed.to_string())
            }
        }
    }
}

fn check_max_length(errors: &mut FieldErrors, field: &str, value: &str, max: usize) -> bool {
    if value.chars().count() > max {
        field_error(
            errors,
            field,
            format!("Ensure this field has no more than {max} characters."),
        );
        false
    } else {
        true
    }
}

fn check_min_length(errors: &mut FieldErrors, field: &str, value: &str, min: usize) -> bool {
    if value.chars().count() < min {
        field_error(
            errors,
            field,
            format!("Ensure this field has at least {min} characters."),
        );
        false
    } else {
        true
    }
}
