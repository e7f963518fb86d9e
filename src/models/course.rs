use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::AppError;
use crate::models::deserialize_some;

const COPY_PREFIX: &str = "Copy of ";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Course {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub responsible_id: Option<String>,
    pub updated_at: String,
}

/// A course together with the sessions that point back to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseDetail {
    #[serde(flatten)]
    pub course: Course,
    pub session_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCourseRequest {
    pub name: String,
    pub description: Option<String>,
    pub responsible_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateCourseRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub responsible_id: Option<Option<String>>,
}

impl Course {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_name(&self.name)
    }
}

pub(crate) fn validate_name(name: &str) -> Result<(), AppError> {
    if name.trim().is_empty() {
        return Err(AppError::Validation("a name is required".to_string()));
    }
    Ok(())
}

/// Prefix shared by every copy of `original`; existing copies are counted
/// by matching it against the start of course names.
pub fn copy_prefix(original: &str) -> String {
    format!("{COPY_PREFIX}{original}")
}

/// Name given to a duplicate of `original` when `existing_copies` courses
/// already start with [`copy_prefix`].
pub fn copy_name(original: &str, existing_copies: i64) -> String {
    if existing_copies == 0 {
        copy_prefix(original)
    } else {
        format!("{} ({})", copy_prefix(original), existing_copies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_copy_has_no_counter() {
        assert_eq!(copy_name("Intro", 0), "Copy of Intro");
    }

    #[test]
    fn test_later_copies_carry_the_count() {
        assert_eq!(copy_name("Intro", 1), "Copy of Intro (1)");
        assert_eq!(copy_name("Intro", 7), "Copy of Intro (7)");
    }

    #[test]
    fn test_blank_name_is_rejected() {
        let course = Course {
            id: "c1".to_string(),
            name: "   ".to_string(),
            description: None,
            responsible_id: None,
            updated_at: String::new(),
        };
        assert!(matches!(course.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_update_request_distinguishes_null_from_missing() {
        let req: UpdateCourseRequest =
            serde_json::from_str(r#"{"description": null}"#).unwrap();
        assert_eq!(req.description, Some(None));
        assert_eq!(req.responsible_id, None);
        assert_eq!(req.name, None);
    }
}
