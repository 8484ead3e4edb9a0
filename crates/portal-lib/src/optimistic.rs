//! Speculative post-state for long-running project operations
//!
//! The upload operation decides what the stored project will look like once
//! the server accepts the file before the request is even sent. Nothing here
//! touches the store, and there is no rollback: if the request fails the
//! caller simply never stores the speculative value.

use crate::models::ProjectEntity;
use crate::store::{EntityPatch, ProjectPatch};

/// Boolean project flags that an operation can set speculatively
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectFlag {
    StudentUploaded,
    GracePassed,
}

impl ProjectFlag {
    fn patch(self, value: bool) -> ProjectPatch {
        match self {
            ProjectFlag::StudentUploaded => ProjectPatch {
                student_uploaded: Some(value),
                ..Default::default()
            },
            ProjectFlag::GracePassed => ProjectPatch {
                grace_passed: Some(value),
                ..Default::default()
            },
        }
    }
}

/// Copy of `current` with `flag` set to `value`
pub fn with_flag(current: &ProjectEntity, flag: ProjectFlag, value: bool) -> ProjectEntity {
    let mut next = current.clone();
    flag.patch(value).apply(&mut next);
    next
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project() -> ProjectEntity {
        serde_json::from_value(serde_json::json!({
            "data": {"id": 42, "title": "Cell atlas", "series": 2019, "part": 3},
            "links": {"self": "/api/projects/42"}
        }))
        .unwrap()
    }

    #[test]
    fn test_with_flag_sets_only_the_flag() {
        let current = project();
        let next = with_flag(&current, ProjectFlag::StudentUploaded, true);

        assert!(next.data.student_uploaded);
        assert!(!current.data.student_uploaded);
        assert_eq!(next.data.title, current.data.title);
        assert_eq!(next.links, current.links);
        assert!(!next.data.grace_passed);
    }

    #[test]
    fn test_with_flag_can_clear() {
        let current = with_flag(&project(), ProjectFlag::GracePassed, true);
        let next = with_flag(&current, ProjectFlag::GracePassed, false);
        assert!(!next.data.grace_passed);
    }
}
