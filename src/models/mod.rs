pub mod course;
pub mod partner;
pub mod session;
pub mod user;

pub use course::{Course, CourseDetail, NewCourseRequest, UpdateCourseRequest};
pub use partner::{NewPartnerRequest, Partner};
pub use session::{
    NewSessionRequest, OnchangeRequest, OnchangeResponse, Session, SessionChange,
    UpdateSessionRequest, Warning,
};
pub use user::{NewUserRequest, User};

use serde::{Deserialize, Deserializer};

/// Lets `Option<Option<T>>` tell an omitted field (`None`) apart from an
/// explicit `null` (`Some(None)`) in PATCH payloads.
pub(crate) fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}
