use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct OrganizationUser {
    #[schema(example = 7)]
    pub id: u64,
    #[schema(example = "jdoe")]
    pub username: String,
    #[schema(example = "John")]
    pub first_name: String,
    #[schema(example = "Doe")]
    pub last_name: String,
    #[schema(example = "john.doe@company.com")]
    pub email: String,
    /// Role within the organization (`worker`, `manager` or `admin`)
    #[schema(example = "worker")]
    pub role: String,
}
