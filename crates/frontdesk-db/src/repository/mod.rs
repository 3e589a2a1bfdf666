//! SurrealDB repository implementations.

mod group;
mod permission;
mod user;

pub use group::SurrealGroupRepository;
pub use permission::SurrealPermissionRepository;
pub use user::SurrealUserRepository;
