pub mod normalize;
pub mod resolve;
pub mod roles;

pub use normalize::normalize_header;
pub use resolve::{resolve, HeaderCollision, Resolution, ResolvedColumns};
pub use roles::{MatchMode, Role, RoleSpec};
