//! Resource forest and principal records, with their SQLite store

mod model;
mod store;

pub use model::{
    Group, GroupId, GroupResourcePermission, Resource, ResourceId, User, UserContext, UserId,
    UserResourcePermission,
};
pub use store::{OrderingRange, ResourceStore};
pub(crate) use store::depth_limit;
