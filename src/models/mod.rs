//! Wire and state-file models for the partner administration API.

pub mod assignment;
pub mod customer;
pub mod relationship;
pub mod role;
pub mod security_group;

pub use assignment::{AccessAssignment, AccessContainer, AccessContainerType, AssignmentRecord};
pub use customer::{CustomerRecord, DelegatedAdminCustomer};
pub use relationship::{
    AccessDetails, CustomerParticipant, Participant, Relationship, RelationshipStatus, UnifiedRole,
};
pub use role::DirectoryRole;
pub use security_group::SecurityGroup;
