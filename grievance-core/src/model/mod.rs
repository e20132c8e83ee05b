//! Domain model: roles, principals, campuses and grievances.

pub mod campus;
pub mod grievance;
pub mod principal;
pub mod role;

pub use campus::{Campus, CampusCatalogue, CampusCode};
pub use grievance::{
    ActorKind, AdminResponse, AttachmentRef, Category, Grievance, Owner, Status, TimelineAction,
    TimelineEntry,
};
pub use principal::{AdminInfo, Principal};
pub use role::{Department, Role, Scope};
