//! Tenant domain - projects, plans and users

mod entity;

pub use entity::{Plan, PlanLimits, Project, ProjectStatus, User, UserStatus};
