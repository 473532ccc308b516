//! Project (tenant), plan and user records read by the gateway

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::domain::storage::Document;

/// Status of a project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    #[default]
    Active,
    Suspended,
}

/// A tenant project. Keys belong to exactly one project, a project to exactly
/// one owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    #[serde(default)]
    pub status: ProjectStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,
    #[serde(default)]
    pub feature_flags: BTreeSet<String>,
    /// Per-service configuration, opaque to this service
    #[serde(default)]
    pub services: HashMap<String, serde_json::Value>,
}

impl Project {
    pub fn new(
        id: impl Into<String>,
        owner_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            owner_id: owner_id.into(),
            name: name.into(),
            status: ProjectStatus::Active,
            plan_id: None,
            feature_flags: BTreeSet::new(),
            services: HashMap::new(),
        }
    }

    pub fn with_plan(mut self, plan_id: impl Into<String>) -> Self {
        self.plan_id = Some(plan_id.into());
        self
    }

    pub fn with_status(mut self, status: ProjectStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == ProjectStatus::Active
    }
}

impl Document for Project {
    const COLLECTION: &'static str = "projects";

    fn id(&self) -> &str {
        &self.id
    }
}

/// Plan limits; an absent value means unlimited
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanLimits {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests_per_minute: Option<u32>,
}

/// Billing plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    #[serde(default)]
    pub limits: PlanLimits,
    #[serde(default)]
    pub features: BTreeSet<String>,
}

impl Plan {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            limits: PlanLimits::default(),
            features: BTreeSet::new(),
        }
    }

    pub fn with_requests_per_minute(mut self, limit: u32) -> Self {
        self.limits.requests_per_minute = Some(limit);
        self
    }
}

impl Document for Plan {
    const COLLECTION: &'static str = "plans";

    fn id(&self) -> &str {
        &self.id
    }
}

/// Status of a user account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    #[default]
    Active,
    Suspended,
}

/// Account holder owning projects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub status: UserStatus,
    /// Customer id at the metered-billing provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_customer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,
}

impl User {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: UserStatus::Active,
            billing_customer_id: None,
            plan_id: None,
        }
    }

    pub fn with_billing_customer(mut self, customer_id: impl Into<String>) -> Self {
        self.billing_customer_id = Some(customer_id.into());
        self
    }

    pub fn with_plan(mut self, plan_id: impl Into<String>) -> Self {
        self.plan_id = Some(plan_id.into());
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }
}

impl Document for User {
    const COLLECTION: &'static str = "users";

    fn id(&self) -> &str {
        &self.id
    }
}
