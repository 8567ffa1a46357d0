pub mod dispatcher;
pub mod eligibility;
pub mod memory;
pub mod payload;
pub mod policy;
pub mod subscription;

pub use dispatcher::{DispatchSettings, RewardDispatcher, RunSummary};
pub use eligibility::EligibilityResolver;
pub use subscription::{DestinationRef, PgSubscriptionRegistry, SubscriptionRegistry};
