pub mod assessment;
pub mod delivery;
pub mod design;

pub use assessment::{HttpCostService, HttpRiskEngine};
pub use delivery::{HttpIacGenerator, HttpProvisioner};
pub use design::{HttpBlueprintService, HttpGuardrailService};
