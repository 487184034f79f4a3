pub mod audit;
pub mod types;

pub use audit::AuditRecord;
pub use types::{Field, PageSize, PlacementBox, SigningResult};
