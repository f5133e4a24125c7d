pub mod definition;
pub mod profile;

pub use definition::{MediaType, QualityDefinition};
pub use profile::QualityProfile;
