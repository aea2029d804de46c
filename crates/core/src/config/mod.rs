pub mod project;
pub mod settings;
pub mod validation;

pub use project::*;
pub use settings::*;
pub use validation::*;
