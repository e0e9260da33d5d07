pub mod features;
pub mod settings;

pub use features::*;
pub use settings::*;
