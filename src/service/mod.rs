pub mod migrations;

pub use migrations::MigrationService;
