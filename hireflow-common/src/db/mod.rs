//! Database bootstrap: schema, migrations and settings

pub mod init;
pub mod migrations;
pub mod settings;

pub use init::{init_database, BUSY_TIMEOUT_MS};
pub use migrations::{run_migrations, CURRENT_SCHEMA_VERSION};
pub use settings::{get_setting, load_or_create_token_secret, set_setting};
