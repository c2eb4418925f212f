pub mod error;
pub mod paths;
pub mod profiles;
pub mod settings;

pub use error::{Result, StoreError};
pub use paths::{data_dir, default_base_dir};
pub use profiles::ProfileStore;
pub use settings::{load_settings, save_settings};
