pub mod roster_loader;
pub mod toml_loader;

pub use roster_loader::{load_roster, parse_roster};
pub use toml_loader::{load_subject_info, parse_subject_info};
