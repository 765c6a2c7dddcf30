pub mod date_handling;
pub mod path_processing;
pub mod settings;

pub use date_handling::{DateParseError, cxc_seconds, format_doy, parse_activation_time, parse_doy};
pub use path_processing::{expand_tilde, is_procedure_file, procedure_id_from_path};
pub use settings::{EngineSettings, SettingsError, SlotRange, load_settings, load_settings_from};
