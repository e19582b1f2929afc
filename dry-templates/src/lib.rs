extern crate self as dry_templates;

pub use dry_templates_macros::dry_templates_directory as directory;
pub use dry_templates_macros::dry_templates_file as file;
pub use dry_templates_macros::dry_templates_str as str;
pub use dry_templates_parser::*;
