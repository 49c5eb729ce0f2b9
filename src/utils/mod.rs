pub mod deps;
pub mod disk_space;
pub mod humanize;
pub mod logger;
pub mod process;

pub use deps::DependencyStatus;
pub use disk_space::has_enough_space;
pub use humanize::{format_duration, format_file_size};
pub use logger::{LogTarget, init_logging};
