pub mod color;
pub mod error;
pub mod formula;
pub mod time;

pub use color::Color;
pub use error::ParseError;
pub use formula::{assign_names, parse_formula, validate_deps, Action, Dep, Formula, On};
pub use time::parse_delay;
