mod forward_policy;
mod seen_set;

pub use forward_policy::*;
pub use seen_set::*;
