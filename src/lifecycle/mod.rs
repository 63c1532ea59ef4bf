mod observable;
mod scope;

pub use observable::Observable;
pub use scope::{Cancelled, Job, LifecycleScope};
