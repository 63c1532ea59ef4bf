pub mod controller;
pub mod history;
pub mod state;

pub use controller::SessionController;
pub use history::{quality_label, HistoryFormatter, PlainFormatter};
pub use state::ButtonState;
