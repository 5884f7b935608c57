pub mod chart;
pub mod quote;
pub mod session;
pub mod state;

pub use session::{Command, DashboardView, SelectOptions, Session, SessionHandle};
