mod service;

pub use service::{dew_point, row_for, PollService};
