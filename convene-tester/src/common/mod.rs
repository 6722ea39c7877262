pub mod scenario;
pub mod util;

pub use util::{ratio, report_stamp, split_csv};
