pub mod assets;
pub mod distribution;
pub mod reports;
pub mod seeds;
pub mod tester;

pub use assets::TesterAssets;
pub use distribution::{
    DistributionPlan, DistributionReport, run_distribution_analysis,
    validate_distribution,
};
pub use seeds::{SeedInfo, resolve_seed_inputs};
pub use tester::*;
