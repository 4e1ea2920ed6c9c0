pub mod review;
pub mod stats;
pub mod users;

pub use review::ReviewService;
pub use stats::StatsService;
pub use users::AdminUserService;
