pub mod identity;
pub mod onboarding;
pub mod user;

pub use identity::IdentityClient;
pub use onboarding::OnboardingService;
pub use user::UserService;
