pub mod checkout;
pub mod earnings;
pub mod stripe;
pub mod webhook;

pub use checkout::CheckoutService;
pub use earnings::EarningsService;
pub use stripe::StripeClient;
pub use webhook::WebhookService;
