//! Gateway decorators shared by every `PaymentGateway` implementation.

mod timeout;

pub use timeout::TimeoutPaymentGateway;
