//! Donation domain - the payment lifecycle of a single donation.

mod aggregate;
mod errors;
mod policy;
mod project;
mod status;

pub use aggregate::{Donation, NewDonation};
pub use errors::{DonationError, GENERIC_PAYMENT_FAILURE};
pub use policy::DonationPolicy;
pub use project::Project;
pub use status::DonationStatus;
