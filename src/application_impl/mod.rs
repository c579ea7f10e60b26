mod auth_service_impl;
mod clock_impl;
mod credential_verifier_impl;
mod token_codec_impl;

pub use auth_service_impl::*;
pub use clock_impl::*;
pub use credential_verifier_impl::*;
pub use token_codec_impl::*;

#[cfg(test)]
pub(crate) mod test_support;
