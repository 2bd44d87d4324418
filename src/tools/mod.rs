/// Tools Module
///
/// Each tool module exports a `register` function that adds its servlet to the
/// registry during server initialization.

pub mod currency;
pub mod rates;
