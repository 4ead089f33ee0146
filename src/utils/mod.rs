pub(crate) mod jwt;
pub(crate) mod logging;
