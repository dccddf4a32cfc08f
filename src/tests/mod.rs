pub(crate) mod refresh_failure;
