pub(crate) mod wrap;
