pub(crate) mod download;
pub(crate) mod epub;
pub(crate) mod index;
pub(crate) mod status;
