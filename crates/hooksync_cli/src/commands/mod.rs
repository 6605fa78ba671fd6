pub(crate) mod list;
pub(crate) mod shared;
pub(crate) mod sync;
