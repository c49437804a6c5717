pub(crate) mod common;

mod build;
mod setup;
