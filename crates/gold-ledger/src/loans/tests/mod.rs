pub(crate) mod common;

mod documents;
mod service;
