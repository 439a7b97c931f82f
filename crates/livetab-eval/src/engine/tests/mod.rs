mod aggregate;
mod common;
mod dependency;
