//! Side-effecting action implementations invoked by [`crate::handlers`].

pub mod http;
