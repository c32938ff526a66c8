//! Domain and wire types shared between the client core and its frontends.

pub mod domain;
pub mod protocol;
