//! Host adapters that own an audio callback and feed it from a drain.

pub mod cpal_out;
