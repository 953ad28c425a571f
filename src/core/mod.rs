// Core modules: row ranges, chunk assembly, value codecs, and error modeling.
pub mod chunk;
pub mod codec;
pub mod error;
pub mod range;
pub mod row;
pub mod term;
