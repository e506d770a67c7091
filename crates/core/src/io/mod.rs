//! I/O operations for reading and writing trial sets

mod json;

pub use json::{
    read_dataset, read_dataset_from_str, write_dataset, write_dataset_to_string, write_json,
    Dataset,
};
