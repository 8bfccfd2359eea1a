pub mod delimited;

pub use delimited::{
    delimiter_for_path, read_labeled_csv, read_labeled_from_reader, read_labeled_with_config, DelimitedReaderConfig,
    LabeledData,
};
