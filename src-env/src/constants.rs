/// Environment variable naming the project root
pub const CMAOPT_DIR: &str = "CMAOPT_DIR";

/// Generated data, relative to the project root
pub const DATA_GENERATED: &str = "data_generated";

/// Optimization records, relative to [`DATA_GENERATED`]
pub const RECORDS: &str = "records";
