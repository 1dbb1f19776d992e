use tedana_rs::{ErrorKind, TedanaError};

pub const SUCCESS: i32 = 0;
pub const INPUT_ERROR: i32 = 1;
pub const EXECUTION_ERROR: i32 = 2;
/// Registry references files that no longer exist
pub const DATA_ERROR: i32 = 3;

pub fn for_error(error: &TedanaError) -> i32 {
    match error.kind() {
        ErrorKind::Validation => INPUT_ERROR,
        ErrorKind::DataIntegrity => DATA_ERROR,
        ErrorKind::Decomposition | ErrorKind::Io => EXECUTION_ERROR,
    }
}
