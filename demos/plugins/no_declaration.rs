//! Shared library that exports no plugin declaration
#[no_mangle]
pub extern "C" fn extparser_helper_version() -> u32 {
    1
}
