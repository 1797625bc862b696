//! Thread-local parser pooling for the parallel file walk.
//!
//! Parser state is not assumed thread-safe, so every worker owns its own
//! instance. Creates a parser on first use per thread, reuses it for every
//! subsequent file handled by that thread.

use crate::ts::{CppParser, TreeSitterError};
use std::cell::RefCell;

thread_local! {
    static CPP_PARSER: RefCell<Option<CppParser>> = const { RefCell::new(None) };
}

/// Execute a function with this thread's pooled parser instance.
///
/// # Example
///
/// ```no_run
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use trace_stamper::pool::with_parser;
///
/// let result = with_parser(|parser| {
///     parser.parse_with_source("int main() { return 0; }").map(|p| p.has_errors())
/// })?;
/// # Ok(())
/// # }
/// ```
pub fn with_parser<F, R>(f: F) -> Result<R, TreeSitterError>
where
    F: FnOnce(&mut CppParser) -> R,
{
    CPP_PARSER.with(|cell| {
        let mut opt = cell.borrow_mut();
        if opt.is_none() {
            *opt = Some(CppParser::new()?);
        }
        Ok(f(opt.as_mut().expect("parser was just initialized above")))
    })
}
