//! Internal constants for diagram processing.

use std::time::Duration;

/// Default number of conversion attempts per diagram.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default timeout for a single renderer invocation (30 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default name of the directory that receives staged sources and images.
pub const DEFAULT_DIAGRAMS_DIR: &str = "diagrams";

/// Extension used for staged diagram sources.
pub const SOURCE_EXTENSION: &str = "puml";

/// File name of the persisted error log inside the diagrams directory.
pub const ERROR_LOG_FILENAME: &str = "error_log.json";

/// Width of the zero-padded diagram ordinal in artifact names.
pub const ORDINAL_WIDTH: usize = 3;

/// Number of characters kept from the sanitized title in artifact names.
pub const TITLE_PREFIX_LEN: usize = 10;

/// Number of diagnostic characters used to build fallback search queries.
pub const SEARCH_SNIPPET_LEN: usize = 50;

/// Number of diagnostic characters kept in each error log entry.
pub const LOG_ERROR_LEN: usize = 200;
