// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//==============================================================================
// Imports
//==============================================================================

use ::flexi_logger::Logger;
use ::std::sync::Once;

//==============================================================================
// Static Variables
//==============================================================================

/// Guardian to the logging initialize function.
static INIT_LOG: Once = Once::new();

/// Log specification used when `RUST_LOG` is not set.
const DEFAULT_LOG_SPEC: &str = "warn";

//==============================================================================
// Standalone Functions
//==============================================================================

/// Initializes logging features. The log specification is read from the `RUST_LOG` environment variable.
pub fn initialize() {
    INIT_LOG.call_once(|| {
        let logger: Logger = match Logger::try_with_env_or_str(DEFAULT_LOG_SPEC) {
            Ok(logger) => logger,
            Err(e) => {
                eprintln!("initialize(): invalid log specification ({:?})", e);
                return;
            },
        };
        match logger.start() {
            // The logger must outlive every thread that logs, so the handle is never dropped.
            Ok(handle) => ::std::mem::forget(handle),
            Err(e) => eprintln!("initialize(): failed to start logger ({:?})", e),
        }
    });
}
