//! Construct a transport from configuration.

use super::{Transport, TransportConfig, TransportOptions};
use crate::error::McpResult;

/// Create a transport instance from its configuration.
///
/// Validates the configuration and builds the matching implementation. The
/// returned transport is not started.
pub fn create_transport(
    config: TransportConfig,
    options: TransportOptions,
) -> McpResult<Box<dyn Transport>> {
    config.validate()?;

    match config {
        #[cfg(feature = "sse")]
        TransportConfig::Sse(sse) => Ok(Box::new(super::sse::SseTransport::new(sse, options)?)),

        #[cfg(not(feature = "sse"))]
        TransportConfig::Sse(_) => Err(crate::error::TransportError::NotSupported {
            detail: "SSE transport support not compiled in (enable the 'sse' feature)".to_string(),
        }
        .into()),

        #[cfg(feature = "stdio")]
        TransportConfig::Stdio(stdio) => {
            Ok(Box::new(super::stdio::StdioTransport::new(stdio, options)))
        }

        #[cfg(not(feature = "stdio"))]
        TransportConfig::Stdio(_) => Err(crate::error::TransportError::NotSupported {
            detail: "stdio transport support not compiled in (enable the 'stdio' feature)"
                .to_string(),
        }
        .into()),
    }
}
