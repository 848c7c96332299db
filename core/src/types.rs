//! Marker types shared by callers and the client.

use serde::{Deserialize, Serialize};

/// Expected type for calls whose successful response has no body.
///
/// When this is the requested type and the server answers with zero bytes,
/// the client decodes `{}` instead, so `200 OK` with an empty body succeeds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmptyResponse {}
