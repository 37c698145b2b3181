use uuid::Uuid;

use crate::config::UuidFormat;
use crate::error::Result;

/// RFC 4122 v4 UUIDs, hyphenated or compact.
pub struct UuidKernel {
    format: UuidFormat,
}

impl UuidKernel {
    pub fn new(format: UuidFormat) -> Self {
        Self { format }
    }

    pub fn next(&mut self) -> Result<String> {
        let id = Uuid::new_v4();
        Ok(match self.format {
            UuidFormat::Standard => id.hyphenated().to_string(),
            UuidFormat::Compact => id.simple().to_string(),
        })
    }
}
