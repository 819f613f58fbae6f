use anyhow::{bail, Context, Result};
use base64::prelude::*;
use std::sync::Arc;

use crate::png::{self, PngInfo};

// 1x1 RGBA PNG, 70 bytes once decoded.
pub const PLACEHOLDER_PNG_B64: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mP8z8BQDwAEhQGAhKmMIQAAAABJRU5ErkJggg==";

#[derive(Debug, Clone)]
pub struct Payload {
    bytes: Arc<[u8]>,
    info: PngInfo,
}

impl Payload {
    pub fn placeholder() -> Result<Self> {
        let payload = Self::from_base64(PLACEHOLDER_PNG_B64).context("decode built-in placeholder")?;
        if !payload.is_minimal() {
            bail!(
                "built-in placeholder is {}x{}, expected 1x1",
                payload.info.width,
                payload.info.height
            );
        }
        Ok(payload)
    }

    pub fn from_base64(text: &str) -> Result<Self> {
        let bytes = BASE64_STANDARD
            .decode(text.trim())
            .context("invalid base64 payload")?;
        Self::from_bytes(bytes)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        if bytes.is_empty() {
            bail!("payload is empty");
        }
        let info = png::inspect(&bytes).context("payload is not a valid PNG")?;
        Ok(Self {
            bytes: Arc::from(bytes),
            info,
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn shared(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    pub fn info(&self) -> &PngInfo {
        &self.info
    }

    pub fn is_minimal(&self) -> bool {
        self.info.width == 1 && self.info.height == 1
    }

    pub fn crc32(&self) -> u32 {
        png::crc32(&self.bytes)
    }
}
