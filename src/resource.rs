//! Loaded resources shared across formatting and rendering.
//!
//! The cache is an ordinary value owned by the caller; keep one around to
//! reuse decoded images between renders.

use std::collections::HashMap;
use std::sync::Arc;

use log::debug;

use crate::error::Result;
use crate::image_loader::{self, LoadedImage};

#[derive(Debug, Clone, Default)]
pub struct ResourceCache {
    images: HashMap<String, Arc<LoadedImage>>,
}

impl ResourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The decoded image for `src`, loading it on first use.
    pub fn image(&mut self, src: &str) -> Result<Arc<LoadedImage>> {
        if let Some(image) = self.images.get(src) {
            return Ok(Arc::clone(image));
        }
        let image = Arc::new(image_loader::load_image(src)?);
        debug!(
            "Loaded image {}x{} px",
            image.width_px, image.height_px
        );
        self.images.insert(src.to_string(), Arc::clone(&image));
        Ok(image)
    }

    /// An image that was already loaded.
    pub fn loaded_image(&self, src: &str) -> Option<&Arc<LoadedImage>> {
        self.images.get(src)
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }
}
