//! A backend that keeps committed commands and renders them as a JSON log,
//! one entry per page. Used by the `--commands` CLI mode and in tests.

use serde::Serialize;

use super::{Engine, GraphicsCommand, Surface};
use crate::error::Result;
use crate::resource::ResourceCache;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordingSurface {
    pub width: f64,
    pub height: f64,
    pub commands: Vec<GraphicsCommand>,
}

impl Surface for RecordingSurface {
    fn apply(&mut self, command: &GraphicsCommand) -> Result<()> {
        self.commands.push(command.clone());
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecordingEngine {
    pages: Vec<RecordingSurface>,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pages(&self) -> &[RecordingSurface] {
        &self.pages
    }
}

impl Engine for RecordingEngine {
    type Surface = RecordingSurface;

    fn create_surface(&mut self, width: f64, height: f64) -> RecordingSurface {
        RecordingSurface {
            width,
            height,
            commands: Vec::new(),
        }
    }

    fn attach_page(&mut self, surface: RecordingSurface) {
        self.pages.push(surface);
    }

    fn render(&mut self, _resources: &ResourceCache) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(&self.pages)?)
    }
}
