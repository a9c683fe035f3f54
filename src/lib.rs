//! # Quire
//!
//! A document layout engine. A document is a tree of nodes (pages,
//! containers, paragraphs of text runs, images, tables); the engine sizes
//! and positions every node, breaks the content of dynamic pages across as
//! many pages as it needs, and emits drawing commands to a backend.
//!
//! ## Architecture
//!
//! ```text
//! Input (JSON)
//!       ↓
//!   [model]      — Document tree, stylesheet, tree builder
//!       ↓
//!   [node]       — Node arena: attributes, geometry, breaking, pages
//!       ↓
//!   [formatter]  — Sizes, positions, line filling, pagination
//!       ↓
//!   [drawing]    — Prioritised drawing tasks per page
//!       ↓
//!   [graphics]   — Command queues, committed to a backend
//!       ↓
//!   [pdf]        — Serialize to PDF bytes (or a JSON command log)
//! ```

pub mod cache;
pub mod config;
pub mod drawing;
pub mod error;
pub mod font;
pub mod formatter;
pub mod geometry;
pub mod graphics;
pub mod image_loader;
pub mod model;
pub mod node;
pub mod pdf;
pub mod resource;
pub mod style;

use log::info;

use config::EngineConfig;
use drawing::{collect_tasks, DrawingContext};
use error::{QuireError, Result};
use font::FontRegistry;
use formatter::{format_document, FormatContext};
use graphics::recording::RecordingEngine;
use graphics::{Engine, GraphicsContext};
use model::{build_tree, Document};
use pdf::PdfEngine;
use resource::ResourceCache;

/// Render a document to PDF bytes with the default configuration.
///
/// This is the primary entry point. A `config` carried by the document
/// itself takes precedence.
pub fn render(document: &Document) -> Result<Vec<u8>> {
    render_with_config(document, &EngineConfig::default())
}

pub fn render_with_config(document: &Document, config: &EngineConfig) -> Result<Vec<u8>> {
    render_with(document, config, PdfEngine::new(document.metadata.clone()))
}

/// Render a document described as JSON to PDF bytes.
pub fn render_json(json: &str) -> Result<Vec<u8>> {
    let document: Document = serde_json::from_str(json)?;
    render(&document)
}

/// Render to the JSON log of committed graphics commands, one entry per
/// page.
pub fn render_commands(document: &Document, config: &EngineConfig) -> Result<Vec<u8>> {
    render_with(document, config, RecordingEngine::new())
}

/// Run the whole pipeline against any backend.
pub fn render_with<E: Engine>(document: &Document, config: &EngineConfig, mut engine: E) -> Result<Vec<u8>> {
    let config = document.config.as_ref().unwrap_or(config);
    config.validate()?;

    let fonts = FontRegistry::with_standard_fonts();
    let mut resources = ResourceCache::new();
    let (mut tree, root) = build_tree(document, config)?;

    let mut ctx = FormatContext {
        fonts: &fonts,
        resources: &mut resources,
        config,
    };
    format_document(&mut tree, root, &mut ctx)?;

    let (pages, mut tasks) = collect_tasks(&tree, root)?;
    let mut contexts = pages
        .iter()
        .map(|page| Ok(GraphicsContext::new(tree.width(*page)?, tree.height(*page)?)))
        .collect::<Result<Vec<_>>>()?;

    let drawing = DrawingContext {
        fonts: &fonts,
        resources: &resources,
    };
    let task_count = tasks.len();
    for task in tasks.drain() {
        let gc = contexts.get_mut(task.page).ok_or_else(|| {
            QuireError::structural(format!("Drawing task targets missing page {}", task.page))
        })?;
        task.invoke(gc, &drawing)?;
    }

    for mut gc in contexts {
        let mut surface = engine.create_surface(gc.width(), gc.height());
        gc.commit(&mut surface)?;
        engine.attach_page(surface);
    }
    info!("Rendered {} pages from {} drawing tasks", pages.len(), task_count);
    engine.render(&resources)
}
