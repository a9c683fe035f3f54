//! # PDF Serializer
//!
//! A PDF 1.7 backend for the graphics layer. Each [`PdfSurface`] turns the
//! committed commands of one page into content stream operators; the
//! [`PdfEngine`] collects the pages and writes the file with its shared
//! objects (fonts, images, transparency states).
//!
//! ## PDF Structure (simplified)
//!
//! ```text
//! %PDF-1.7            <- header
//! 1 0 obj ... endobj  <- catalog, page tree, fonts, images, pages, streams
//! ...
//! xref                <- cross-reference table (byte offsets of each object)
//! trailer             <- points to the root object
//! %%EOF
//! ```
//!
//! Commands arrive in layout coordinates (origin top-left, y down). PDF user
//! space has y up, so every y is flipped against the page height here.

use std::fmt::Write as FmtWrite;
use std::io::Write as IoWrite;

use log::{debug, warn};
use miniz_oxide::deflate::compress_to_vec_zlib;

use crate::error::{QuireError, Result};
use crate::geometry::Point;
use crate::graphics::{Barcode, Engine, FillMode, GraphicsCommand, Surface};
use crate::image_loader::{ImagePixelData, JpegColorSpace};
use crate::model::Metadata;
use crate::resource::ResourceCache;

/// Bezier control point distance for a quarter circle.
const KAPPA: f64 = 0.5522847498;

const STANDARD_FONTS: [&str; 14] = [
    "Helvetica",
    "Helvetica-Bold",
    "Helvetica-Oblique",
    "Helvetica-BoldOblique",
    "Times-Roman",
    "Times-Bold",
    "Times-Italic",
    "Times-BoldItalic",
    "Courier",
    "Courier-Bold",
    "Courier-Oblique",
    "Courier-BoldOblique",
    "Symbol",
    "ZapfDingbats",
];

#[derive(Debug, Clone, PartialEq)]
enum Annotation {
    Uri { rect: [f64; 4], uri: String },
    GoTo { rect: [f64; 4], page: usize, top: f64 },
    Note { rect: [f64; 4], text: String },
}

/// One page being drawn. Resources are named per page (`/F0`, `/Im0`,
/// `/GS0`) and bound to document-wide objects when the file is written.
#[derive(Debug, Clone)]
pub struct PdfSurface {
    width: f64,
    height: f64,
    stream: String,
    fonts: Vec<String>,
    images: Vec<String>,
    alphas: Vec<String>,
    annotations: Vec<Annotation>,
    font: Option<(usize, f64)>,
}

impl PdfSurface {
    fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            stream: String::new(),
            fonts: Vec::new(),
            images: Vec::new(),
            alphas: Vec::new(),
            annotations: Vec::new(),
            font: None,
        }
    }

    fn flip(&self, y: f64) -> f64 {
        self.height - y
    }

    /// PDF rectangle `[llx lly urx ury]` for a layout box.
    fn rect(&self, origin: Point, width: f64, height: f64) -> [f64; 4] {
        [
            origin.x,
            self.flip(origin.y + height),
            origin.x + width,
            self.flip(origin.y),
        ]
    }

    fn resource_index(list: &mut Vec<String>, name: &str) -> usize {
        match list.iter().position(|n| n == name) {
            Some(index) => index,
            None => {
                list.push(name.to_string());
                list.len() - 1
            }
        }
    }

    fn paint(&mut self, mode: FillMode) {
        let op = match mode {
            FillMode::Fill => "f",
            FillMode::Stroke => "S",
            FillMode::FillAndStroke => "B",
        };
        let _ = writeln!(self.stream, "{}", op);
    }

    fn write_polygon(&mut self, points: &[Point], mode: FillMode) {
        let Some((first, rest)) = points.split_first() else {
            return;
        };
        let height = self.height;
        let _ = writeln!(self.stream, "{:.2} {:.2} m", first.x, height - first.y);
        for point in rest {
            let _ = writeln!(self.stream, "{:.2} {:.2} l", point.x, height - point.y);
        }
        let _ = writeln!(self.stream, "h");
        self.paint(mode);
    }

    /// Rounded rectangle path with its lower-left corner at (x, y) in PDF
    /// space.
    fn write_rounded_rect(&mut self, x: f64, y: f64, w: f64, h: f64, radius: f64) {
        let r = radius.min(w / 2.0).min(h / 2.0);
        let k = r * KAPPA;
        let s = &mut self.stream;
        let _ = writeln!(s, "{:.2} {:.2} m", x + r, y);
        let _ = writeln!(s, "{:.2} {:.2} l", x + w - r, y);
        let _ = writeln!(
            s,
            "{:.2} {:.2} {:.2} {:.2} {:.2} {:.2} c",
            x + w - r + k, y,
            x + w, y + r - k,
            x + w, y + r
        );
        let _ = writeln!(s, "{:.2} {:.2} l", x + w, y + h - r);
        let _ = writeln!(
            s,
            "{:.2} {:.2} {:.2} {:.2} {:.2} {:.2} c",
            x + w, y + h - r + k,
            x + w - r + k, y + h,
            x + w - r, y + h
        );
        let _ = writeln!(s, "{:.2} {:.2} l", x + r, y + h);
        let _ = writeln!(
            s,
            "{:.2} {:.2} {:.2} {:.2} {:.2} {:.2} c",
            x + r - k, y + h,
            x, y + h - r + k,
            x, y + h - r
        );
        let _ = writeln!(s, "{:.2} {:.2} l", x, y + r);
        let _ = writeln!(
            s,
            "{:.2} {:.2} {:.2} {:.2} {:.2} {:.2} c",
            x, y + r - k,
            x + r - k, y,
            x + r, y
        );
        let _ = writeln!(s, "h");
    }

    fn write_ellipse(&mut self, center: Point, width: f64, height: f64) {
        let cx = center.x;
        let cy = self.flip(center.y);
        let rx = width / 2.0;
        let ry = height / 2.0;
        let kx = rx * KAPPA;
        let ky = ry * KAPPA;
        let s = &mut self.stream;
        let _ = writeln!(s, "{:.2} {:.2} m", cx + rx, cy);
        let _ = writeln!(s, "{:.2} {:.2} {:.2} {:.2} {:.2} {:.2} c", cx + rx, cy + ky, cx + kx, cy + ry, cx, cy + ry);
        let _ = writeln!(s, "{:.2} {:.2} {:.2} {:.2} {:.2} {:.2} c", cx - kx, cy + ry, cx - rx, cy + ky, cx - rx, cy);
        let _ = writeln!(s, "{:.2} {:.2} {:.2} {:.2} {:.2} {:.2} c", cx - rx, cy - ky, cx - kx, cy - ry, cx, cy - ry);
        let _ = writeln!(s, "{:.2} {:.2} {:.2} {:.2} {:.2} {:.2} c", cx + kx, cy - ry, cx + rx, cy - ky, cx + rx, cy);
        let _ = writeln!(s, "h");
    }

    /// Arc between two angles in degrees, counter-clockwise on the page,
    /// approximated by short line segments.
    fn write_arc(&mut self, center: Point, width: f64, height: f64, start: f64, end: f64) {
        let cx = center.x;
        let cy = self.flip(center.y);
        let (rx, ry) = (width / 2.0, height / 2.0);
        let sweep = if end < start { end + 360.0 - start } else { end - start };
        let steps = (sweep / 5.0).ceil().max(1.0) as usize;
        for step in 0..=steps {
            let angle = (start + sweep * step as f64 / steps as f64).to_radians();
            let x = cx + rx * angle.cos();
            let y = cy + ry * angle.sin();
            let op = if step == 0 { "m" } else { "l" };
            let _ = writeln!(self.stream, "{:.2} {:.2} {}", x, y, op);
        }
    }

    fn write_barcode(&mut self, origin: Point, barcode: &Barcode) {
        let bottom = self.flip(origin.y + barcode.height);
        let mut x = origin.x;
        for (index, modules) in barcode.pattern.iter().enumerate() {
            let width = *modules as f64 * barcode.module_width;
            if index % 2 == 0 {
                let _ = writeln!(
                    self.stream,
                    "{:.3} {:.2} {:.3} {:.2} re",
                    x, bottom, width, barcode.height
                );
            }
            x += width;
        }
        let _ = writeln!(self.stream, "f");
    }

    fn write_text(&mut self, text: &str, position: Point, word_spacing: f64, mode: FillMode) {
        let (font, size) = match self.font {
            Some(font) => font,
            None => {
                warn!("Text drawn before a font was set, using Helvetica 12");
                let index = Self::resource_index(&mut self.fonts, "Helvetica");
                (index, 12.0)
            }
        };
        let render_mode = match mode {
            FillMode::Fill => 0,
            FillMode::Stroke => 1,
            FillMode::FillAndStroke => 2,
        };
        let y = self.flip(position.y);
        let _ = write!(
            self.stream,
            "BT\n/F{} {:.1} Tf\n{} Tr\n{:.3} Tw\n{:.2} {:.2} Td\n({}) Tj\nET\n",
            font,
            size,
            render_mode,
            word_spacing,
            position.x,
            y,
            escape_pdf_string(text)
        );
    }
}

impl Surface for PdfSurface {
    fn apply(&mut self, command: &GraphicsCommand) -> Result<()> {
        match command {
            GraphicsCommand::SaveState => self.stream.push_str("q\n"),
            GraphicsCommand::RestoreState => self.stream.push_str("Q\n"),
            GraphicsCommand::SetFillColor { color } => {
                let _ = writeln!(self.stream, "{:.3} {:.3} {:.3} rg", color.r, color.g, color.b);
            }
            GraphicsCommand::SetLineColor { color } => {
                let _ = writeln!(self.stream, "{:.3} {:.3} {:.3} RG", color.r, color.g, color.b);
            }
            GraphicsCommand::SetLineWidth { width } => {
                let _ = writeln!(self.stream, "{:.2} w", width);
            }
            GraphicsCommand::SetLineDashPattern { pattern, phase } => {
                let dashes: Vec<String> = pattern.iter().map(|d| format!("{:.2}", d)).collect();
                let _ = writeln!(self.stream, "[{}] {:.2} d", dashes.join(" "), phase);
            }
            GraphicsCommand::SetFont { base_font, size } => {
                let name = if STANDARD_FONTS.contains(&base_font.as_str()) {
                    base_font.as_str()
                } else {
                    warn!("Font {} can't be embedded, using Helvetica", base_font);
                    "Helvetica"
                };
                let index = Self::resource_index(&mut self.fonts, name);
                self.font = Some((index, *size));
            }
            GraphicsCommand::DrawLine { from, to } => {
                let (from_y, to_y) = (self.flip(from.y), self.flip(to.y));
                let _ = write!(
                    self.stream,
                    "{:.2} {:.2} m\n{:.2} {:.2} l\nS\n",
                    from.x, from_y, to.x, to_y
                );
            }
            GraphicsCommand::DrawPolygon { points, mode } => self.write_polygon(points, *mode),
            GraphicsCommand::DrawRoundedRectangle {
                origin,
                width,
                height,
                radius,
                mode,
            } => {
                let y = self.flip(origin.y + height);
                if *radius > 0.0 {
                    self.write_rounded_rect(origin.x, y, *width, *height, *radius);
                } else {
                    let _ = writeln!(
                        self.stream,
                        "{:.2} {:.2} {:.2} {:.2} re",
                        origin.x, y, width, height
                    );
                }
                self.paint(*mode);
            }
            GraphicsCommand::DrawEllipse {
                center,
                width,
                height,
                mode,
            } => {
                self.write_ellipse(*center, *width, *height);
                self.paint(*mode);
            }
            GraphicsCommand::DrawArc {
                center,
                width,
                height,
                start,
                end,
                mode,
            } => {
                self.write_arc(*center, *width, *height, *start, *end);
                self.paint(*mode);
            }
            GraphicsCommand::DrawText {
                text,
                position,
                word_spacing,
                mode,
                ..
            } => self.write_text(text, *position, *word_spacing, *mode),
            GraphicsCommand::DrawImage {
                source,
                origin,
                width,
                height,
            } => {
                let index = Self::resource_index(&mut self.images, source);
                let y = self.flip(origin.y + height);
                let _ = write!(
                    self.stream,
                    "q\n{:.2} 0 0 {:.2} {:.2} {:.2} cm\n/Im{} Do\nQ\n",
                    width, height, origin.x, y, index
                );
            }
            GraphicsCommand::SetAlpha { alpha } => {
                let index = Self::resource_index(&mut self.alphas, &format!("{:.3}", alpha));
                let _ = writeln!(self.stream, "/GS{} gs", index);
            }
            GraphicsCommand::Rotate { center, angle } => {
                // Clockwise in layout space is clockwise on the page, which
                // is a negative angle in PDF user space.
                let (sin, cos) = (-angle.to_radians()).sin_cos();
                let cx = center.x;
                let cy = self.flip(center.y);
                let _ = write!(
                    self.stream,
                    "1 0 0 1 {:.2} {:.2} cm\n{:.5} {:.5} {:.5} {:.5} 0 0 cm\n1 0 0 1 {:.2} {:.2} cm\n",
                    cx, cy, cos, sin, -sin, cos, -cx, -cy
                );
            }
            GraphicsCommand::ClipRectangle {
                origin,
                width,
                height,
            } => {
                let y = self.flip(origin.y + height);
                let _ = write!(
                    self.stream,
                    "{:.2} {:.2} {:.2} {:.2} re\nW n\n",
                    origin.x, y, width, height
                );
            }
            GraphicsCommand::DrawBarcode { origin, barcode } => self.write_barcode(*origin, barcode),
            GraphicsCommand::UriAction {
                origin,
                width,
                height,
                uri,
            } => {
                let rect = self.rect(*origin, *width, *height);
                self.annotations.push(Annotation::Uri {
                    rect,
                    uri: uri.clone(),
                });
            }
            GraphicsCommand::GoToAction {
                origin,
                width,
                height,
                page,
                top,
            } => {
                let rect = self.rect(*origin, *width, *height);
                self.annotations.push(Annotation::GoTo {
                    rect,
                    page: *page,
                    top: *top,
                });
            }
            GraphicsCommand::AttachStickyNote {
                origin,
                width,
                height,
                text,
            } => {
                let rect = self.rect(*origin, *width, *height);
                self.annotations.push(Annotation::Note {
                    rect,
                    text: text.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Writes committed pages into a PDF document.
#[derive(Debug, Clone, Default)]
pub struct PdfEngine {
    metadata: Metadata,
    pages: Vec<PdfSurface>,
}

/// Tracks allocated PDF objects during writing. Index 0 is the free entry.
struct PdfBuilder {
    objects: Vec<Vec<u8>>,
}

impl PdfBuilder {
    fn new() -> Self {
        Self {
            objects: vec![Vec::new()],
        }
    }

    fn reserve(&mut self) -> usize {
        self.objects.push(Vec::new());
        self.objects.len() - 1
    }

    fn add(&mut self, data: Vec<u8>) -> usize {
        self.objects.push(data);
        self.objects.len() - 1
    }

    fn set(&mut self, id: usize, data: Vec<u8>) {
        self.objects[id] = data;
    }

    fn add_stream(&mut self, dict: &str, data: &[u8]) -> usize {
        let mut object: Vec<u8> = Vec::new();
        let _ = write!(object, "<< {} /Length {} >>\nstream\n", dict, data.len());
        object.extend_from_slice(data);
        object.extend_from_slice(b"\nendstream");
        self.add(object)
    }
}

/// Document-wide objects shared by every page that names them.
#[derive(Default)]
struct SharedObjects {
    fonts: Vec<(String, usize)>,
    images: Vec<(String, usize)>,
    alphas: Vec<(String, usize)>,
}

fn lookup(list: &[(String, usize)], name: &str) -> Option<usize> {
    list.iter().find(|(n, _)| n == name).map(|(_, id)| *id)
}

impl PdfEngine {
    pub fn new(metadata: Metadata) -> Self {
        Self {
            metadata,
            pages: Vec::new(),
        }
    }

    fn shared_objects(&self, builder: &mut PdfBuilder, resources: &ResourceCache) -> Result<SharedObjects> {
        let mut shared = SharedObjects::default();
        for page in &self.pages {
            for font in &page.fonts {
                if lookup(&shared.fonts, font).is_none() {
                    let id = builder.add(
                        format!(
                            "<< /Type /Font /Subtype /Type1 /BaseFont /{} /Encoding /WinAnsiEncoding >>",
                            font
                        )
                        .into_bytes(),
                    );
                    shared.fonts.push((font.clone(), id));
                }
            }
            for source in &page.images {
                if lookup(&shared.images, source).is_none() {
                    let id = Self::write_image(builder, resources, source)?;
                    shared.images.push((source.clone(), id));
                }
            }
            for alpha in &page.alphas {
                if lookup(&shared.alphas, alpha).is_none() {
                    let id = builder.add(
                        format!("<< /Type /ExtGState /ca {} /CA {} >>", alpha, alpha).into_bytes(),
                    );
                    shared.alphas.push((alpha.clone(), id));
                }
            }
        }
        Ok(shared)
    }

    fn write_image(builder: &mut PdfBuilder, resources: &ResourceCache, source: &str) -> Result<usize> {
        let image = resources
            .loaded_image(source)
            .ok_or_else(|| QuireError::invalid_resource(source, "image was never loaded"))?;
        let size = format!(
            "/Type /XObject /Subtype /Image /Width {} /Height {} /BitsPerComponent 8",
            image.width_px, image.height_px
        );
        let id = match &image.pixel_data {
            ImagePixelData::Jpeg { data, color_space } => {
                let space = match color_space {
                    JpegColorSpace::DeviceRGB => "/DeviceRGB",
                    JpegColorSpace::DeviceGray => "/DeviceGray",
                };
                builder.add_stream(
                    &format!("{} /ColorSpace {} /Filter /DCTDecode", size, space),
                    data,
                )
            }
            ImagePixelData::Decoded { rgb, alpha } => {
                let mask = alpha.as_ref().map(|alpha| {
                    builder.add_stream(
                        &format!("{} /ColorSpace /DeviceGray /Filter /FlateDecode", size),
                        &compress_to_vec_zlib(alpha, 6),
                    )
                });
                let mask_entry = mask.map(|id| format!(" /SMask {} 0 R", id)).unwrap_or_default();
                builder.add_stream(
                    &format!(
                        "{} /ColorSpace /DeviceRGB /Filter /FlateDecode{}",
                        size, mask_entry
                    ),
                    &compress_to_vec_zlib(rgb, 6),
                )
            }
        };
        debug!("Embedded image {} as object {}", source, id);
        Ok(id)
    }

    fn annotation_object(&self, annotation: &Annotation, page_ids: &[usize]) -> Result<String> {
        let rect = |r: &[f64; 4]| format!("[{:.2} {:.2} {:.2} {:.2}]", r[0], r[1], r[2], r[3]);
        let object = match annotation {
            Annotation::Uri { rect: r, uri } => format!(
                "<< /Type /Annot /Subtype /Link /Rect {} /Border [0 0 0] /A << /S /URI /URI ({}) >> >>",
                rect(r),
                escape_pdf_string(uri)
            ),
            Annotation::GoTo { rect: r, page, top } => {
                let target = page_ids.get(*page).ok_or_else(|| {
                    QuireError::invalid_argument(format!("Link target page {} does not exist.", page))
                })?;
                let target_height = self.pages[*page].height;
                format!(
                    "<< /Type /Annot /Subtype /Link /Rect {} /Border [0 0 0] /Dest [{} 0 R /XYZ 0 {:.2} null] >>",
                    rect(r),
                    target,
                    target_height - top
                )
            }
            Annotation::Note { rect: r, text } => format!(
                "<< /Type /Annot /Subtype /Text /Rect {} /Contents ({}) >>",
                rect(r),
                escape_pdf_string(text)
            ),
        };
        Ok(object)
    }

    fn info_object(&self) -> Option<String> {
        let metadata = &self.metadata;
        if metadata.title.is_none() && metadata.author.is_none() && metadata.subject.is_none() {
            return None;
        }
        let mut info = String::from("<< ");
        if let Some(title) = &metadata.title {
            let _ = write!(info, "/Title ({}) ", escape_pdf_string(title));
        }
        if let Some(author) = &metadata.author {
            let _ = write!(info, "/Author ({}) ", escape_pdf_string(author));
        }
        if let Some(subject) = &metadata.subject {
            let _ = write!(info, "/Subject ({}) ", escape_pdf_string(subject));
        }
        let creator = metadata.creator.as_deref().unwrap_or("Quire");
        let _ = write!(
            info,
            "/Producer (Quire {}) /Creator ({}) >>",
            env!("CARGO_PKG_VERSION"),
            escape_pdf_string(creator)
        );
        Some(info)
    }

    /// Serialize all objects into the final PDF byte stream.
    fn serialize(builder: &PdfBuilder, info_id: Option<usize>) -> Vec<u8> {
        let mut output: Vec<u8> = Vec::new();
        let mut offsets: Vec<usize> = vec![0; builder.objects.len()];

        output.extend_from_slice(b"%PDF-1.7\n");
        output.extend_from_slice(b"%\xe2\xe3\xcf\xd3\n");

        for (i, object) in builder.objects.iter().enumerate().skip(1) {
            offsets[i] = output.len();
            let _ = write!(output, "{} 0 obj\n", i);
            output.extend_from_slice(object);
            output.extend_from_slice(b"\nendobj\n\n");
        }

        let xref_offset = output.len();
        let _ = write!(output, "xref\n0 {}\n", builder.objects.len());
        let _ = write!(output, "0000000000 65535 f \n");
        for offset in offsets.iter().skip(1) {
            let _ = write!(output, "{:010} 00000 n \n", offset);
        }

        let _ = write!(output, "trailer\n<< /Size {} /Root 1 0 R", builder.objects.len());
        if let Some(info_id) = info_id {
            let _ = write!(output, " /Info {} 0 R", info_id);
        }
        let _ = write!(output, " >>\nstartxref\n{}\n%%EOF\n", xref_offset);
        output
    }
}

impl Engine for PdfEngine {
    type Surface = PdfSurface;

    fn create_surface(&mut self, width: f64, height: f64) -> PdfSurface {
        PdfSurface::new(width, height)
    }

    fn attach_page(&mut self, surface: PdfSurface) {
        self.pages.push(surface);
    }

    fn render(&mut self, resources: &ResourceCache) -> Result<Vec<u8>> {
        let mut builder = PdfBuilder::new();
        let catalog = builder.reserve();
        let page_tree = builder.reserve();
        let shared = self.shared_objects(&mut builder, resources)?;
        let page_ids: Vec<usize> = self.pages.iter().map(|_| builder.reserve()).collect();

        for (page, page_id) in self.pages.iter().zip(&page_ids) {
            let compressed = compress_to_vec_zlib(&encode_win_ansi(&page.stream), 6);
            let content = builder.add_stream("/Filter /FlateDecode", &compressed);

            let mut annotations = Vec::new();
            for annotation in &page.annotations {
                let object = self.annotation_object(annotation, &page_ids)?;
                annotations.push(builder.add(object.into_bytes()));
            }

            let mut resources_dict = String::new();
            let font_entries: Vec<String> = page
                .fonts
                .iter()
                .enumerate()
                .filter_map(|(i, name)| lookup(&shared.fonts, name).map(|id| format!("/F{} {} 0 R", i, id)))
                .collect();
            if !font_entries.is_empty() {
                let _ = write!(resources_dict, "/Font << {} >> ", font_entries.join(" "));
            }
            let image_entries: Vec<String> = page
                .images
                .iter()
                .enumerate()
                .filter_map(|(i, name)| lookup(&shared.images, name).map(|id| format!("/Im{} {} 0 R", i, id)))
                .collect();
            if !image_entries.is_empty() {
                let _ = write!(resources_dict, "/XObject << {} >> ", image_entries.join(" "));
            }
            let alpha_entries: Vec<String> = page
                .alphas
                .iter()
                .enumerate()
                .filter_map(|(i, name)| lookup(&shared.alphas, name).map(|id| format!("/GS{} {} 0 R", i, id)))
                .collect();
            if !alpha_entries.is_empty() {
                let _ = write!(resources_dict, "/ExtGState << {} >> ", alpha_entries.join(" "));
            }

            let mut page_dict = format!(
                "<< /Type /Page /Parent {} 0 R /MediaBox [0 0 {:.2} {:.2}] /Contents {} 0 R /Resources << {}>>",
                page_tree, page.width, page.height, content, resources_dict
            );
            if !annotations.is_empty() {
                let refs: Vec<String> = annotations.iter().map(|id| format!("{} 0 R", id)).collect();
                let _ = write!(page_dict, " /Annots [{}]", refs.join(" "));
            }
            page_dict.push_str(" >>");
            builder.set(*page_id, page_dict.into_bytes());
        }

        builder.set(
            catalog,
            format!("<< /Type /Catalog /Pages {} 0 R >>", page_tree).into_bytes(),
        );
        let kids: Vec<String> = page_ids.iter().map(|id| format!("{} 0 R", id)).collect();
        builder.set(
            page_tree,
            format!(
                "<< /Type /Pages /Kids [{}] /Count {} >>",
                kids.join(" "),
                page_ids.len()
            )
            .into_bytes(),
        );

        let info_id = self.info_object().map(|info| builder.add(info.into_bytes()));
        debug!(
            "Writing PDF with {} pages and {} objects",
            self.pages.len(),
            builder.objects.len() - 1
        );
        Ok(Self::serialize(&builder, info_id))
    }
}

/// Escape special characters in a PDF string.
fn escape_pdf_string(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('(', "\\(")
        .replace(')', "\\)")
}

/// Content streams are written as WinAnsi bytes; characters outside Latin-1
/// become `?`.
fn encode_win_ansi(stream: &str) -> Vec<u8> {
    stream
        .chars()
        .map(|c| if (c as u32) < 256 { c as u8 } else { b'?' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::GraphicsContext;
    use crate::style::Color;

    fn render_page(draw: impl FnOnce(&mut GraphicsContext)) -> (PdfSurface, Vec<u8>) {
        let mut engine = PdfEngine::new(Metadata::default());
        let mut surface = engine.create_surface(200.0, 100.0);
        let mut gc = GraphicsContext::new(200.0, 100.0);
        draw(&mut gc);
        gc.commit(&mut surface).unwrap();
        let snapshot = surface.clone();
        engine.attach_page(surface);
        let bytes = engine.render(&ResourceCache::new()).unwrap();
        (snapshot, bytes)
    }

    #[test]
    fn escape_pdf_string_escapes_delimiters() {
        assert_eq!(escape_pdf_string("Hello (World)"), "Hello \\(World\\)");
        assert_eq!(escape_pdf_string("back\\slash"), "back\\\\slash");
    }

    #[test]
    fn empty_document_is_well_formed() {
        let (_, bytes) = render_page(|_| {});
        assert!(bytes.starts_with(b"%PDF-1.7"));
        assert!(bytes.windows(5).any(|w| w == b"%%EOF"));
        assert!(bytes.windows(4).any(|w| w == b"xref"));
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("/Count 1"));
        assert!(text.contains("/MediaBox [0 0 200.00 100.00]"));
    }

    #[test]
    fn y_axis_is_flipped() {
        let (surface, _) = render_page(|gc| {
            gc.draw_line(Point::new(10.0, 10.0), Point::new(20.0, 30.0));
        });
        assert!(surface.stream.contains("10.00 90.00 m\n20.00 70.00 l\nS\n"));
    }

    #[test]
    fn clip_rectangle_intersects_the_clipping_path() {
        let (surface, _) = render_page(|gc| {
            gc.save_state();
            gc.clip_rectangle(Point::new(10.0, 10.0), 50.0, 20.0);
            gc.restore_state();
        });
        assert!(surface.stream.contains("q\n10.00 70.00 50.00 20.00 re\nW n\nQ\n"));
    }

    #[test]
    fn ellipse_is_four_bezier_quadrants() {
        let (surface, _) = render_page(|gc| {
            gc.draw_ellipse(Point::new(100.0, 50.0), 40.0, 20.0, FillMode::Fill);
        });
        let stream = &surface.stream;
        assert!(stream.starts_with("120.00 50.00 m\n"));
        let curves: Vec<&str> = stream.lines().filter(|l| l.ends_with(" c")).collect();
        assert_eq!(curves.len(), 4);
        assert!(curves[0].ends_with("100.00 60.00 c"));
        assert!(curves[1].ends_with("80.00 50.00 c"));
        assert!(curves[2].ends_with("100.00 40.00 c"));
        assert!(stream.ends_with("120.00 50.00 c\nh\nf\n"));
    }

    #[test]
    fn arc_is_drawn_counter_clockwise_in_short_segments() {
        let (surface, _) = render_page(|gc| {
            gc.draw_arc(Point::new(100.0, 50.0), 40.0, 40.0, 0.0, 90.0, FillMode::Stroke);
        });
        let stream = &surface.stream;
        assert!(stream.starts_with("120.00 50.00 m\n"));
        assert_eq!(stream.matches(" l\n").count(), 18);
        assert!(stream.ends_with("100.00 70.00 l\nS\n"));
    }

    #[test]
    fn barcode_fills_every_other_run() {
        let (surface, _) = render_page(|gc| {
            gc.draw_barcode(
                Point::new(10.0, 10.0),
                Barcode {
                    pattern: vec![2, 1, 1],
                    module_width: 1.0,
                    height: 10.0,
                },
            );
        });
        assert_eq!(
            surface.stream,
            "10.000 80.00 2.000 10.00 re\n13.000 80.00 1.000 10.00 re\nf\n"
        );
    }

    #[test]
    fn fonts_become_shared_resources() {
        let (surface, bytes) = render_page(|gc| {
            gc.set_font("Helvetica-Bold", 10.0);
            gc.set_fill_color(Color::BLACK);
            gc.draw_text("Hi (there)", Point::new(5.0, 20.0), "utf-8", 1.5, FillMode::Fill);
            gc.set_font("Fraktur", 10.0);
            gc.draw_text("x", Point::new(5.0, 40.0), "utf-8", 0.0, FillMode::Fill);
        });
        assert_eq!(surface.fonts, vec!["Helvetica-Bold", "Helvetica"]);
        assert!(surface.stream.contains("/F0 10.0 Tf"));
        assert!(surface.stream.contains("1.500 Tw"));
        assert!(surface.stream.contains("5.00 80.00 Td\n(Hi \\(there\\)) Tj"));
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("/BaseFont /Helvetica-Bold"));
        assert!(text.contains("/Font << /F0"));
    }

    #[test]
    fn annotations_are_attached_to_pages() {
        let mut engine = PdfEngine::new(Metadata::default());
        for _ in 0..2 {
            let mut surface = engine.create_surface(200.0, 100.0);
            let mut gc = GraphicsContext::new(200.0, 100.0);
            gc.uri_action(Point::new(0.0, 0.0), 50.0, 10.0, "https://example.com");
            gc.go_to_action(Point::new(0.0, 20.0), 50.0, 10.0, 1, 30.0);
            gc.attach_sticky_note(Point::new(0.0, 40.0), 10.0, 10.0, "note");
            gc.commit(&mut surface).unwrap();
            engine.attach_page(surface);
        }
        let bytes = engine.render(&ResourceCache::new()).unwrap();
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("/URI (https://example.com)"));
        assert!(text.contains("/Rect [0.00 90.00 50.00 100.00]"));
        assert!(text.contains("/XYZ 0 70.00 null"));
        assert!(text.contains("/Subtype /Text"));
        assert_eq!(text.matches("/Annots [").count(), 2);
    }

    #[test]
    fn missing_link_target_page_is_rejected() {
        let mut engine = PdfEngine::new(Metadata::default());
        let mut surface = engine.create_surface(200.0, 100.0);
        surface
            .apply(&GraphicsCommand::GoToAction {
                origin: Point::ORIGIN,
                width: 1.0,
                height: 1.0,
                page: 5,
                top: 0.0,
            })
            .unwrap();
        engine.attach_page(surface);
        assert!(matches!(
            engine.render(&ResourceCache::new()),
            Err(QuireError::InvalidArgument(_))
        ));
    }

    #[test]
    fn images_and_alpha_are_embedded() {
        let src = crate::image_loader::tests::png_data_uri([10, 20, 30, 128]);
        let mut resources = ResourceCache::new();
        resources.image(&src).unwrap();

        let mut engine = PdfEngine::new(Metadata::default());
        let mut surface = engine.create_surface(200.0, 100.0);
        let mut gc = GraphicsContext::new(200.0, 100.0);
        gc.set_alpha(0.5);
        gc.draw_image(&src, Point::new(10.0, 10.0), 20.0, 20.0);
        gc.commit(&mut surface).unwrap();
        engine.attach_page(surface);

        let bytes = engine.render(&resources).unwrap();
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("/Subtype /Image /Width 1 /Height 1"));
        assert!(text.contains("/SMask"));
        assert!(text.contains("/ca 0.500 /CA 0.500"));
        assert!(text.contains("/XObject << /Im0"));
    }

    #[test]
    fn unloaded_image_fails() {
        let mut engine = PdfEngine::new(Metadata::default());
        let mut surface = engine.create_surface(200.0, 100.0);
        surface
            .apply(&GraphicsCommand::DrawImage {
                source: "missing.png".to_string(),
                origin: Point::ORIGIN,
                width: 1.0,
                height: 1.0,
            })
            .unwrap();
        engine.attach_page(surface);
        assert!(matches!(
            engine.render(&ResourceCache::new()),
            Err(QuireError::InvalidResource { .. })
        ));
    }

    #[test]
    fn metadata_in_info_dictionary() {
        let mut engine = PdfEngine::new(Metadata {
            title: Some("Test Document".to_string()),
            author: Some("Quire".to_string()),
            ..Metadata::default()
        });
        let surface = engine.create_surface(100.0, 100.0);
        engine.attach_page(surface);
        let bytes = engine.render(&ResourceCache::new()).unwrap();
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("/Title (Test Document)"));
        assert!(text.contains("/Author (Quire)"));
        assert!(text.contains("/Info "));
    }
}
