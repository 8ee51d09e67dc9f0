//! Single-page PDF assembly from a raster snapshot.
//!
//! The raster is wrapped in an SVG document of identical pixel size and
//! converted with svg2pdf (1 px = 1 pt at the default 72 dpi), which embeds
//! the image losslessly and full-bleed. Link annotations are then written
//! onto that page with lopdf.

use crate::error::{ExportError, ExportResult};
use crate::geometry::Rect;
use crate::links::LinkRegion;
use crate::raster::RasterImage;
use lopdf::{dictionary, Document, Object, ObjectId};
use tracing::{info, warn};
use url::Url;

/// The finished single-page document.
#[derive(Debug, Clone)]
pub struct ExportedDocument {
    pub bytes: Vec<u8>,
    /// Page size in points, equal to the raster size in pixels.
    pub page_width: u32,
    pub page_height: u32,
    /// Regions that were registered as clickable links.
    pub links: Vec<LinkRegion>,
}

/// Why a link could not be registered on the page.
#[derive(Debug, thiserror::Error)]
pub enum LinkRegistrationError {
    #[error("region {0:?} lies outside the page")]
    OutsidePage(Rect),

    #[error("region {0:?} is not finite")]
    NotFinite(Rect),
}

/// The page being assembled. Coordinates are top-left based pixels.
pub struct PdfPage {
    document: Document,
    page_id: ObjectId,
    width: f32,
    height: f32,
    annotations: Vec<Object>,
}

impl PdfPage {
    /// Creates a page of exactly the image's pixel size with the image drawn at the origin.
    pub fn from_raster(image: &RasterImage) -> ExportResult<Self> {
        if image.width == 0 || image.height == 0 {
            return Err(ExportError::assembly(format!(
                "invalid raster dimensions: {}x{}",
                image.width, image.height
            )));
        }

        let svg = format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{w}" height="{h}" viewBox="0 0 {w} {h}"><image x="0" y="0" width="{w}" height="{h}" preserveAspectRatio="none" xlink:href="{data}"/></svg>"#,
            w = image.width,
            h = image.height,
            data = image.data_uri()
        );

        let tree = usvg::Tree::from_str(&svg, &usvg::Options::default())
            .map_err(|e| ExportError::assembly(format!("failed to wrap raster: {}", e)))?;

        let pdf_data = svg2pdf::to_pdf(
            &tree,
            svg2pdf::ConversionOptions::default(),
            svg2pdf::PageOptions::default(),
        );

        let document = Document::load_mem(&pdf_data)
            .map_err(|e| ExportError::assembly(format!("failed to reopen page: {}", e)))?;
        let page_id = document
            .get_pages()
            .values()
            .next()
            .copied()
            .ok_or_else(|| ExportError::assembly("generated document has no page"))?;

        Ok(Self {
            document,
            page_id,
            width: image.width as f32,
            height: image.height as f32,
            annotations: Vec::new(),
        })
    }

    /// Registers an invisible clickable rectangle pointing at `url`.
    pub fn add_link(&mut self, rect: Rect, url: &Url) -> Result<(), LinkRegistrationError> {
        if !rect.is_finite() {
            return Err(LinkRegistrationError::NotFinite(rect));
        }
        let page = Rect::new(0.0, 0.0, self.width, self.height);
        if !page.intersects(&rect) {
            return Err(LinkRegistrationError::OutsidePage(rect));
        }

        // PDF user space has its origin at the bottom-left.
        let annotation = dictionary! {
            "Type" => "Annot",
            "Subtype" => "Link",
            "Rect" => vec![
                rect.x.into(),
                (self.height - rect.bottom()).into(),
                rect.right().into(),
                (self.height - rect.y).into(),
            ],
            "Border" => vec![0.into(), 0.into(), 0.into()],
            "A" => dictionary! {
                "Type" => "Action",
                "S" => "URI",
                "URI" => Object::string_literal(url.as_str()),
            },
        };
        let annotation_id = self.document.add_object(annotation);
        self.annotations.push(Object::Reference(annotation_id));
        Ok(())
    }

    pub fn link_count(&self) -> usize {
        self.annotations.len()
    }

    /// Writes the annotations onto the page and serializes the document.
    pub fn finish(mut self) -> ExportResult<Vec<u8>> {
        if !self.annotations.is_empty() {
            let page = self
                .document
                .get_object_mut(self.page_id)
                .and_then(Object::as_dict_mut)
                .map_err(|e| ExportError::assembly(format!("failed to open page dictionary: {}", e)))?;

            let mut annotations = match page.get(b"Annots") {
                Ok(Object::Array(existing)) => existing.clone(),
                _ => Vec::new(),
            };
            annotations.append(&mut self.annotations);
            page.set("Annots", Object::Array(annotations));
        }

        let mut bytes = Vec::new();
        self.document
            .save_to(&mut bytes)
            .map_err(|e| ExportError::assembly(format!("failed to serialize PDF: {}", e)))?;
        Ok(bytes)
    }
}

/// Builds [`ExportedDocument`]s from a raster and its link regions.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocumentAssembler;

impl DocumentAssembler {
    pub fn new() -> Self {
        Self
    }

    /// Assembles the page. Regions that cannot be registered are skipped.
    pub fn assemble(
        &self,
        image: &RasterImage,
        regions: &[LinkRegion],
    ) -> ExportResult<ExportedDocument> {
        let mut page = PdfPage::from_raster(image)?;

        let mut links = Vec::with_capacity(regions.len());
        for region in regions {
            match page.add_link(region.rect, &region.url) {
                Ok(()) => links.push(region.clone()),
                Err(e) => warn!("Skipping link to {}: {}", region.url, e),
            }
        }

        let bytes = page.finish()?;
        info!(
            "Assembled PDF: {}x{} pt, {} links, {} bytes",
            image.width,
            image.height,
            links.len(),
            bytes.len()
        );

        Ok(ExportedDocument {
            bytes,
            page_width: image.width,
            page_height: image.height,
            links,
        })
    }
}
