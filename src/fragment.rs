//! Laid-out SVG fragments.
//!
//! A [`Fragment`] is the unit that gets mounted on a surface: SVG markup in
//! fragment-local coordinates plus the geometry of every anchor and image it
//! contains. Both are written by the same [`FragmentBuilder`] call, so anchor
//! rectangles always match what is drawn.

use crate::geometry::{Rect, Size};
use quick_xml::escape::escape;
use std::fmt::Write as _;

/// An `<a>` element of a fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct Anchor {
    /// Raw `href` attribute, absent when the element has none.
    pub href: Option<String>,
    /// Bounds in the coordinate space of whoever returned the anchor.
    pub rect: Rect,
}

/// An `<image>` element of a fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRef {
    pub href: String,
    pub rect: Rect,
}

impl ImageRef {
    /// Images that have to be fetched over the network before rasterizing.
    pub fn is_remote(&self) -> bool {
        is_web_url(&self.href)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    size: Size,
    markup: String,
    anchors: Vec<Anchor>,
    images: Vec<ImageRef>,
}

impl Fragment {
    pub fn size(&self) -> Size {
        self.size
    }

    /// Inner SVG markup, without the enclosing `<svg>` element.
    pub fn markup(&self) -> &str {
        &self.markup
    }

    pub fn anchors(&self) -> &[Anchor] {
        &self.anchors
    }

    pub fn images(&self) -> &[ImageRef] {
        &self.images
    }

    /// Distinct remote image URLs, in document order.
    pub fn remote_images(&self) -> Vec<String> {
        let mut urls: Vec<String> = Vec::new();
        for image in self.images.iter().filter(|image| image.is_remote()) {
            if !urls.contains(&image.href) {
                urls.push(image.href.clone());
            }
        }
        urls
    }

    /// Standalone SVG document of `size`, optionally painted over an opaque background.
    pub fn to_svg_document(&self, size: Size, background: Option<&str>) -> String {
        let mut svg = String::with_capacity(self.markup.len() + 256);
        let _ = write!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            w = size.width,
            h = size.height
        );
        if let Some(fill) = background {
            let _ = write!(
                svg,
                r#"<rect x="0" y="0" width="{}" height="{}" fill="{}"/>"#,
                size.width,
                size.height,
                escape(fill)
            );
        }
        svg.push_str(&self.markup);
        svg.push_str("</svg>");
        svg
    }
}

/// Font weight/style for [`FragmentBuilder::text`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle<'a> {
    pub size: f32,
    pub fill: &'a str,
    pub bold: bool,
    pub italic: bool,
}

impl Default for TextStyle<'_> {
    fn default() -> Self {
        Self {
            size: 14.0,
            fill: "#1f2937",
            bold: false,
            italic: false,
        }
    }
}

/// Incremental writer for a [`Fragment`].
pub struct FragmentBuilder {
    size: Size,
    markup: String,
    anchors: Vec<Anchor>,
    images: Vec<ImageRef>,
}

impl FragmentBuilder {
    pub fn new(size: Size) -> Self {
        Self {
            size,
            markup: String::new(),
            anchors: Vec::new(),
            images: Vec::new(),
        }
    }

    pub fn rect(&mut self, rect: Rect, fill: &str, stroke: Option<&str>, radius: f32) -> &mut Self {
        let _ = write!(
            self.markup,
            r#"<rect x="{}" y="{}" width="{}" height="{}" rx="{}" fill="{}""#,
            rect.x,
            rect.y,
            rect.width,
            rect.height,
            radius,
            escape(fill)
        );
        if let Some(stroke) = stroke {
            let _ = write!(self.markup, r#" stroke="{}" stroke-width="1""#, escape(stroke));
        }
        self.markup.push_str("/>");
        self
    }

    pub fn path(&mut self, data: &str, fill: &str) -> &mut Self {
        let _ = write!(
            self.markup,
            r#"<path d="{}" fill="{}"/>"#,
            escape(data),
            escape(fill)
        );
        self
    }

    /// Text with its baseline at `(x, y)`.
    pub fn text(&mut self, x: f32, y: f32, content: &str, style: TextStyle<'_>) -> &mut Self {
        let _ = write!(
            self.markup,
            r#"<text x="{}" y="{}" font-family="sans-serif" font-size="{}" fill="{}""#,
            x,
            y,
            style.size,
            escape(style.fill)
        );
        if style.bold {
            self.markup.push_str(r#" font-weight="bold""#);
        }
        if style.italic {
            self.markup.push_str(r#" font-style="italic""#);
        }
        let _ = write!(self.markup, ">{}</text>", escape(content));
        self
    }

    pub fn image(&mut self, rect: Rect, href: &str) -> &mut Self {
        let _ = write!(
            self.markup,
            r#"<image x="{}" y="{}" width="{}" height="{}" preserveAspectRatio="xMidYMid slice" xlink:href="{}"/>"#,
            rect.x,
            rect.y,
            rect.width,
            rect.height,
            escape(href)
        );
        self.images.push(ImageRef {
            href: href.to_string(),
            rect,
        });
        self
    }

    /// Wraps whatever `body` draws in an `<a>` element occupying `rect`.
    ///
    /// A transparent hit rectangle is drawn first so the anchor's extent is
    /// exactly `rect` regardless of its content.
    pub fn link(
        &mut self,
        href: Option<&str>,
        rect: Rect,
        body: impl FnOnce(&mut Self),
    ) -> &mut Self {
        match href {
            Some(href) => {
                let _ = write!(self.markup, r#"<a href="{}">"#, escape(href));
            }
            None => self.markup.push_str("<a>"),
        }
        let _ = write!(
            self.markup,
            r#"<rect x="{}" y="{}" width="{}" height="{}" fill="none"/>"#,
            rect.x, rect.y, rect.width, rect.height
        );
        body(self);
        self.markup.push_str("</a>");
        self.anchors.push(Anchor {
            href: href.map(str::to_string),
            rect,
        });
        self
    }

    pub fn build(self) -> Fragment {
        Fragment {
            size: self.size,
            markup: self.markup,
            anchors: self.anchors,
            images: self.images,
        }
    }
}

/// Absolute `http`/`https` target.
pub(crate) fn is_web_url(href: &str) -> bool {
    href.starts_with("http://") || href.starts_with("https://")
}
