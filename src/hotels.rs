//! Hotel list section of an itinerary.
//!
//! Pure layout: hotel records in, a [`Fragment`] out. Each hotel with a
//! website gets one "visit website" link and a QR code pointing at it.

use crate::fragment::{is_web_url, Fragment, FragmentBuilder, TextStyle};
use crate::geometry::{Rect, Size};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;
use url::form_urlencoded;

/// Width of the rendered section.
pub const SECTION_WIDTH: f32 = 600.0;

/// QR code generation endpoint.
pub const QR_ENDPOINT: &str = "https://api.qrserver.com/v1/create-qr-code/";

/// Thumbnail drawn when a hotel has no usable image.
const PLACEHOLDER_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="96" height="80" viewBox="0 0 96 80"><rect width="96" height="80" fill="#e5e7eb"/><path d="M18 62 L38 38 L52 52 L62 44 L78 62 Z" fill="#9ca3af"/><circle cx="66" cy="26" r="7" fill="#9ca3af"/></svg>"##;

const PADDING: f32 = 16.0;
const HEADER_HEIGHT: f32 = 44.0;
const CARD_GAP: f32 = 12.0;
const CARD_PADDING: f32 = 12.0;
const LINE_HEIGHT: f32 = 22.0;
const THUMB_WIDTH: f32 = 96.0;
const THUMB_HEIGHT: f32 = 80.0;
const QR_SIZE: f32 = 48.0;
const LINK_WIDTH: f32 = 150.0;

const ACCENT: &str = "#c8963e";
const BORDER: &str = "#e5e7eb";
const CARD: &str = "#ffffff";
const HEADER: &str = "#1e3a5f";
const MUTED: &str = "#6b7280";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hotel {
    pub id: String,
    pub name: String,
    pub stars: u8,
    pub nights: u32,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl Hotel {
    pub fn new(id: impl Into<String>, name: impl Into<String>, stars: u8, nights: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            stars,
            nights,
            notes: None,
            website: None,
            image_url: None,
        }
    }

    pub fn with_website(mut self, website: impl Into<String>) -> Self {
        self.website = Some(website.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_image(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into());
        self
    }

    /// Website, ignoring blank values.
    fn website(&self) -> Option<&str> {
        self.website.as_deref().filter(|w| !w.trim().is_empty())
    }

    fn card_height(&self) -> f32 {
        let mut lines = 2.0;
        if self.notes.as_deref().is_some_and(|n| !n.is_empty()) {
            lines += 1.0;
        }
        if self.website().is_some() {
            lines += 1.0;
        }
        (CARD_PADDING * 2.0 + lines * LINE_HEIGHT).max(THUMB_HEIGHT + CARD_PADDING * 2.0)
    }
}

/// Inline `data:` URI of the placeholder thumbnail.
pub fn placeholder_image() -> String {
    format!("data:image/svg+xml;base64,{}", STANDARD.encode(PLACEHOLDER_SVG))
}

/// Only web and inline images are rendered; anything else would be read from disk.
fn thumbnail_href(hotel: &Hotel) -> String {
    match hotel.image_url.as_deref().map(str::trim) {
        Some(href) if is_web_url(href) || href.starts_with("data:image/") => href.to_string(),
        _ => placeholder_image(),
    }
}

/// URL of the QR code image encoding `website`.
pub fn qr_code_url(website: &str) -> String {
    let data: String = form_urlencoded::byte_serialize(website.as_bytes()).collect();
    format!("{}?size=80x80&data={}", QR_ENDPOINT, data)
}

pub struct HotelsSection;

impl HotelsSection {
    pub fn render(hotels: &[Hotel]) -> Fragment {
        let cards_height: f32 = hotels.iter().map(Hotel::card_height).sum::<f32>()
            + CARD_GAP * hotels.len().saturating_sub(1) as f32;
        let body_height = PADDING * 2.0 + cards_height;
        let height = HEADER_HEIGHT + body_height;

        let mut builder = FragmentBuilder::new(Size::new(SECTION_WIDTH, height));

        builder
            .rect(Rect::new(0.0, 0.0, SECTION_WIDTH, HEADER_HEIGHT), HEADER, None, 8.0)
            .path(&star_path(PADDING + 10.0, HEADER_HEIGHT / 2.0, 10.0), ACCENT)
            .text(
                PADDING + 28.0,
                HEADER_HEIGHT / 2.0 + 6.0,
                "Hotels in the itinerary",
                TextStyle {
                    size: 17.0,
                    fill: "#ffffff",
                    bold: true,
                    ..TextStyle::default()
                },
            )
            .rect(
                Rect::new(0.0, HEADER_HEIGHT, SECTION_WIDTH, body_height),
                CARD,
                Some(BORDER),
                0.0,
            );

        let mut y = HEADER_HEIGHT + PADDING;
        for hotel in hotels {
            render_card(&mut builder, hotel, y);
            y += hotel.card_height() + CARD_GAP;
        }

        builder.build()
    }
}

fn render_card(builder: &mut FragmentBuilder, hotel: &Hotel, top: f32) {
    let left = PADDING;
    let width = SECTION_WIDTH - PADDING * 2.0;
    let height = hotel.card_height();
    let text_x = left + CARD_PADDING;

    builder.rect(Rect::new(left, top, width, height), "#fafaf9", Some(BORDER), 8.0);

    let mut baseline = top + CARD_PADDING + 16.0;
    let name_style = TextStyle {
        size: 16.0,
        bold: true,
        ..TextStyle::default()
    };
    builder.text(text_x, baseline, &hotel.name, name_style);

    let stars_x = text_x + approx_text_width(&hotel.name, name_style.size) + 12.0;
    for i in 0..hotel.stars {
        builder.path(
            &star_path(stars_x + i as f32 * 15.0, baseline - 5.0, 6.5),
            ACCENT,
        );
    }

    baseline += LINE_HEIGHT;
    let muted = TextStyle {
        size: 13.0,
        fill: MUTED,
        ..TextStyle::default()
    };
    builder.text(text_x, baseline, &format!("{} nights", hotel.nights), muted);

    if let Some(notes) = hotel.notes.as_deref().filter(|n| !n.is_empty()) {
        baseline += LINE_HEIGHT;
        builder.text(
            text_x,
            baseline,
            notes,
            TextStyle {
                italic: true,
                ..muted
            },
        );
    }

    if let Some(website) = hotel.website() {
        baseline += LINE_HEIGHT;
        let link_rect = Rect::new(text_x, baseline - 14.0, LINK_WIDTH, 20.0);
        builder.link(Some(website), link_rect, |b| {
            b.text(
                text_x,
                baseline,
                "Visit hotel website",
                TextStyle {
                    size: 12.0,
                    fill: ACCENT,
                    bold: true,
                    ..TextStyle::default()
                },
            );
        });
    }

    let thumb = Rect::new(
        left + width - CARD_PADDING - THUMB_WIDTH,
        top + CARD_PADDING,
        THUMB_WIDTH,
        THUMB_HEIGHT,
    );
    builder.image(thumb, &thumbnail_href(hotel));

    if let Some(website) = hotel.website() {
        let qr = Rect::new(thumb.x - 4.0, thumb.bottom() - QR_SIZE + 4.0, QR_SIZE, QR_SIZE);
        builder
            .rect(qr, CARD, Some(BORDER), 6.0)
            .image(qr, &qr_code_url(website));
    }
}

fn approx_text_width(text: &str, font_size: f32) -> f32 {
    text.chars().count() as f32 * font_size * 0.55
}

/// Five-pointed star centred on `(cx, cy)`.
fn star_path(cx: f32, cy: f32, radius: f32) -> String {
    let inner = radius * 0.45;
    let mut d = String::new();
    for i in 0..10 {
        let r = if i % 2 == 0 { radius } else { inner };
        let angle = -PI / 2.0 + i as f32 * PI / 5.0;
        let (x, y) = (cx + r * angle.cos(), cy + r * angle.sin());
        d.push_str(&format!("{}{:.2} {:.2} ", if i == 0 { 'M' } else { 'L' }, x, y));
    }
    d.push('Z');
    d
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decoded_qr_data(href: &str) -> String {
        let query = href.split_once('?').unwrap().1;
        form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == "data")
            .map(|(_, value)| value.into_owned())
            .unwrap()
    }

    #[test]
    fn test_links_and_qr_codes_per_website() {
        let hotels = vec![
            Hotel::new("1", "Alpha", 5, 3).with_website("https://alpha.example/?lang=en&x=1"),
            Hotel::new("2", "Beta", 4, 2).with_website("https://beta.example"),
            Hotel::new("3", "Gamma", 3, 1),
        ];

        let fragment = HotelsSection::render(&hotels);

        let links: Vec<_> = fragment.anchors().iter().filter_map(|a| a.href.as_deref()).collect();
        assert_eq!(links, vec!["https://alpha.example/?lang=en&x=1", "https://beta.example"]);

        let qr: Vec<_> = fragment
            .images()
            .iter()
            .filter(|image| image.href.starts_with(QR_ENDPOINT))
            .map(|image| decoded_qr_data(&image.href))
            .collect();
        assert_eq!(qr, vec!["https://alpha.example/?lang=en&x=1", "https://beta.example"]);
    }

    #[test]
    fn test_placeholder_and_notes() {
        let hotels = vec![
            Hotel::new("1", "Alpha", 2, 3)
                .with_notes("Breakfast included")
                .with_image("https://img.example/alpha.jpg"),
            Hotel::new("2", "Beta", 0, 1),
        ];

        let fragment = HotelsSection::render(&hotels);

        assert!(fragment.markup().contains("Breakfast included"));
        assert!(fragment.markup().contains("3 nights"));
        let thumbs: Vec<_> = fragment.images().iter().map(|i| i.href.as_str()).collect();
        let placeholder = placeholder_image();
        assert_eq!(thumbs, vec!["https://img.example/alpha.jpg", placeholder.as_str()]);
        assert!(fragment.anchors().is_empty());
    }

    #[test]
    fn test_local_image_paths_fall_back_to_placeholder() {
        let hotels = vec![
            Hotel::new("1", "Alpha", 3, 1).with_image("/etc/hotel.png"),
            Hotel::new("2", "Beta", 3, 1).with_image("file:///tmp/beta.jpg"),
            Hotel::new("3", "Gamma", 3, 1).with_image("data:image/png;base64,AQID"),
        ];

        let fragment = HotelsSection::render(&hotels);

        let thumbs: Vec<_> = fragment.images().iter().map(|i| i.href.clone()).collect();
        assert_eq!(
            thumbs,
            vec![placeholder_image(), placeholder_image(), "data:image/png;base64,AQID".to_string()]
        );
        assert!(fragment.markup().contains("data:image/svg+xml;base64,"));
        assert!(!fragment.markup().contains("/etc/hotel.png"));
        assert!(fragment.remote_images().is_empty());
    }

    #[test]
    fn test_anchor_inside_section() {
        let hotels = vec![Hotel::new("1", "Alpha", 5, 3).with_website("https://alpha.example")];
        let fragment = HotelsSection::render(&hotels);
        let size = fragment.size();
        let anchor = &fragment.anchors()[0];

        assert!(anchor.rect.x >= 0.0 && anchor.rect.right() <= size.width);
        assert!(anchor.rect.y >= HEADER_HEIGHT && anchor.rect.bottom() <= size.height);
    }

    #[test]
    fn test_blank_website_is_ignored() {
        let hotels = vec![Hotel::new("1", "Alpha", 5, 3).with_website("  ")];
        let fragment = HotelsSection::render(&hotels);

        assert!(fragment.anchors().is_empty());
        assert!(fragment.remote_images().is_empty());
    }

    #[test]
    fn test_hotels_deserialize_camel_case() {
        let json = r#"[{"id":"1","name":"Alpha","stars":4,"nights":2,"imageUrl":"https://img.example/a.jpg"}]"#;
        let hotels: Vec<Hotel> = serde_json::from_str(json).unwrap();

        assert_eq!(hotels[0].image_url.as_deref(), Some("https://img.example/a.jpg"));
        assert!(hotels[0].website.is_none());
    }

    #[test]
    fn test_empty_section_has_size() {
        let fragment = HotelsSection::render(&[]);
        assert!(!fragment.size().is_empty());
    }
}
