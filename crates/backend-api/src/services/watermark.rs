//! Stamps downloaded PDFs with a diagonal label and a footer identifying
//! who downloaded the file and when.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use lopdf::{
    content::{Content, Operation},
    dictionary, Dictionary, Document, Object, ObjectId, Stream,
};
use thiserror::Error;
use tracing::{debug, warn};
use wardline_config::WatermarkConfig;

const FONT_RESOURCE: &str = "WlWm";
const FOOTER_FONT_SIZE: f32 = 8.0;
const DEFAULT_MEDIA_BOX: (f32, f32) = (612.0, 792.0);
const MAX_TREE_DEPTH: usize = 32;

#[derive(Debug, Error)]
pub enum WatermarkError {
    #[error("input is not a PDF document")]
    NotPdf,
    #[error("PDF document has no pages")]
    NoPages,
    #[error("failed to process PDF: {0}")]
    Pdf(#[from] lopdf::Error),
    #[error("failed to write PDF: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct Watermark {
    pub label: String,
    pub email: String,
    pub timestamp: DateTime<Utc>,
    pub font_size: u32,
}

impl Watermark {
    pub fn new(config: &WatermarkConfig, email: &str) -> Self {
        Self {
            label: config.label.clone(),
            email: email.to_string(),
            timestamp: Utc::now(),
            font_size: config.font_size.max(1),
        }
    }

    pub fn footer(&self) -> String {
        format!(
            "{} | {} | {}",
            self.label,
            self.email,
            self.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
        )
    }
}

pub fn watermark_pdf(input: &[u8], watermark: &Watermark) -> Result<Vec<u8>, WatermarkError> {
    if !input.starts_with(b"%PDF-") {
        return Err(WatermarkError::NotPdf);
    }

    let mut doc = Document::load_mem(input)?;
    let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
    if pages.is_empty() {
        return Err(WatermarkError::NoPages);
    }

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });

    for page_id in &pages {
        register_font(&mut doc, *page_id, font_id)?;
        let (width, height) = media_box(&doc, *page_id);
        let content = stamp(watermark, width, height).encode()?;
        wrap_page_contents(&mut doc, *page_id, content)?;
    }

    debug!(pages = pages.len(), "watermarked PDF");

    let mut output = Vec::with_capacity(input.len() + 1024);
    doc.save_to(&mut output)?;
    Ok(output)
}

/// Watermark `data` when it is a PDF and watermarking is enabled. Any
/// failure falls back to the original bytes.
pub fn prepare_download(
    data: Bytes,
    content_type: &str,
    config: &WatermarkConfig,
    email: &str,
) -> Bytes {
    if !config.enabled || content_type != "application/pdf" {
        return data;
    }

    match watermark_pdf(&data, &Watermark::new(config, email)) {
        Ok(stamped) => Bytes::from(stamped),
        Err(error) => {
            warn!(error = %error, "serving PDF without watermark");
            data
        }
    }
}

fn stamp(watermark: &Watermark, width: f32, height: f32) -> Content {
    let size = watermark.font_size as f32;
    let (sin, cos) = 45f32.to_radians().sin_cos();
    // Helvetica capitals average a little over half an em.
    let text_width = size * 0.6 * watermark.label.chars().count() as f32;
    let x = (width - text_width * cos) / 2.0;
    let y = (height - text_width * sin) / 2.0;

    Content {
        operations: vec![
            // Closes the save pushed ahead of the page's own content.
            Operation::new("Q", vec![]),
            Operation::new("q", vec![]),
            Operation::new("g", vec![0.75f32.into()]),
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![FONT_RESOURCE.into(), size.into()]),
            Operation::new(
                "Tm",
                vec![
                    cos.into(),
                    sin.into(),
                    (-sin).into(),
                    cos.into(),
                    x.into(),
                    y.into(),
                ],
            ),
            Operation::new("Tj", vec![Object::string_literal(latin(&watermark.label))]),
            Operation::new("ET", vec![]),
            Operation::new("g", vec![0.4f32.into()]),
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![FONT_RESOURCE.into(), FOOTER_FONT_SIZE.into()]),
            Operation::new("Td", vec![36f32.into(), 18f32.into()]),
            Operation::new("Tj", vec![Object::string_literal(latin(&watermark.footer()))]),
            Operation::new("ET", vec![]),
            Operation::new("Q", vec![]),
        ],
    }
}

/// Bracket the existing page content in `q`/`Q` so a transform it leaves
/// behind cannot move the stamp, then append the stamp.
fn wrap_page_contents(
    doc: &mut Document,
    page_id: ObjectId,
    stamp: Vec<u8>,
) -> Result<(), WatermarkError> {
    let mut contents = match doc.get_dictionary(page_id)?.get(b"Contents") {
        Ok(Object::Reference(id)) => match doc.get_object(*id)? {
            Object::Array(items) => items.clone(),
            _ => vec![Object::Reference(*id)],
        },
        Ok(Object::Array(items)) => items.clone(),
        _ => Vec::new(),
    };

    let save_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
    let stamp_id = doc.add_object(Stream::new(Dictionary::new(), stamp));
    contents.insert(0, Object::Reference(save_id));
    contents.push(Object::Reference(stamp_id));

    doc.get_object_mut(page_id)?
        .as_dict_mut()?
        .set("Contents", Object::Array(contents));
    Ok(())
}

/// Standard 14 fonts only cover WinAnsi.
fn latin(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_ascii() && !c.is_ascii_control() { c } else { '?' })
        .collect()
}

fn register_font(
    doc: &mut Document,
    page_id: ObjectId,
    font_id: ObjectId,
) -> Result<(), WatermarkError> {
    adopt_inherited_resources(doc, page_id)?;

    let shared_fonts = {
        let resources = doc.get_or_create_resources(page_id)?.as_dict_mut()?;
        let (shared, inline) = match resources.get(b"Font") {
            Ok(Object::Reference(id)) => (Some(*id), false),
            Ok(Object::Dictionary(_)) => (None, true),
            _ => (None, false),
        };
        if shared.is_none() && !inline {
            resources.set("Font", Dictionary::new());
        }
        shared
    };

    let fonts = match shared_fonts {
        Some(id) => doc.get_object_mut(id)?.as_dict_mut()?,
        None => doc
            .get_or_create_resources(page_id)?
            .as_dict_mut()?
            .get_mut(b"Font")?
            .as_dict_mut()?,
    };
    fonts.set(FONT_RESOURCE, font_id);
    Ok(())
}

/// Pages may inherit `Resources` from the page tree. Give the page its own
/// entry pointing at the inherited value so fonts already in use stay
/// reachable once the watermark font is added.
fn adopt_inherited_resources(doc: &mut Document, page_id: ObjectId) -> Result<(), WatermarkError> {
    if doc.get_dictionary(page_id)?.has(b"Resources") {
        return Ok(());
    }

    if let Some(inherited) = inherited(doc, page_id, b"Resources") {
        let resources = match inherited {
            Object::Dictionary(dict) => Object::Dictionary(dict),
            Object::Reference(id) => Object::Reference(id),
            _ => return Ok(()),
        };
        doc.get_object_mut(page_id)?
            .as_dict_mut()?
            .set("Resources", resources);
    }
    Ok(())
}

fn inherited(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut current = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = current.get(key) {
            return Some(value.clone());
        }
        let parent = current.get(b"Parent").and_then(Object::as_reference).ok()?;
        current = doc.get_dictionary(parent).ok()?;
    }
    None
}

fn media_box(doc: &Document, page_id: ObjectId) -> (f32, f32) {
    let Some(value) = inherited(doc, page_id, b"MediaBox") else {
        return DEFAULT_MEDIA_BOX;
    };
    let value = match value {
        Object::Reference(id) => match doc.get_object(id) {
            Ok(object) => object.clone(),
            Err(_) => return DEFAULT_MEDIA_BOX,
        },
        other => other,
    };

    let Ok(bounds) = value.as_array() else {
        return DEFAULT_MEDIA_BOX;
    };
    let coords: Vec<f32> = bounds.iter().filter_map(|v| v.as_float().ok()).collect();
    match coords.as_slice() {
        [x0, y0, x1, y1] if x1 > x0 && y1 > y0 => (x1 - x0, y1 - y0),
        _ => DEFAULT_MEDIA_BOX,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_pdf() -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        let content = Content {
            operations: vec![
                // Scale left in place with no matching restore.
                Operation::new(
                    "cm",
                    vec![2.into(), 0.into(), 0.into(), 2.into(), 0.into(), 0.into()],
                ),
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![100.into(), 600.into()]),
                Operation::new("Tj", vec![Object::string_literal("Shift handover")]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();
        out
    }

    fn watermark() -> Watermark {
        Watermark {
            label: "CONFIDENTIAL".to_string(),
            email: "nurse@example.org".to_string(),
            timestamp: DateTime::parse_from_rfc3339("2024-03-01T08:30:00Z")
                .unwrap()
                .with_timezone(&Utc),
            font_size: 42,
        }
    }

    #[test]
    fn footer_names_downloader_and_time() {
        assert_eq!(
            watermark().footer(),
            "CONFIDENTIAL | nurse@example.org | 2024-03-01 08:30:00 UTC"
        );
    }

    #[test]
    fn stamps_every_page_and_keeps_existing_fonts() {
        let output = watermark_pdf(&sample_pdf(), &watermark()).unwrap();
        let doc = Document::load_mem(&output).unwrap();
        let page_id = *doc.get_pages().get(&1).unwrap();

        let content = doc.get_page_content(page_id).unwrap();
        let text = String::from_utf8_lossy(&content);
        assert!(text.contains("Shift handover"));
        assert!(text.contains("CONFIDENTIAL"));
        assert!(text.contains("nurse@example.org"));

        let resources = match inherited(&doc, page_id, b"Resources").unwrap() {
            Object::Reference(id) => doc.get_dictionary(id).unwrap().clone(),
            Object::Dictionary(dict) => dict,
            other => panic!("unexpected resources {other:?}"),
        };
        let fonts = resources.get(b"Font").unwrap().as_dict().unwrap();
        assert!(fonts.has(b"F1"));
        assert!(fonts.has(FONT_RESOURCE.as_bytes()));
    }

    #[test]
    fn existing_content_is_isolated_from_the_stamp() {
        let output = watermark_pdf(&sample_pdf(), &watermark()).unwrap();
        let doc = Document::load_mem(&output).unwrap();
        let page_id = *doc.get_pages().get(&1).unwrap();

        let content = Content::decode(&doc.get_page_content(page_id).unwrap()).unwrap();
        let operators: Vec<&str> = content
            .operations
            .iter()
            .map(|op| op.operator.as_str())
            .collect();

        assert_eq!(operators.first(), Some(&"q"));
        let saves = operators.iter().filter(|op| **op == "q").count();
        let restores = operators.iter().filter(|op| **op == "Q").count();
        assert_eq!(saves, restores);

        let scale = operators.iter().position(|op| *op == "cm").unwrap();
        let first_restore = operators.iter().position(|op| *op == "Q").unwrap();
        let label = content
            .operations
            .iter()
            .position(|op| {
                op.operator == "Tj"
                    && op.operands.first().and_then(|o| o.as_str().ok()) == Some(b"CONFIDENTIAL".as_slice())
            })
            .unwrap();
        assert!(scale < first_restore && first_restore < label);
    }

    #[test]
    fn media_box_is_inherited_from_page_tree() {
        let doc = Document::load_mem(&sample_pdf()).unwrap();
        let page_id = *doc.get_pages().get(&1).unwrap();
        assert_eq!(media_box(&doc, page_id), (595.0, 842.0));
    }

    #[test]
    fn rejects_non_pdf_input() {
        assert!(matches!(
            watermark_pdf(b"hello world", &watermark()),
            Err(WatermarkError::NotPdf)
        ));
        assert!(watermark_pdf(b"%PDF-1.7 truncated", &watermark()).is_err());
    }

    #[test]
    fn prepare_download_falls_back_to_original_bytes() {
        let config = WatermarkConfig::default();
        let broken = Bytes::from_static(b"%PDF-broken");
        assert_eq!(
            prepare_download(broken.clone(), "application/pdf", &config, "a@b.c"),
            broken
        );

        let image = Bytes::from_static(b"\x89PNG");
        assert_eq!(
            prepare_download(image.clone(), "image/png", &config, "a@b.c"),
            image
        );
    }

    #[test]
    fn non_ascii_is_replaced_for_standard_fonts() {
        assert_eq!(latin("José"), "Jos?");
    }
}
