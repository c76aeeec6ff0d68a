//! Incremental-update stamper
//!
//! Draws the signature stamp in the lower-left corner of every page by
//! appending a PDF incremental update. The original bytes stay untouched as a
//! prefix of the stamped file; the update redefines each page object with an
//! extra content stream and the stamp font. A machine-readable comment block
//! sits between the original bytes and the update, so
//! [`IncrementalStamper::read_stamp`] can hand back the exact bytes the
//! composite hash was computed over.
//!
//! ```text
//! <original document bytes>
//! %%SIGNATURE-STAMP-BEGIN
//! % Pages: 2
//! % Box: 30 15 254 95
//! % Line: Подписано простой электронной подписью
//! % Line: ...
//! % Payload: {"full_name":"...", ...}
//! % Original-Length: 48213
//! %%SIGNATURE-STAMP-END
//! 3 0 obj << /Type /Page ... /Contents [9 0 R 4 0 R 10 0 R] >> endobj
//! ...
//! xref ... trailer << ... /Prev 48007 >> startxref ... %%EOF
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::domain::backend::StampBackend;
use crate::domain::entities::StampPayload;
use crate::error::BackendError;

const BEGIN_MARKER: &[u8] = b"\n%%SIGNATURE-STAMP-BEGIN\n";
const END_MARKER: &str = "%%SIGNATURE-STAMP-END";
const PDF_MAGIC: &[u8] = b"%PDF-";

/// Resource name of the stamp font inside each page
const FONT_RESOURCE: &str = "StampF1";
const FONT_SIZE: f64 = 6.5;
const TEXT_INSET: f64 = 8.0;
const CORNER_RADIUS: f64 = 5.0;
/// Deepest page tree walked when looking for inherited resources
const MAX_TREE_DEPTH: usize = 32;

/// Stamp box position and size in PDF points, origin bottom-left
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StampGeometry {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl StampGeometry {
    const X: f64 = 30.0;
    const Y: f64 = 15.0;
    const WIDTH: f64 = 254.0;
    const LINE_HEIGHT: f64 = 10.0;
    const PADDING_TOP: f64 = 10.0;
    const PADDING_BOTTOM: f64 = 5.0;

    /// Box tall enough for `line_count` lines of text
    pub fn for_lines(line_count: usize) -> Self {
        Self {
            x: Self::X,
            y: Self::Y,
            width: Self::WIDTH,
            height: Self::PADDING_TOP
                + line_count as f64 * Self::LINE_HEIGHT
                + Self::PADDING_BOTTOM,
        }
    }

    /// Baseline of the first text line
    fn first_baseline(&self) -> f64 {
        self.y + self.height - Self::PADDING_TOP
    }
}

/// Object numbers allocated for one update
#[derive(Debug, Clone, Copy)]
struct StampObjects {
    /// `q` stream placed before the page's own content
    open: ObjectId,
    /// Stamp drawing, wrapped in `Q q ... Q`
    stamp: ObjectId,
    font: ObjectId,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct IncrementalStamper;

impl IncrementalStamper {
    pub fn new() -> Self {
        Self
    }

    fn build_block(
        payload: &StampPayload,
        lines: &[String],
        pages: usize,
        original_len: usize,
    ) -> Result<String, BackendError> {
        let geometry = StampGeometry::for_lines(lines.len());
        let json = serde_json::to_string(payload)
            .map_err(|e| BackendError::failed(format!("cannot encode stamp: {e}")))?;

        let mut block = String::new();
        block.push_str(&format!("% Pages: {pages}\n"));
        block.push_str(&format!(
            "% Box: {} {} {} {}\n",
            geometry.x, geometry.y, geometry.width, geometry.height
        ));
        for line in lines {
            block.push_str(&format!("% Line: {line}\n"));
        }
        block.push_str(&format!("% Payload: {json}\n"));
        block.push_str(&format!("% Original-Length: {original_len}\n"));
        block.push_str(END_MARKER);
        block.push('\n');
        Ok(block)
    }
}

impl StampBackend for IncrementalStamper {
    fn apply_stamp(
        &self,
        input_pdf: &Path,
        output_pdf: &Path,
        payload: &StampPayload,
    ) -> Result<(), BackendError> {
        let original = std::fs::read(input_pdf)?;
        if !original.starts_with(PDF_MAGIC) {
            return Err(BackendError::failed("input is not a PDF document"));
        }
        if find_last(&original, BEGIN_MARKER).is_some() {
            return Err(BackendError::failed("document already carries a signature stamp"));
        }

        let document = Document::load_mem(&original)?;
        if document.trailer.has(b"Encrypt") {
            return Err(BackendError::failed("encrypted documents cannot be stamped"));
        }
        let pages = document.get_pages();
        if pages.is_empty() {
            return Err(BackendError::failed("document has no pages"));
        }

        let lines: Vec<String> = payload.lines().iter().map(|l| single_line(l)).collect();
        let mut block = BEGIN_MARKER.to_vec();
        block.extend_from_slice(
            Self::build_block(payload, &lines, pages.len(), original.len())?.as_bytes(),
        );
        let stamped = append_update(&original, &document, &pages, &stamp_content(&lines), &block)?;
        std::fs::write(output_pdf, stamped)?;

        tracing::debug!(pages = pages.len(), output = %output_pdf.display(), "Stamp applied");
        Ok(())
    }

    fn read_stamp(&self, stamped_pdf: &Path) -> Result<(Vec<u8>, StampPayload), BackendError> {
        let mut bytes = std::fs::read(stamped_pdf)?;
        let start = find_last(&bytes, BEGIN_MARKER)
            .ok_or_else(|| BackendError::failed("no signature stamp found"))?;
        let rest = &bytes[start + BEGIN_MARKER.len()..];
        let end = find_first(rest, END_MARKER.as_bytes())
            .ok_or_else(|| BackendError::failed("stamp block is truncated"))?;
        let block = std::str::from_utf8(&rest[..end])
            .map_err(|_| BackendError::failed("stamp block is not valid UTF-8"))?;

        let mut payload = None;
        let mut original_len = None;
        for line in block.lines() {
            if let Some(json) = line.strip_prefix("% Payload: ") {
                payload = Some(
                    serde_json::from_str::<StampPayload>(json)
                        .map_err(|e| BackendError::failed(format!("corrupt stamp payload: {e}")))?,
                );
            } else if let Some(len) = line.strip_prefix("% Original-Length: ") {
                original_len = len.trim().parse::<usize>().ok();
            }
        }

        let payload = payload.ok_or_else(|| BackendError::failed("stamp payload missing"))?;
        if original_len != Some(start) {
            return Err(BackendError::failed("stamp does not match document length"));
        }
        bytes.truncate(start);
        Ok((bytes, payload))
    }
}

// ============================================================================
// Incremental update
// ============================================================================

/// Original bytes, the stamp block, then redefined pages, new objects and
/// a cross-reference section chained to the previous one
fn append_update(
    original: &[u8],
    document: &Document,
    pages: &BTreeMap<u32, ObjectId>,
    content: &[u8],
    block: &[u8],
) -> Result<Vec<u8>, BackendError> {
    let prev_xref = previous_xref_offset(original)
        .ok_or_else(|| BackendError::failed("document has no cross-reference offset"))?;
    let root = document.trailer.get(b"Root")?.as_reference()?;

    let highest = document.objects.keys().map(|(id, _)| *id).max().unwrap_or(0);
    let declared = document
        .trailer
        .get(b"Size")
        .and_then(Object::as_i64)
        .ok()
        .and_then(|size| u32::try_from(size).ok())
        .unwrap_or(0);
    let next = highest.saturating_add(1).max(declared);
    let objects = StampObjects {
        open: (next, 0),
        stamp: (next + 1, 0),
        font: (next + 2, 0),
    };

    let mut out = original.to_vec();
    out.extend_from_slice(block);
    let mut offsets = Vec::with_capacity(pages.len() + 3);

    for &page_id in pages.values() {
        let page = stamped_page(document, page_id, objects)?;
        offsets.push((page_id, out.len()));
        out.extend_from_slice(format!("{} {} obj\n", page_id.0, page_id.1).as_bytes());
        write_dictionary(&mut out, &page);
        out.extend_from_slice(b"\nendobj\n");
    }

    offsets.push((objects.open, out.len()));
    write_stream(&mut out, objects.open, b"q\n");
    offsets.push((objects.stamp, out.len()));
    write_stream(&mut out, objects.stamp, content);
    offsets.push((objects.font, out.len()));
    out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", objects.font.0, font_dictionary()).as_bytes());

    let xref_offset = out.len();
    offsets.sort_unstable();
    out.extend_from_slice(b"xref\n");
    for ((id, generation), offset) in &offsets {
        out.extend_from_slice(format!("{id} 1\n{offset:010} {generation:05} n \n").as_bytes());
    }

    let mut trailer = Dictionary::new();
    trailer.set("Size", i64::from(next + 3));
    trailer.set("Root", Object::Reference(root));
    for key in [&b"Info"[..], &b"ID"[..]] {
        if let Ok(value) = document.trailer.get(key) {
            trailer.set(key.to_vec(), value.clone());
        }
    }
    trailer.set("Prev", prev_xref as i64);
    out.extend_from_slice(b"trailer\n");
    write_dictionary(&mut out, &trailer);
    out.extend_from_slice(format!("\nstartxref\n{xref_offset}\n%%EOF\n").as_bytes());
    Ok(out)
}

/// Copy of the page with the stamp streams and font added
///
/// Inherited resources are copied onto the page so the stamp font can be
/// added without touching shared resource dictionaries.
fn stamped_page(
    document: &Document,
    page_id: ObjectId,
    objects: StampObjects,
) -> Result<Dictionary, lopdf::Error> {
    let mut page = document.get_object(page_id)?.as_dict()?.clone();

    let mut contents = vec![Object::Reference(objects.open)];
    match page.get(b"Contents") {
        Ok(Object::Array(items)) => contents.extend(items.iter().cloned()),
        Ok(Object::Reference(id)) => match document.get_object(*id)? {
            Object::Array(items) => contents.extend(items.iter().cloned()),
            _ => contents.push(Object::Reference(*id)),
        },
        _ => {}
    }
    contents.push(Object::Reference(objects.stamp));

    let mut resources = inherited_resources(document, &page)?;
    let mut fonts = match resources.get(b"Font") {
        Ok(fonts) => resolve(document, fonts)?.as_dict()?.clone(),
        Err(_) => Dictionary::new(),
    };
    fonts.set(FONT_RESOURCE, Object::Reference(objects.font));
    resources.set("Font", Object::Dictionary(fonts));

    page.set("Contents", Object::Array(contents));
    page.set("Resources", Object::Dictionary(resources));
    Ok(page)
}

fn inherited_resources<'a>(
    document: &'a Document,
    page: &'a Dictionary,
) -> Result<Dictionary, lopdf::Error> {
    let mut node = page;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(resources) = node.get(b"Resources") {
            return Ok(resolve(document, resources)?.as_dict()?.clone());
        }
        match node.get(b"Parent").and_then(Object::as_reference) {
            Ok(parent) => node = document.get_object(parent)?.as_dict()?,
            Err(_) => break,
        }
    }
    Ok(Dictionary::new())
}

fn resolve<'a>(document: &'a Document, object: &'a Object) -> Result<&'a Object, lopdf::Error> {
    match object {
        Object::Reference(id) => document.get_object(*id),
        other => Ok(other),
    }
}

fn previous_xref_offset(pdf: &[u8]) -> Option<usize> {
    const KEYWORD: &[u8] = b"startxref";
    let at = find_last(pdf, KEYWORD)?;
    let digits: String = pdf[at + KEYWORD.len()..]
        .iter()
        .skip_while(|b| b.is_ascii_whitespace())
        .take_while(|b| b.is_ascii_digit())
        .map(|&b| char::from(b))
        .collect();
    digits.parse().ok()
}

// ============================================================================
// Stamp drawing
// ============================================================================

/// Content stream drawing the stamp box and its lines
///
/// Starts with `Q` to close the `q` placed before the page's own content, so
/// the stamp is drawn in the default graphics state.
fn stamp_content(lines: &[String]) -> Vec<u8> {
    let g = StampGeometry::for_lines(lines.len());
    let mut ops = vec![
        "Q".to_string(),
        "q".to_string(),
        "1 1 1 rg 0.1 0.2 0.55 RG 0.8 w".to_string(),
        rounded_rect(&g, CORNER_RADIUS),
        "B".to_string(),
        format!("{} {} {} {} re W n", num(g.x), num(g.y), num(g.width), num(g.height)),
        "BT".to_string(),
        format!("/{FONT_RESOURCE} {} Tf", num(FONT_SIZE)),
        format!("{} TL", num(StampGeometry::LINE_HEIGHT)),
        "0.1 0.2 0.55 rg".to_string(),
        format!("{} {} Td", num(g.x + TEXT_INSET), num(g.first_baseline())),
    ];
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            ops.push("T*".to_string());
        }
        ops.push(format!("<{}> Tj", platform::crypto::to_hex(&encode_text(line))));
    }
    ops.push("ET".to_string());
    ops.push("Q".to_string());

    let mut content = ops.join("\n").into_bytes();
    content.push(b'\n');
    content
}

/// Closed path of a rectangle with quarter-circle corners
fn rounded_rect(g: &StampGeometry, r: f64) -> String {
    // Bezier handle length approximating a quarter circle
    let k = r * 0.5523;
    let (x0, y0, x1, y1) = (g.x, g.y, g.x + g.width, g.y + g.height);
    let segments: [(&str, &[f64]); 9] = [
        ("m", &[x0 + r, y0]),
        ("l", &[x1 - r, y0]),
        ("c", &[x1 - r + k, y0, x1, y0 + r - k, x1, y0 + r]),
        ("l", &[x1, y1 - r]),
        ("c", &[x1, y1 - r + k, x1 - r + k, y1, x1 - r, y1]),
        ("l", &[x0 + r, y1]),
        ("c", &[x0 + r - k, y1, x0, y1 - r + k, x0, y1 - r]),
        ("l", &[x0, y0 + r]),
        ("c", &[x0, y0 + r - k, x0 + r - k, y0, x0 + r, y0]),
    ];
    let mut path: Vec<String> = segments
        .iter()
        .map(|(op, coords)| {
            let coords: Vec<String> = coords.iter().map(|&v| num(v)).collect();
            format!("{} {op}", coords.join(" "))
        })
        .collect();
    path.push("h".to_string());
    path.join("\n")
}

/// PDF number with at most two decimals
fn num(value: f64) -> String {
    let text = format!("{value:.2}");
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Single-byte codes for the stamp font
///
/// Printable ASCII maps to itself and Cyrillic follows the Windows-1251
/// layout declared by [`font_dictionary`]. Anything else becomes `?`.
fn encode_text(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            ' '..='~' => c as u8,
            'А'..='я' => (0xC0 + (u32::from(c) - 0x410)) as u8,
            'Ё' => 0xA8,
            'ё' => 0xB8,
            '№' => 0xB9,
            _ => b'?',
        })
        .collect()
}

// TODO: embed a TrueType font so Cyrillic glyphs render without viewer font substitution
fn font_dictionary() -> String {
    let mut differences = String::from("168 /uni0401 184 /uni0451 /uni2116 192");
    for code in 0x410..=0x44F {
        differences.push_str(&format!(" /uni{code:04X}"));
    }
    format!(
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding << /Type /Encoding \
         /BaseEncoding /WinAnsiEncoding /Differences [{differences}] >> >>"
    )
}

// ============================================================================
// Object serialization
// ============================================================================

fn write_stream(out: &mut Vec<u8>, id: ObjectId, data: &[u8]) {
    out.extend_from_slice(
        format!("{} {} obj\n<< /Length {} >>\nstream\n", id.0, id.1, data.len()).as_bytes(),
    );
    out.extend_from_slice(data);
    out.extend_from_slice(b"\nendstream\nendobj\n");
}

fn write_dictionary(out: &mut Vec<u8>, dictionary: &Dictionary) {
    out.extend_from_slice(b"<<");
    for (key, value) in dictionary.iter() {
        out.push(b' ');
        write_name(out, key);
        out.push(b' ');
        write_object(out, value);
    }
    out.extend_from_slice(b" >>");
}

fn write_object(out: &mut Vec<u8>, object: &Object) {
    match object {
        Object::Null => out.extend_from_slice(b"null"),
        Object::Boolean(value) => out.extend_from_slice(value.to_string().as_bytes()),
        Object::Integer(value) => out.extend_from_slice(value.to_string().as_bytes()),
        Object::Real(value) => out.extend_from_slice(value.to_string().as_bytes()),
        Object::Name(name) => write_name(out, name),
        Object::String(bytes, _) => {
            out.push(b'<');
            out.extend_from_slice(platform::crypto::to_hex(bytes).as_bytes());
            out.push(b'>');
        }
        Object::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b' ');
                }
                write_object(out, item);
            }
            out.push(b']');
        }
        Object::Dictionary(dictionary) => write_dictionary(out, dictionary),
        Object::Reference((id, generation)) => {
            out.extend_from_slice(format!("{id} {generation} R").as_bytes());
        }
        // Streams are indirect and never appear inside a page dictionary
        _ => out.extend_from_slice(b"null"),
    }
}

fn write_name(out: &mut Vec<u8>, name: &[u8]) {
    out.push(b'/');
    for &byte in name {
        if byte.is_ascii_graphic() && !b"()<>[]{}/%#".contains(&byte) {
            out.push(byte);
        } else {
            out.extend_from_slice(format!("#{byte:02X}").as_bytes());
        }
    }
}

fn find_first(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn find_last(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).rposition(|w| w == needle)
}

fn single_line(text: &str) -> String {
    text.replace(['\r', '\n'], " ")
}

/// Minimal document whose pages inherit fonts from the page tree root
#[cfg(test)]
pub(crate) fn sample_pdf(pages: usize, note: &str) -> Vec<u8> {
    use lopdf::{Stream, dictionary};

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

    let note = single_line(note);
    let mut kids = Vec::new();
    for page in 1..=pages {
        let body = format!("% {note}\nBT /F1 12 Tf 72 720 Td (Page {page}) Tj ET\n");
        let content_id = doc.add_object(Stream::new(dictionary! {}, body.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }
    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{ConfirmationContext, Identity};

    fn payload() -> StampPayload {
        let identity = Identity {
            first_name: "Ivan".into(),
            middle_name: "Ivanovich".into(),
            last_name: "Ivanov".into(),
            phone_number: "+79161234567".into(),
            passport_issued_by: "ОВД\nрайона".into(),
            ..Default::default()
        };
        let confirmation = ConfirmationContext {
            phone: "+79161234567".into(),
            code: "1234".into(),
            signed_at: "2024-01-15T14:30:25+03:00".into(),
        };
        StampPayload::new(&identity, &confirmation, "cd".repeat(32), "SHA-256")
    }

    fn stamp_sample(pages: usize) -> (tempfile::TempDir, Vec<u8>, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.pdf");
        let output = dir.path().join("out.pdf");
        let original = sample_pdf(pages, "contract body");
        std::fs::write(&input, &original).unwrap();
        IncrementalStamper::new()
            .apply_stamp(&input, &output, &payload())
            .unwrap();
        (dir, original, output)
    }

    #[test]
    fn test_stamp_is_drawn_on_every_page() {
        let (_dir, _, output) = stamp_sample(3);
        let stamped = std::fs::read(&output).unwrap();
        let doc = Document::load_mem(&stamped).unwrap();
        let pages = doc.get_pages();
        assert_eq!(pages.len(), 3);

        let name_hex = platform::crypto::to_hex(&encode_text("Ivan Ivanovich Ivanov"));
        let hash_hex = platform::crypto::to_hex("cd".repeat(32).as_bytes());
        for (number, page_id) in pages {
            let content = String::from_utf8(doc.get_page_content(page_id).unwrap()).unwrap();
            assert!(content.contains(&format!("(Page {number}) Tj")));
            assert!(content.contains("/StampF1 6.5 Tf"));
            assert!(content.contains("30 15 254 85 re W n"));
            assert!(content.contains(&format!("<{name_hex}> Tj")));
            assert!(content.contains(&format!("<{hash_hex}> Tj")));

            let page = doc.get_object(page_id).unwrap().as_dict().unwrap();
            let fonts = page
                .get(b"Resources")
                .and_then(Object::as_dict)
                .and_then(|r| r.get(b"Font"))
                .and_then(Object::as_dict)
                .unwrap();
            assert!(fonts.has(b"F1"));
            assert!(fonts.has(b"StampF1"));
        }
    }

    #[test]
    fn test_stamp_and_read_back() {
        let (_dir, original, output) = stamp_sample(2);
        let stamped = std::fs::read(&output).unwrap();
        assert!(stamped.starts_with(&original));
        assert!(stamped.ends_with(b"%%EOF\n"));

        let text = String::from_utf8_lossy(&stamped);
        assert!(text.contains("% Pages: 2\n"));
        assert!(text.contains("% Box: 30 15 254 85\n"));
        assert!(text.contains("% Line: Подписано простой электронной подписью\n"));
        assert!(text.contains("% Line: Выдан: ОВД района\n"));

        let (recovered, read) = IncrementalStamper::new().read_stamp(&output).unwrap();
        assert_eq!(recovered, original);
        assert_eq!(read, payload());
    }

    #[test]
    fn test_rejects_non_pdf_and_pageless_input() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.pdf");
        let output = dir.path().join("out.pdf");
        let stamper = IncrementalStamper::new();

        std::fs::write(&input, b"<html></html>").unwrap();
        assert!(stamper.apply_stamp(&input, &output, &payload()).is_err());

        std::fs::write(&input, b"%PDF-1.4\n<< /Type /Pages >>\n%%EOF\n").unwrap();
        assert!(stamper.apply_stamp(&input, &output, &payload()).is_err());

        std::fs::write(&input, sample_pdf(0, "empty")).unwrap();
        let err = stamper.apply_stamp(&input, &output, &payload()).unwrap_err();
        assert!(err.to_string().contains("no pages"));
        assert!(!output.exists());
    }

    #[test]
    fn test_refuses_double_stamp_and_detects_tampering() {
        let (dir, _, once) = stamp_sample(1);
        let twice = dir.path().join("twice.pdf");
        let stamper = IncrementalStamper::new();
        assert!(stamper.apply_stamp(&once, &twice, &payload()).is_err());

        // Growing the document shifts the stamp away from the recorded length
        let mut bytes = std::fs::read(&once).unwrap();
        bytes.splice(0..0, b"%PDF-1.7\n".iter().copied());
        std::fs::write(&once, bytes).unwrap();
        assert!(stamper.read_stamp(&once).is_err());
    }

    #[test]
    fn test_geometry_grows_with_lines() {
        let g = StampGeometry::for_lines(6);
        assert_eq!(g.height, 75.0);
        assert_eq!(g.width, 254.0);
        assert_eq!(g.first_baseline(), 80.0);
        assert!(StampGeometry::for_lines(10).height > g.height);
    }

    #[test]
    fn test_text_encoding_and_numbers() {
        assert_eq!(encode_text("Ёж №5 ü"), vec![0xA8, 0xE6, b' ', 0xB9, b'5', b' ', b'?']);
        assert_eq!(encode_text("Аая"), vec![0xC0, 0xE0, 0xFF]);
        assert_eq!(num(30.0), "30");
        assert_eq!(num(6.5), "6.5");
        assert_eq!(num(32.2385), "32.24");
    }
}
