use crate::error::IngestError;
use crate::models::ExtractionOptions;
use crate::normalizer::TextNormalizer;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::{BTreeMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Nesting limit for page-tree inheritance and form XObject recursion.
const MAX_TREE_DEPTH: usize = 32;

/// TJ displacement (thousandths of text space) wide enough to read as a word gap.
const WORD_GAP: f32 = -200.0;

#[derive(Debug, Clone)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

pub trait PdfExtractor {
    /// Best-effort text of a PDF. Never fails: unreadable input yields an empty
    /// string, a budget overrun yields the pages recovered so far.
    fn extract_text(&self, bytes: &[u8]) -> String;
}

#[derive(Debug, Clone)]
pub struct LopdfExtractor {
    options: ExtractionOptions,
    normalizer: TextNormalizer,
}

impl LopdfExtractor {
    pub fn new(options: ExtractionOptions, normalizer: TextNormalizer) -> Self {
        Self {
            options,
            normalizer,
        }
    }

    pub fn with_defaults() -> Result<Self, IngestError> {
        Ok(Self::new(ExtractionOptions::default(), TextNormalizer::new()?))
    }

    pub fn options(&self) -> ExtractionOptions {
        self.options
    }

    /// Parses on a detached worker thread and collects the pages it streams back
    /// until the worker finishes or the budget runs out. On expiry the receiver
    /// is dropped, which stops the worker at its next page.
    pub fn extract_pages(&self, bytes: &[u8]) -> Vec<PageText> {
        let started = Instant::now();
        let (sender, receiver) = mpsc::channel();
        let payload = bytes.to_vec();
        let options = self.options;
        let normalizer = self.normalizer.clone();

        let spawned = thread::Builder::new()
            .name("pdf-extract".to_string())
            .spawn(move || walk_pages(&payload, options, &normalizer, &sender));
        if let Err(error) = spawned {
            warn!(%error, "could not start pdf extraction worker");
            return Vec::new();
        }

        collect_pages(&receiver, started, self.options.budget)
    }
}

/// Receives pages until the sender hangs up or `budget` has elapsed since
/// `started`. Pages that arrived in time are kept either way.
fn collect_pages(
    receiver: &Receiver<PageText>,
    started: Instant,
    budget: Duration,
) -> Vec<PageText> {
    let mut pages = Vec::new();
    loop {
        let remaining = budget.saturating_sub(started.elapsed());
        if remaining.is_zero() {
            warn!(pages = pages.len(), "pdf extraction budget exhausted, keeping partial text");
            break;
        }

        match receiver.recv_timeout(remaining) {
            Ok(page) => pages.push(page),
            Err(RecvTimeoutError::Timeout) => {
                warn!(pages = pages.len(), "pdf extraction budget exhausted, keeping partial text");
                break;
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    pages
}

impl PdfExtractor for LopdfExtractor {
    fn extract_text(&self, bytes: &[u8]) -> String {
        self.extract_pages(bytes)
            .into_iter()
            .map(|page| page.text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn walk_pages(
    bytes: &[u8],
    options: ExtractionOptions,
    normalizer: &TextNormalizer,
    sender: &Sender<PageText>,
) {
    let mut document = match Document::load_mem(bytes) {
        Ok(document) => document,
        Err(error) => {
            debug!(%error, "pdf could not be opened");
            return;
        }
    };

    if document.is_encrypted() {
        if let Err(error) = document.decrypt("") {
            debug!(%error, "encrypted pdf could not be unlocked with an empty password");
            return;
        }
    }

    for (index, page_id) in document.page_iter().take(options.max_pages).enumerate() {
        let number = index as u32 + 1;
        let raw = recover_page_text(&document, number, page_id);
        let text = normalizer.normalize(&raw);
        if text.chars().count() < options.min_page_chars {
            continue;
        }

        if sender.send(PageText { number, text }).is_err() {
            break;
        }
    }
}

type Tier = fn(&Document, ObjectId) -> Option<String>;

const CASCADE: [(&str, Tier); 3] = [
    ("layout", layout_text),
    ("blocks", block_text),
    ("spans", span_text),
];

fn recover_page_text(document: &Document, number: u32, page_id: ObjectId) -> String {
    for (name, tier) in CASCADE {
        match panic::catch_unwind(AssertUnwindSafe(|| tier(document, page_id))) {
            Ok(Some(text)) if !text.trim().is_empty() => return text,
            Ok(_) => debug!(page = number, tier = name, "no text recovered"),
            Err(_) => debug!(page = number, tier = name, "text recovery panicked"),
        }
    }

    String::new()
}

/// Text objects decoded through each font's declared encoding, ordered top to
/// bottom then left to right by their text-matrix origin.
fn layout_text(document: &Document, page_id: ObjectId) -> Option<String> {
    let encodings = document
        .get_page_fonts(page_id)
        .into_iter()
        .map(|(name, font)| (name, font.get_font_encoding()))
        .collect::<BTreeMap<_, _>>();
    let content = Content::decode(&document.get_page_content(page_id).ok()?).ok()?;

    let mut blocks = text_blocks(&content.operations, &StringDecoding::FontAware(encodings));
    blocks.sort_by(|left, right| {
        right
            .y
            .total_cmp(&left.y)
            .then_with(|| left.x.total_cmp(&right.x))
    });

    Some(join_blocks(blocks))
}

/// Text objects in content-stream order, strings decoded byte-wise.
fn block_text(document: &Document, page_id: ObjectId) -> Option<String> {
    let content = Content::decode(&document.get_page_content(page_id).ok()?).ok()?;
    Some(join_blocks(text_blocks(&content.operations, &StringDecoding::Raw)))
}

fn join_blocks(blocks: Vec<TextBlock>) -> String {
    blocks
        .into_iter()
        .map(|block| block.text)
        .filter(|text| !text.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn span_text(document: &Document, page_id: ObjectId) -> Option<String> {
    let mut spans = Vec::new();
    let content = document.get_page_content(page_id).ok()?;
    collect_spans(&content, &mut spans);

    if let Some(resources) = page_resources(document, page_id) {
        let mut visited = HashSet::new();
        collect_form_spans(document, resources, &mut visited, &mut spans, 0);
    }

    Some(spans.join(" "))
}

enum StringDecoding<'a> {
    /// Encoding name per font resource, selected through `Tf`.
    FontAware(BTreeMap<Vec<u8>, &'a str>),
    Raw,
}

#[derive(Debug)]
struct TextBlock {
    x: f32,
    y: f32,
    text: String,
}

fn text_blocks(operations: &[Operation], decoding: &StringDecoding) -> Vec<TextBlock> {
    let mut blocks = Vec::new();
    let mut current: Option<TextBlock> = None;
    let mut font: Option<&[u8]> = None;
    let (mut x, mut y) = (0.0f32, 0.0f32);

    for operation in operations {
        match operation.operator.as_str() {
            "Tf" => {
                font = operation.operands.first().and_then(|name| name.as_name().ok());
            }
            "BT" => {
                if let Some(block) = current.take() {
                    blocks.push(block);
                }
                x = 0.0;
                y = 0.0;
                current = Some(TextBlock {
                    x,
                    y,
                    text: String::new(),
                });
            }
            "ET" => {
                if let Some(block) = current.take() {
                    blocks.push(block);
                }
            }
            "Td" | "TD" => {
                if let [dx, dy] = operation.operands.as_slice() {
                    x += number(dx).unwrap_or(0.0);
                    y += number(dy).unwrap_or(0.0);
                }
                break_line(current.as_mut());
            }
            "Tm" => {
                if let [.., e, f] = operation.operands.as_slice() {
                    x = number(e).unwrap_or(x);
                    y = number(f).unwrap_or(y);
                }
                break_line(current.as_mut());
            }
            "T*" => break_line(current.as_mut()),
            _ => {}
        }

        let shown = match decoding {
            StringDecoding::Raw => shown_text(operation, &decode_pdf_string),
            StringDecoding::FontAware(encodings) => {
                let encoding = font.and_then(|name| encodings.get(name)).copied();
                shown_text(operation, &|bytes: &[u8]| Document::decode_text(encoding, bytes))
            }
        };

        if let (Some(block), Some(shown)) = (current.as_mut(), shown) {
            if block.text.is_empty() {
                block.x = x;
                block.y = y;
            }
            block.text.push_str(&shown);
        }
    }

    if let Some(block) = current {
        blocks.push(block);
    }

    blocks
}

fn break_line(block: Option<&mut TextBlock>) {
    if let Some(block) = block {
        if !block.text.is_empty() && !block.text.ends_with(' ') {
            block.text.push(' ');
        }
    }
}

fn shown_text(operation: &Operation, decode: &dyn Fn(&[u8]) -> String) -> Option<String> {
    match operation.operator.as_str() {
        "Tj" | "'" | "\"" => operation
            .operands
            .last()
            .and_then(string_bytes)
            .map(decode),
        "TJ" => match operation.operands.first() {
            Some(Object::Array(items)) => {
                let mut text = String::new();
                for item in items {
                    if let Some(bytes) = string_bytes(item) {
                        text.push_str(&decode(bytes));
                    } else if number(item).is_some_and(|gap| gap <= WORD_GAP) {
                        text.push(' ');
                    }
                }
                Some(text)
            }
            _ => None,
        },
        _ => None,
    }
}

fn collect_spans(stream: &[u8], spans: &mut Vec<String>) {
    if let Ok(content) = Content::decode(stream) {
        spans.extend(
            content
                .operations
                .iter()
                .filter_map(|operation| shown_text(operation, &decode_pdf_string)),
        );
    }
}

fn collect_form_spans(
    document: &Document,
    resources: &Dictionary,
    visited: &mut HashSet<ObjectId>,
    spans: &mut Vec<String>,
    depth: usize,
) {
    if depth >= MAX_TREE_DEPTH {
        return;
    }

    let Some(xobjects) = resources
        .get(b"XObject")
        .ok()
        .and_then(|object| resolve_dict(document, object))
    else {
        return;
    };

    for (_, reference) in xobjects.iter() {
        let Object::Reference(id) = reference else {
            continue;
        };
        if !visited.insert(*id) {
            continue;
        }
        let Ok(stream) = document.get_object(*id).and_then(Object::as_stream) else {
            continue;
        };

        let is_form = stream
            .dict
            .get(b"Subtype")
            .and_then(Object::as_name)
            .is_ok_and(|subtype| subtype == b"Form");
        if !is_form {
            continue;
        }

        let data = stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone());
        collect_spans(&data, spans);

        if let Some(nested) = stream
            .dict
            .get(b"Resources")
            .ok()
            .and_then(|object| resolve_dict(document, object))
        {
            collect_form_spans(document, nested, visited, spans, depth + 1);
        }
    }
}

fn page_resources(document: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut node = document.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Some(resources) = node
            .get(b"Resources")
            .ok()
            .and_then(|object| resolve_dict(document, object))
        {
            return Some(resources);
        }

        let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = document.get_dictionary(parent).ok()?;
    }

    None
}

fn resolve_dict<'a>(document: &'a Document, object: &'a Object) -> Option<&'a Dictionary> {
    match object {
        Object::Reference(id) => document.get_object(*id).ok()?.as_dict().ok(),
        other => other.as_dict().ok(),
    }
}

fn string_bytes(object: &Object) -> Option<&[u8]> {
    match object {
        Object::String(bytes, _) => Some(bytes.as_slice()),
        _ => None,
    }
}

fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value as f32),
        _ => None,
    }
}

/// UTF-16BE when BOM-prefixed, otherwise one character per byte. Unpaired
/// surrogates are dropped.
fn decode_pdf_string(bytes: &[u8]) -> String {
    match bytes {
        [0xFE, 0xFF, rest @ ..] => {
            let units = rest
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]));
            char::decode_utf16(units).filter_map(|unit| unit.ok()).collect()
        }
        _ => bytes.iter().map(|&byte| char::from(byte)).collect(),
    }
}
