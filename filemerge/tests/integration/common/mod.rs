//! Fixture generators shared by the integration tests.
//!
//! Every fixture is built at test time inside a temporary directory.

#![allow(dead_code)]

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use filemerge::logging::NullSink;
use filemerge::{FileMerger, Settings};

/// Merger that does not log.
pub fn quiet_merger() -> FileMerger {
    FileMerger::with_sink(Settings::default(), Arc::new(NullSink)).unwrap()
}

/// Text drawn on page `page` (1-based) of a fixture labelled `label`.
pub fn page_text(label: &str, page: usize) -> String {
    format!("{label} page {page}")
}

fn build_pdf(label: &str, pages: usize) -> (Document, Vec<ObjectId>) {
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

    let mut page_ids = Vec::with_capacity(pages);
    for page in 1..=pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![72.into(), 700.into()]),
                Operation::new("Tj", vec![Object::string_literal(page_text(label, page))]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        page_ids.push(page_id);
    }

    let kids: Vec<Object> = page_ids.iter().map(|id| (*id).into()).collect();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    (doc, page_ids)
}

/// Write a PDF with `pages` pages, each showing [`page_text`].
pub fn write_pdf(dir: &Path, name: &str, label: &str, pages: usize) -> PathBuf {
    let path = dir.join(name);
    let (mut doc, _) = build_pdf(label, pages);
    doc.save(&path).unwrap();
    path
}

/// Write a PDF whose outline has one "Chapter N" entry per page.
pub fn write_pdf_with_outline(dir: &Path, name: &str, label: &str, pages: usize) -> PathBuf {
    let path = dir.join(name);
    let (mut doc, page_ids) = build_pdf(label, pages);

    let outline_id = doc.new_object_id();
    let item_ids: Vec<ObjectId> = (0..pages).map(|_| doc.new_object_id()).collect();
    for (index, (item_id, page_id)) in item_ids.iter().zip(&page_ids).enumerate() {
        let mut item = dictionary! {
            "Title" => Object::string_literal(format!("Chapter {}", index + 1)),
            "Parent" => outline_id,
            "Dest" => Object::Array(vec![
                Object::Reference(*page_id),
                Object::Name(b"Fit".to_vec()),
            ]),
        };
        if index > 0 {
            item.set("Prev", item_ids[index - 1]);
        }
        if index + 1 < item_ids.len() {
            item.set("Next", item_ids[index + 1]);
        }
        doc.objects.insert(*item_id, Object::Dictionary(item));
    }

    let mut outline = dictionary! {
        "Type" => "Outlines",
        "Count" => pages as i64,
    };
    if let (Some(first), Some(last)) = (item_ids.first(), item_ids.last()) {
        outline.set("First", *first);
        outline.set("Last", *last);
    }
    doc.objects.insert(outline_id, Object::Dictionary(outline));

    let catalog_id = doc.trailer.get(b"Root").unwrap().as_reference().unwrap();
    doc.get_object_mut(catalog_id)
        .unwrap()
        .as_dict_mut()
        .unwrap()
        .set("Outlines", outline_id);

    doc.save(&path).unwrap();
    path
}

/// Write bytes that start like a PDF but do not parse.
pub fn write_corrupted_pdf(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"%PDF-1.4\nthis is not a pdf body\n").unwrap();
    path
}

/// Content text of every page of `path`, in page order.
pub fn page_contents(path: &Path) -> Vec<String> {
    let doc = Document::load(path).unwrap();
    doc.get_pages()
        .values()
        .map(|id| String::from_utf8_lossy(&doc.get_page_content(*id).unwrap()).into_owned())
        .collect()
}

/// Top-level outline of `doc`: title, target page number (1-based) and
/// the titles of the entry's children.
pub fn outline(doc: &Document) -> Vec<(String, u32, Vec<String>)> {
    let pages: Vec<ObjectId> = doc.get_pages().values().copied().collect();

    let catalog = doc.catalog().unwrap();
    let Ok(root_id) = catalog.get(b"Outlines").and_then(Object::as_reference) else {
        return Vec::new();
    };
    let root = doc.get_dictionary(root_id).unwrap();

    siblings(doc, first_child(root))
        .into_iter()
        .map(|item| {
            let children = siblings(doc, first_child(item))
                .into_iter()
                .map(title)
                .collect();
            let target = item.get(b"Dest").unwrap().as_array().unwrap()[0]
                .as_reference()
                .unwrap();
            let page = pages.iter().position(|p| *p == target).unwrap() as u32 + 1;
            (title(item), page, children)
        })
        .collect()
}

fn first_child(item: &Dictionary) -> Option<ObjectId> {
    item.get(b"First").and_then(Object::as_reference).ok()
}

fn siblings(doc: &Document, first: Option<ObjectId>) -> Vec<&Dictionary> {
    let mut items = Vec::new();
    let mut next = first;
    while let Some(id) = next {
        let item = doc.get_dictionary(id).unwrap();
        items.push(item);
        next = item.get(b"Next").and_then(Object::as_reference).ok();
    }
    items
}

fn title(item: &Dictionary) -> String {
    String::from_utf8_lossy(item.get(b"Title").unwrap().as_str().unwrap()).into_owned()
}

/// Write an `.xlsx` workbook with the given sheets and cell values.
pub fn write_workbook(dir: &Path, name: &str, sheets: &[(&str, &[(&str, &str)])]) -> PathBuf {
    let path = dir.join(name);
    let mut book = umya_spreadsheet::new_file_empty_worksheet();
    for (sheet_name, cells) in sheets {
        let sheet = book.new_sheet(*sheet_name).unwrap();
        for (coordinate, value) in cells.iter() {
            sheet.get_cell_mut(*coordinate).set_value(*value);
        }
    }
    umya_spreadsheet::writer::xlsx::write(&book, &path).unwrap();
    path
}

/// Write bytes that look like a ZIP container but are not a workbook.
pub fn write_corrupted_workbook(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"PK\x03\x04 this is not a workbook").unwrap();
    path
}

/// Sheet names of a written workbook, in order.
pub fn sheet_names(path: &Path) -> Vec<String> {
    let book = umya_spreadsheet::reader::xlsx::read(path).unwrap();
    book.get_sheet_collection()
        .iter()
        .map(|sheet| sheet.get_name().to_string())
        .collect()
}

/// Value of `coordinate` on `sheet` of a written workbook.
pub fn cell_value(path: &Path, sheet: &str, coordinate: &str) -> String {
    let book = umya_spreadsheet::reader::xlsx::read(path).unwrap();
    book.get_sheet_by_name(sheet).unwrap().get_value(coordinate)
}

fn push_record(stream: &mut Vec<u8>, typ: u16, data: &[u8]) {
    stream.extend_from_slice(&typ.to_le_bytes());
    stream.extend_from_slice(&(data.len() as u16).to_le_bytes());
    stream.extend_from_slice(data);
}

fn bof(substream: u16) -> Vec<u8> {
    let mut data = vec![0u8; 16];
    data[0..2].copy_from_slice(&0x0600u16.to_le_bytes());
    data[2..4].copy_from_slice(&substream.to_le_bytes());
    data
}

fn cell_header(row: u16, col: u16, xf: u16) -> Vec<u8> {
    [row.to_le_bytes(), col.to_le_bytes(), xf.to_le_bytes()].concat()
}

/// Write a BIFF8 `.xls` workbook with one sheet, `Data`:
///
/// | cell | content                           |
/// |------|-----------------------------------|
/// | A1   | label `name`                      |
/// | A2   | number 10                         |
/// | B2   | formula `A2*2`, cached value 20   |
/// | A3   | date serial 45000 (built-in date) |
pub fn write_xls(dir: &Path, name: &str) -> PathBuf {
    const SHEET: &[u8] = b"Data";

    let mut stream = Vec::new();
    push_record(&mut stream, 0x0809, &bof(0x0005));
    // XF 0 uses the General format, XF 1 the built-in date format 14.
    for format in [0u16, 14] {
        let mut xf = vec![0u8; 20];
        xf[2..4].copy_from_slice(&format.to_le_bytes());
        push_record(&mut stream, 0x00E0, &xf);
    }
    let offset_at = stream.len() + 4;
    let mut boundsheet = vec![0u8; 4];
    boundsheet.extend_from_slice(&[0, 0, SHEET.len() as u8, 0]);
    boundsheet.extend_from_slice(SHEET);
    push_record(&mut stream, 0x0085, &boundsheet);
    push_record(&mut stream, 0x000A, &[]);

    let sheet_start = stream.len() as u32;
    stream[offset_at..offset_at + 4].copy_from_slice(&sheet_start.to_le_bytes());

    push_record(&mut stream, 0x0809, &bof(0x0010));
    let mut dimensions = Vec::new();
    dimensions.extend_from_slice(&0u32.to_le_bytes());
    dimensions.extend_from_slice(&3u32.to_le_bytes());
    dimensions.extend_from_slice(&0u16.to_le_bytes());
    dimensions.extend_from_slice(&2u16.to_le_bytes());
    dimensions.extend_from_slice(&0u16.to_le_bytes());
    push_record(&mut stream, 0x0200, &dimensions);

    let mut label = cell_header(0, 0, 0);
    label.extend_from_slice(&4u16.to_le_bytes());
    label.push(0);
    label.extend_from_slice(b"name");
    push_record(&mut stream, 0x0204, &label);

    let mut number = cell_header(1, 0, 0);
    number.extend_from_slice(&10f64.to_le_bytes());
    push_record(&mut stream, 0x0203, &number);

    let mut formula = cell_header(1, 1, 0);
    formula.extend_from_slice(&20f64.to_le_bytes());
    formula.extend_from_slice(&0u16.to_le_bytes());
    formula.extend_from_slice(&0u32.to_le_bytes());
    // A2 (relative reference), the integer 2, multiply.
    let tokens = [0x24, 1, 0, 0, 0xC0, 0x1E, 2, 0, 0x05];
    formula.extend_from_slice(&(tokens.len() as u16).to_le_bytes());
    formula.extend_from_slice(&tokens);
    push_record(&mut stream, 0x0006, &formula);

    let mut date = cell_header(2, 0, 1);
    date.extend_from_slice(&45000f64.to_le_bytes());
    push_record(&mut stream, 0x0203, &date);
    push_record(&mut stream, 0x000A, &[]);

    let path = dir.join(name);
    let mut container = cfb::create(&path).unwrap();
    container
        .create_stream("/Workbook")
        .unwrap()
        .write_all(&stream)
        .unwrap();
    container.flush().unwrap();
    path
}

/// Write an `.xlsx` workbook whose `Report` sheet carries a percentage
/// format on B1, a formula on B2, a merged range, a wide column A, a tall
/// row 2 and landscape page setup.
pub fn write_formatted_workbook(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    let mut book = umya_spreadsheet::new_file_empty_worksheet();
    let sheet = book.new_sheet("Report").unwrap();

    let rate = sheet.get_cell_mut("B1");
    rate.set_value_number(0.25);
    rate.get_style_mut()
        .get_number_format_mut()
        .set_format_code("0.00%");
    sheet.get_cell_mut("B2").set_formula("B1*2");
    sheet.get_cell_mut("A3").set_value("merged");
    sheet.add_merge_cells("A3:C4");
    sheet.get_column_dimension_mut("A").set_width(42.0);
    sheet.get_row_dimension_mut(&2).set_height(33.0);
    sheet
        .get_page_setup_mut()
        .set_orientation(umya_spreadsheet::OrientationValues::Landscape);

    umya_spreadsheet::writer::xlsx::write(&book, &path).unwrap();
    path
}
