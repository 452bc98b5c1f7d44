//! Small PDF builders and inspectors for tests.

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};

/// A PDF with one page per marker; each page shows its marker as text.
///
/// Resources and MediaBox live on the page tree root, so pages inherit them.
pub fn pdf_with_pages(markers: &[&str]) -> Vec<u8> {
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

    let mut kids = Vec::new();
    for marker in markers {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*marker)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("encode content"),
        ));
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

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("serialize pdf");
    bytes
}

/// Marker text of every page, in page order.
pub fn page_markers(pdf: &[u8]) -> Vec<String> {
    let doc = Document::load_mem(pdf).expect("load pdf");
    let mut markers = Vec::new();

    for page_id in doc.get_pages().into_values() {
        let raw = doc.get_page_content(page_id).expect("page content");
        let content = Content::decode(&raw).expect("decode content");
        for op in content.operations.iter().filter(|op| op.operator == "Tj") {
            if let Some(Ok(text)) = op.operands.first().map(Object::as_str) {
                markers.push(String::from_utf8_lossy(text).into_owned());
            }
        }
    }

    markers
}
