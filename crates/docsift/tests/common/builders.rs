//! In-memory builders for the document formats the pipeline reads.

#![allow(dead_code)]

use std::io::Write;

use lopdf::{dictionary, Document, Object, Stream};
use zip::write::SimpleFileOptions;

/// A PDF with one page per entry, each page showing a single line of text.
pub fn pdf_bytes(pages: &[&str]) -> Vec<u8> {
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
    for line in pages {
        let content = format!("BT\n/F1 12 Tf\n50 742 Td\n({}) Tj\nET\n", line);
        let content_id =
            doc.add_object(Object::Stream(Stream::new(dictionary! {}, content.into_bytes())));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Resources" => resources_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).expect("Failed to serialize PDF");
    buffer
}

/// A minimal DOCX whose body holds one paragraph per entry.
pub fn docx_bytes(paragraphs: &[&str]) -> Vec<u8> {
    let mut body = String::new();
    for paragraph in paragraphs {
        body.push_str(&format!(
            "<w:p><w:r><w:t xml:space=\"preserve\">{}</w:t></w:r></w:p>",
            paragraph
        ));
    }

    let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    zip.start_file("word/document.xml", SimpleFileOptions::default())
        .expect("Failed to start DOCX entry");
    write!(
        zip,
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
        body
    )
    .expect("Failed to write DOCX body");
    zip.finish().expect("Failed to finish DOCX").into_inner()
}

/// Comma-separated rows, one line each.
pub fn csv_bytes(rows: &[&[&str]]) -> Vec<u8> {
    let mut out = String::new();
    for row in rows {
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out.into_bytes()
}

pub const INVOICE_TEXT: &str = "INVOICE\n\
Vendor: Acme Supplies Inc.\n\
Invoice Number: INV-2024-0042\n\
Invoice Date: 2024-03-15\n\
Due Date: 04/14/2024\n\
Subtotal: $1,000.00\n\
Tax: $80.00\n\
Total: $1,080.00\n\
billing@acme.example\n";

pub const CONTRACT_TEXT: &str = "Service Agreement\n\
Effective Date: January 5, 2024\n\
This agreement is governed by the laws of the State of Delaware.\n\
Contact: legal@provider.example and ops@client.example\n";
