//! PDF rendering for receipts and monthly reports
//!
//! Documents are built directly with lopdf using the standard Helvetica
//! fonts, so no font files are needed at runtime.

use crate::errors::Result;
use crate::models::Payment;
use crate::services::reports::MonthlyReport;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};

/// A4 in points
const PAGE_WIDTH: i64 = 595;
const PAGE_HEIGHT: i64 = 842;
const MARGIN: i64 = 56;
const LINE_HEIGHT: i64 = 16;

/// Report rows that fit below the header on one page
const ROWS_PER_PAGE: usize = 40;

/// One line of text at a fixed position
struct TextLine {
    x: i64,
    y: i64,
    size: i64,
    bold: bool,
    text: String,
}

impl TextLine {
    fn new(x: i64, y: i64, size: i64, text: impl Into<String>) -> Self {
        Self {
            x,
            y,
            size,
            bold: false,
            text: text.into(),
        }
    }

    fn bold(mut self) -> Self {
        self.bold = true;
        self
    }
}

/// Render a payment receipt
pub fn render_receipt(payment: &Payment) -> Result<Vec<u8>> {
    let mut lines = vec![
        TextLine::new(MARGIN, PAGE_HEIGHT - MARGIN, 20, "Payment Receipt").bold(),
        TextLine::new(
            MARGIN,
            PAGE_HEIGHT - MARGIN - 28,
            12,
            format!("Receipt No. {}", payment.receipt_number),
        ),
    ];

    let unit = payment.unit_name.as_deref().unwrap_or("-");
    let months = if payment.months.is_empty() {
        "-".to_string()
    } else {
        payment.months.join(", ")
    };

    let fields = [
        ("Date", payment.date.format("%d %B %Y").to_string()),
        ("Tenant", payment.tenant_name.clone()),
        ("Property", payment.property_name.clone()),
        ("Unit", unit.to_string()),
        ("Payment type", payment.payment_type.label().to_string()),
        ("Months covered", months),
        ("Amount paid", format_amount(payment.amount)),
        ("Balance after payment", format_amount(payment.balance_after_payment)),
    ];

    let mut y = PAGE_HEIGHT - MARGIN - 72;
    for (label, value) in fields {
        lines.push(TextLine::new(MARGIN, y, 11, label).bold());
        lines.push(TextLine::new(MARGIN + 170, y, 11, value));
        y -= LINE_HEIGHT + 6;
    }

    lines.push(TextLine::new(MARGIN, MARGIN, 9, "Thank you for your payment."));

    build_document(vec![lines])
}

/// Render a monthly payments report, paginated
pub fn render_report(report: &MonthlyReport) -> Result<Vec<u8>> {
    let columns = [MARGIN, MARGIN + 80, MARGIN + 110, MARGIN + 260, MARGIN + 390];
    let header_y = PAGE_HEIGHT - MARGIN - 60;

    let mut pages = Vec::new();
    let chunks: Vec<&[Payment]> = if report.payments.is_empty() {
        vec![&[]]
    } else {
        report.payments.chunks(ROWS_PER_PAGE).collect()
    };
    let page_count = chunks.len();

    for (index, rows) in chunks.into_iter().enumerate() {
        let mut lines = vec![
            TextLine::new(MARGIN, PAGE_HEIGHT - MARGIN, 18, format!("Payments Report: {}", report.label)).bold(),
            TextLine::new(
                MARGIN,
                PAGE_HEIGHT - MARGIN - 22,
                9,
                format!("Page {} of {}", index + 1, page_count),
            ),
        ];

        for (x, title) in columns.iter().zip(["Date", "No.", "Tenant", "Type", "Amount"]) {
            lines.push(TextLine::new(*x, header_y, 10, title).bold());
        }

        let mut y = header_y - LINE_HEIGHT - 4;
        for payment in rows {
            let cells = [
                payment.date.format("%Y-%m-%d").to_string(),
                payment.receipt_number.to_string(),
                truncate(&payment.tenant_name, 24),
                payment.payment_type.label().to_string(),
                format_amount(payment.amount),
            ];
            for (x, cell) in columns.iter().zip(cells) {
                lines.push(TextLine::new(*x, y, 10, cell));
            }
            y -= LINE_HEIGHT;
        }

        if index + 1 == page_count {
            y -= LINE_HEIGHT;
            if report.payments.is_empty() {
                lines.push(TextLine::new(MARGIN, y, 10, "No payments recorded for this month."));
                y -= LINE_HEIGHT;
            }
            for total in &report.by_type {
                lines.push(TextLine::new(columns[3], y, 10, total.payment_type.label()));
                lines.push(TextLine::new(columns[4], y, 10, format_amount(total.total)));
                y -= LINE_HEIGHT;
            }
            lines.push(TextLine::new(columns[3], y, 11, "Total").bold());
            lines.push(TextLine::new(columns[4], y, 11, format_amount(report.total)).bold());
        }

        pages.push(lines);
    }

    build_document(pages)
}

/// Format an amount with thousands separators and two decimals
pub fn format_amount(amount: f64) -> String {
    let formatted = format!("{:.2}", amount.abs());
    let (whole, fraction) = formatted.split_once('.').unwrap_or((&formatted, "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if amount < 0.0 && formatted != "0.00" { "-" } else { "" };
    format!("{}{}.{}", sign, grouped, fraction)
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(max_chars - 1).collect();
        cut.push('~');
        cut
    }
}

/// Fonts are embedded without an encoding dictionary; non-ASCII is replaced
fn pdf_text(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| if (c as u32) < 0x7f && !c.is_control() { c as u8 } else { b'?' })
        .collect()
}

fn build_document(pages: Vec<Vec<TextLine>>) -> Result<Vec<u8>> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let regular_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let bold_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => regular_id,
            "F2" => bold_id,
        },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for lines in &pages {
        let page_id = add_page(&mut doc, pages_id, lines)?;
        kids.push(page_id.into());
    }

    let page_count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)?;
    Ok(buffer)
}

fn add_page(doc: &mut Document, parent: ObjectId, lines: &[TextLine]) -> Result<ObjectId> {
    let mut operations = Vec::with_capacity(lines.len() * 4);
    for line in lines {
        let font = if line.bold { "F2" } else { "F1" };
        operations.push(Operation::new("BT", vec![]));
        operations.push(Operation::new("Tf", vec![font.into(), line.size.into()]));
        operations.push(Operation::new("Td", vec![line.x.into(), line.y.into()]));
        operations.push(Operation::new(
            "Tj",
            vec![Object::String(pdf_text(&line.text), lopdf::StringFormat::Literal)],
        ));
        operations.push(Operation::new("ET", vec![]));
    }

    let content = Content { operations };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));

    Ok(doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => parent,
        "Contents" => content_id,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PaymentType;
    use crate::services::reports::TypeTotal;
    use chrono::{NaiveDate, Utc};

    fn payment(receipt_number: u64, amount: f64) -> Payment {
        Payment {
            id: format!("pay{}", receipt_number),
            user_id: "u1".into(),
            tenant_id: "t1".into(),
            property_id: "p1".into(),
            unit_name: Some("A1".into()),
            amount,
            payment_type: PaymentType::Rent,
            date: NaiveDate::from_ymd_opt(2025, 3, 2).unwrap(),
            months: vec!["March 2025".into()],
            receipt_number,
            balance_after_payment: 300000.0,
            tenant_name: "Jane Namata".into(),
            property_name: "Acme Apartments".into(),
            idempotency_key: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(200000.0), "200,000.00");
        assert_eq!(format_amount(999.5), "999.50");
        assert_eq!(format_amount(-1234567.0), "-1,234,567.00");
        assert_eq!(format_amount(0.0), "0.00");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Jane", 10), "Jane");
        assert_eq!(truncate("Bartholomew Kiwanuka", 8), "Barthol~");
    }

    #[test]
    fn test_pdf_text_replaces_unsupported_chars() {
        assert_eq!(pdf_text("Café (A1)"), b"Caf? (A1)".to_vec());
    }

    #[test]
    fn test_render_receipt() {
        let bytes = render_receipt(&payment(1, 200000.0)).unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));

        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn test_render_report_paginates() {
        let payments: Vec<Payment> = (1..=(ROWS_PER_PAGE as u64 + 5)).map(|n| payment(n, 1000.0)).collect();
        let total = payments.iter().map(|p| p.amount).sum();
        let report = MonthlyReport {
            year: 2025,
            month: 3,
            label: "March 2025".into(),
            by_type: vec![TypeTotal {
                payment_type: PaymentType::Rent,
                count: payments.len(),
                total,
            }],
            total,
            payments,
        };

        let bytes = render_report(&report).unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 2);
    }

    #[test]
    fn test_render_empty_report() {
        let report = MonthlyReport {
            year: 2025,
            month: 2,
            label: "February 2025".into(),
            payments: Vec::new(),
            by_type: Vec::new(),
            total: 0.0,
        };
        let doc = Document::load_mem(&render_report(&report).unwrap()).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }
}
