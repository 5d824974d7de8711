//! Registrant Artifacts
//!
//! QR pass and PDF receipt, one of each per registrant, written to
//! deterministic paths keyed by the registrant identifier. Regeneration
//! overwrites in place, so both generators are idempotent and fire-and-forget
//! from the caller's side; nothing here reads its own output back.

use anyhow::{Context, Result};
use chrono::DateTime;
use image::Luma;
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfLayerReference};
use qrcode::QrCode;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::store::Registrant;

const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;
const QR_SIZE_PX: u32 = 320;

pub struct ArtifactStore {
    qr_dir: PathBuf,
    pdf_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: &Path) -> Result<Self> {
        let qr_dir = root.join("qr");
        let pdf_dir = root.join("pdf");
        std::fs::create_dir_all(&qr_dir).context("creating QR directory")?;
        std::fs::create_dir_all(&pdf_dir).context("creating PDF directory")?;
        Ok(Self { qr_dir, pdf_dir })
    }

    pub fn qr_path(&self, uid: &str) -> PathBuf {
        self.qr_dir.join(format!("{uid}.png"))
    }

    pub fn pdf_path(&self, uid: &str) -> PathBuf {
        self.pdf_dir.join(format!("{uid}.pdf"))
    }

    /// Write the QR pass. The payload is exactly the registrant identifier;
    /// the verification endpoint resolves everything else.
    pub fn write_qr(&self, uid: &str) -> Result<PathBuf> {
        let code = QrCode::new(uid.as_bytes()).context("encoding QR payload")?;
        let img = code
            .render::<Luma<u8>>()
            .min_dimensions(QR_SIZE_PX, QR_SIZE_PX)
            .build();
        let path = self.qr_path(uid);
        img.save(&path)
            .with_context(|| format!("writing QR image to {path:?}"))?;
        Ok(path)
    }

    /// Write the fixed-layout PDF receipt.
    pub fn write_receipt(&self, reg: &Registrant) -> Result<PathBuf> {
        let path = self.pdf_path(&reg.uid);
        let bytes = render_receipt(reg)?;
        std::fs::write(&path, bytes)
            .with_context(|| format!("writing receipt to {path:?}"))?;
        Ok(path)
    }
}

/// Render the receipt for one registrant into PDF bytes.
pub fn render_receipt(reg: &Registrant) -> Result<Vec<u8>> {
    let (doc, page, layer) = PdfDocument::new(
        "Event Registration Receipt",
        Mm(PAGE_WIDTH_MM),
        Mm(PAGE_HEIGHT_MM),
        "receipt",
    );
    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .context("loading receipt font")?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .context("loading receipt font")?;

    let layer = doc.get_page(page).get_layer(layer);
    layer.use_text("Event Registration Receipt", 16.0, Mm(60.0), Mm(275.0), &bold);

    let issued = DateTime::from_timestamp(reg.created_at, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| "N/A".to_string());
    let lines = [
        format!("Issued: {issued}"),
        format!("Name: {}", reg.name),
        format!("Email: {}", reg.email),
        format!("Semester: {}", reg.semester),
        format!("Party size: {}", reg.party_size),
        format!("Total paid: Rs {}", reg.amount()),
        format!("Unique ID: {}", reg.uid),
        format!("UPI ref: {}", reg.upi_ref.as_deref().unwrap_or("N/A")),
        format!("Payment ID: {}", reg.payment_id.as_deref().unwrap_or("N/A")),
    ];
    let mut y = 255.0;
    for line in &lines {
        layer.use_text(line.as_str(), 12.0, Mm(35.0), Mm(y), &font);
        y -= 8.0;
    }
    layer.use_text(
        format!("Status: {}", reg.payment_status.as_str()),
        12.0,
        Mm(35.0),
        Mm(y - 4.0),
        &bold,
    );

    save_to_bytes(doc)
}

/// Render the admin report: a snapshot table of every registrant with a
/// totals row, paginated when it outgrows one page.
pub fn render_report(rows: &[Registrant]) -> Result<Vec<u8>> {
    let (doc, page, layer) = PdfDocument::new(
        "Registrations Report",
        Mm(PAGE_WIDTH_MM),
        Mm(PAGE_HEIGHT_MM),
        "report",
    );
    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .context("loading report font")?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .context("loading report font")?;

    let mut layer = doc.get_page(page).get_layer(layer);
    layer.use_text("Registrations Report", 16.0, Mm(70.0), Mm(280.0), &bold);
    write_report_header(&layer, &bold, 268.0);

    let mut y = 260.0;
    let mut total_collected: u64 = 0;
    let mut total_dependents: u64 = 0;
    for reg in rows {
        if y < 25.0 {
            let (next_page, next_layer) =
                doc.add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "report");
            layer = doc.get_page(next_page).get_layer(next_layer);
            write_report_header(&layer, &bold, 280.0);
            y = 272.0;
        }
        write_report_row(&layer, &font, y, reg);
        y -= 7.0;
        total_dependents += u64::from(reg.party_size);
        if reg.payment_status == crate::store::PaymentStatus::Paid && !reg.refunded {
            total_collected += reg.amount();
        }
    }

    layer.use_text(
        format!(
            "Total dependents: {total_dependents}    Total collected: Rs {total_collected}"
        ),
        12.0,
        Mm(15.0),
        Mm((y - 6.0).max(12.0)),
        &bold,
    );

    save_to_bytes(doc)
}

fn write_report_header(layer: &PdfLayerReference, bold: &IndirectFontRef, y: f32) {
    layer.use_text("Unique ID", 10.0, Mm(15.0), Mm(y), bold);
    layer.use_text("Name", 10.0, Mm(62.0), Mm(y), bold);
    layer.use_text("Sem", 10.0, Mm(105.0), Mm(y), bold);
    layer.use_text("Party", 10.0, Mm(120.0), Mm(y), bold);
    layer.use_text("Status", 10.0, Mm(140.0), Mm(y), bold);
    layer.use_text("Amount", 10.0, Mm(170.0), Mm(y), bold);
}

fn write_report_row(layer: &PdfLayerReference, font: &IndirectFontRef, y: f32, reg: &Registrant) {
    layer.use_text(reg.uid.as_str(), 10.0, Mm(15.0), Mm(y), font);
    layer.use_text(reg.name.as_str(), 10.0, Mm(62.0), Mm(y), font);
    layer.use_text(reg.semester.to_string(), 10.0, Mm(105.0), Mm(y), font);
    layer.use_text(reg.party_size.to_string(), 10.0, Mm(120.0), Mm(y), font);
    layer.use_text(reg.payment_status.as_str(), 10.0, Mm(140.0), Mm(y), font);
    layer.use_text(format!("Rs {}", reg.amount()), 10.0, Mm(170.0), Mm(y), font);
}

fn save_to_bytes(doc: printpdf::PdfDocumentReference) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    doc.save(&mut BufWriter::new(&mut bytes))
        .context("serializing PDF")?;
    Ok(bytes)
}
