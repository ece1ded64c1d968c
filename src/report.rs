use chrono::{DateTime, Utc};
use printpdf::path::{PaintMode, WindingOrder};
use printpdf::{
    BuiltinFont, Color, CustomPdfConformance, IndirectFontRef, Mm, PdfConformance, PdfDocument,
    PdfLayerReference, Point, Polygon, Rgb,
};
use time::OffsetDateTime;

use crate::models::{Assessment, Report};

pub const REPORT_TITLE: &str = "SSL Labs Assessment Report";

pub const COLUMNS: [&str; 7] = [
    "IP Address",
    "Server Name",
    "Status Message",
    "Grade",
    "Grade Trust Ignored",
    "Has Warnings",
    "Is Exceptional",
];

const COLUMN_WIDTHS_MM: [f32; 7] = [40.0, 35.0, 40.0, 15.0, 20.0, 20.0, 20.0];

const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;
const MARGIN_MM: f32 = 10.0;
const HEADER_ROW_MM: f32 = 7.0;
const DATA_ROW_MM: f32 = 6.0;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// Reaching the renderer with zero endpoints is an internal-consistency
    /// defect; the client and normalizer both forbid it.
    #[error("refusing to render report for {host}: assessment has no endpoints")]
    NoEndpoints { host: String },
    #[error("PDF serialization failed: {0}")]
    Pdf(String),
}

/// Deterministic layout of the report: three heading lines, one header row,
/// one data row per endpoint in assessment order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportLayout {
    pub title: String,
    pub host_line: String,
    pub generated_line: String,
    pub header: [&'static str; 7],
    pub rows: Vec<[String; 7]>,
}

pub fn layout(
    assessment: &Assessment,
    generated_at: DateTime<Utc>,
) -> Result<ReportLayout, RenderError> {
    if assessment.endpoints.is_empty() {
        return Err(RenderError::NoEndpoints {
            host: assessment.host.clone(),
        });
    }
    Ok(ReportLayout {
        title: REPORT_TITLE.to_string(),
        host_line: format!("Host: {}", assessment.host),
        generated_line: format!("Generated: {}", generated_at.format("%Y-%m-%d %H:%M:%S")),
        header: COLUMNS,
        rows: assessment
            .endpoints
            .iter()
            .map(|ep| {
                [
                    ep.ip_address.clone(),
                    ep.server_name.clone(),
                    ep.status_message.clone(),
                    ep.grade.clone(),
                    ep.grade_trust_ignored.clone(),
                    ep.has_warnings.to_string(),
                    ep.is_exceptional.to_string(),
                ]
            })
            .collect(),
    })
}

/// Renders a terminal READY assessment into a PDF report.
///
/// Pure apart from `generated_at`: identical inputs produce byte-identical
/// documents, because the PDF creation and modification dates are pinned to
/// the generation timestamp.
pub fn render(assessment: &Assessment, generated_at: DateTime<Utc>) -> Result<Report, RenderError> {
    let layout = layout(assessment, generated_at)?;
    let bytes = write_pdf(&layout, &assessment.host, generated_at)?;
    Ok(Report {
        host: assessment.host.clone(),
        generated_at,
        identifier: report_identifier(&assessment.host),
        bytes,
    })
}

/// Document name for a host's report. Lowercased, with anything outside
/// `[a-z0-9.-]` replaced by `_`; repeated assessments of the same host
/// overwrite the previous document so its URL stays stable.
pub fn report_identifier(host: &str) -> String {
    let sanitized: String = host
        .trim()
        .to_ascii_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("ssl_report_{sanitized}.pdf")
}

fn write_pdf(
    layout: &ReportLayout,
    host: &str,
    generated_at: DateTime<Utc>,
) -> Result<Vec<u8>, RenderError> {
    let (doc, first_page, first_layer) = PdfDocument::new(
        layout.title.as_str(),
        Mm(PAGE_WIDTH_MM),
        Mm(PAGE_HEIGHT_MM),
        "report",
    );
    let seed = format!("{host}:{}", generated_at.timestamp());
    let pinned = OffsetDateTime::from_unix_timestamp(generated_at.timestamp())
        .unwrap_or(OffsetDateTime::UNIX_EPOCH);
    let doc = doc
        .with_conformance(PdfConformance::Custom(CustomPdfConformance {
            requires_icc_profile: false,
            requires_xmp_metadata: false,
            ..Default::default()
        }))
        .with_document_id(format!("sslpulse:{seed}"))
        .with_creation_date(pinned)
        .with_mod_date(pinned);

    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| RenderError::Pdf(e.to_string()))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| RenderError::Pdf(e.to_string()))?;

    let mut layer = doc.get_page(first_page).get_layer(first_layer);
    prepare_layer(&layer);

    let mut y = PAGE_HEIGHT_MM - MARGIN_MM - 6.0;
    layer.use_text(layout.title.as_str(), 16.0, Mm(MARGIN_MM), Mm(y), &bold);
    y -= 14.0;
    layer.use_text(layout.host_line.as_str(), 12.0, Mm(MARGIN_MM), Mm(y), &font);
    y -= 8.0;
    layer.use_text(layout.generated_line.as_str(), 10.0, Mm(MARGIN_MM), Mm(y), &font);
    y -= 12.0;

    header_row(&layer, &bold, layout, y);
    y -= HEADER_ROW_MM;

    for row in &layout.rows {
        if y - DATA_ROW_MM < MARGIN_MM {
            let (page, page_layer) = doc.add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "report");
            layer = doc.get_page(page).get_layer(page_layer);
            prepare_layer(&layer);
            y = PAGE_HEIGHT_MM - MARGIN_MM;
            header_row(&layer, &bold, layout, y);
            y -= HEADER_ROW_MM;
        }
        let mut x = MARGIN_MM;
        for (text, width) in row.iter().zip(COLUMN_WIDTHS_MM) {
            cell(&layer, &font, text, x, y, width, DATA_ROW_MM, 8.5, false);
            x += width;
        }
        y -= DATA_ROW_MM;
    }

    let mut bytes = doc
        .save_to_bytes()
        .map_err(|e| RenderError::Pdf(e.to_string()))?;
    pin_trailer_ids(&mut bytes, &seed);
    Ok(bytes)
}

/// The PDF library regenerates the trailer `/ID` pair with random hex on
/// every save, which would make byte-identical inputs produce different
/// documents. The trailer is written in clear text at the end of the file,
/// so overwrite both hex strings in place (same length, so no offsets move)
/// with values derived from the seed.
fn pin_trailer_ids(bytes: &mut [u8], seed: &str) {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let Some(id_pos) = rfind(bytes, b"/ID") else {
        return;
    };
    let mut state = fnv1a(seed.as_bytes());
    let mut inside_hex_string = false;
    for byte in &mut bytes[id_pos..] {
        match *byte {
            b']' => break,
            b'<' => inside_hex_string = true,
            b'>' => inside_hex_string = false,
            _ if inside_hex_string => {
                state = state
                    .wrapping_mul(6364136223846793005)
                    .wrapping_add(1442695040888963407);
                *byte = HEX[(state >> 60) as usize];
            }
            _ => {}
        }
    }
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .rposition(|window| window == needle)
}

fn fnv1a(data: &[u8]) -> u64 {
    let mut hash = 0xcbf2_9ce4_8422_2325u64;
    for &byte in data {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

fn prepare_layer(layer: &PdfLayerReference) {
    layer.set_outline_color(Color::Rgb(Rgb::new(0.0, 0.0, 0.0, None)));
    layer.set_outline_thickness(0.85);
}

fn header_row(layer: &PdfLayerReference, font: &IndirectFontRef, layout: &ReportLayout, y: f32) {
    let mut x = MARGIN_MM;
    for (text, width) in layout.header.iter().zip(COLUMN_WIDTHS_MM) {
        cell(layer, font, text, x, y, width, HEADER_ROW_MM, 9.0, true);
        x += width;
    }
}

fn cell(
    layer: &PdfLayerReference,
    font: &IndirectFontRef,
    text: &str,
    x: f32,
    y_top: f32,
    width: f32,
    height: f32,
    font_size: f32,
    shaded: bool,
) {
    let outline = vec![
        (Point::new(Mm(x), Mm(y_top)), false),
        (Point::new(Mm(x + width), Mm(y_top)), false),
        (Point::new(Mm(x + width), Mm(y_top - height)), false),
        (Point::new(Mm(x), Mm(y_top - height)), false),
    ];
    let mode = if shaded {
        layer.set_fill_color(Color::Rgb(Rgb::new(0.94, 0.94, 0.94, None)));
        PaintMode::FillStroke
    } else {
        PaintMode::Stroke
    };
    layer.add_polygon(Polygon {
        rings: vec![outline],
        mode,
        winding_order: WindingOrder::NonZero,
    });
    layer.use_text(text, font_size, Mm(x + 1.5), Mm(y_top - height + 1.8), font);
}
