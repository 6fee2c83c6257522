use anyhow::{Context, Result};
use chrono::Utc;
use lopdf::{
    content::{Content, Operation},
    dictionary, Document, Object, Stream,
};

// A4 in points.
const PAGE_WIDTH: i64 = 595;
const PAGE_HEIGHT: i64 = 842;
const MARGIN: i64 = 56;
const BODY_SIZE: i64 = 10;
const TITLE_SIZE: i64 = 16;
const LEADING: i64 = 14;
const TITLE_LEADING: i64 = 20;
const WRAP_COLUMNS: usize = 92;
pub const TITLE_COLUMNS: usize = WRAP_COLUMNS * BODY_SIZE as usize / TITLE_SIZE as usize;
const MAX_TITLE_LINES: usize = 3;

/// Word-wrap `text` to `width` characters, keeping paragraph breaks.
/// Words longer than a line are split.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        if paragraph.trim().is_empty() {
            lines.push(String::new());
            continue;
        }
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();
            while word.len() > width {
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
                lines.push(word.drain(..width).collect());
            }
            let word: String = word.into_iter().collect();
            let needed = if current.is_empty() {
                word.chars().count()
            } else {
                current.chars().count() + 1 + word.chars().count()
            };
            if needed > width {
                lines.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(&word);
        }
        if !current.is_empty() {
            lines.push(current);
        }
    }
    lines
}

/// Title wrapped for the larger font, at most three lines; the last one is
/// cut with an ellipsis when the title runs longer.
pub fn wrap_title(title: &str) -> Vec<String> {
    let mut lines = wrap_text(title.trim(), TITLE_COLUMNS);
    lines.retain(|l| !l.is_empty());
    if lines.len() > MAX_TITLE_LINES {
        lines.truncate(MAX_TITLE_LINES);
        if let Some(last) = lines.last_mut() {
            let kept: String = last.chars().take(TITLE_COLUMNS - 3).collect();
            *last = format!("{kept}...");
        }
    }
    lines
}

/// Encode for the standard Type1 fonts (WinAnsi). Unmappable characters become `?`.
fn to_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' => b'\'',
            '\u{201C}' | '\u{201D}' => b'"',
            '\u{2013}' | '\u{2014}' => b'-',
            '\u{2022}' => b'*',
            c if (c as u32) < 0x100 => c as u32 as u8,
            _ => b'?',
        })
        .collect()
}

fn text_line(text: &str) -> Vec<Operation> {
    vec![
        Operation::new("Tj", vec![Object::string_literal(to_win_ansi(text))]),
        Operation::new("T*", vec![]),
    ]
}

/// Render an analysis as a plain A4 PDF.
pub fn render_report(title: &str, body: &str) -> Result<Vec<u8>> {
    let lines_per_page = ((PAGE_HEIGHT - 2 * MARGIN) / LEADING) as usize;
    let title_lines = wrap_title(title);
    // Title rows are taller than body rows.
    let header_height = title_lines.len() as i64 * TITLE_LEADING + 2 * LEADING;
    let header_lines = ((header_height + LEADING - 1) / LEADING) as usize;

    let body_lines = wrap_text(body, WRAP_COLUMNS);
    let mut pages: Vec<&[String]> = Vec::new();
    let first_len = body_lines.len().min(lines_per_page - header_lines);
    pages.push(&body_lines[..first_len]);
    for chunk in body_lines[first_len..].chunks(lines_per_page) {
        pages.push(chunk);
    }

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let bold_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
            "F2" => bold_id,
        },
    });

    let generated = Utc::now().format("%Y-%m-%d %H:%M UTC").to_string();
    let total = pages.len();
    let mut kids: Vec<Object> = Vec::with_capacity(total);

    for (index, lines) in pages.into_iter().enumerate() {
        let mut ops = vec![
            Operation::new("BT", vec![]),
            Operation::new("TL", vec![Object::Integer(LEADING)]),
            Operation::new(
                "Td",
                vec![Object::Integer(MARGIN), Object::Integer(PAGE_HEIGHT - MARGIN)],
            ),
        ];
        if index == 0 {
            ops.push(Operation::new("Tf", vec!["F2".into(), Object::Integer(TITLE_SIZE)]));
            ops.push(Operation::new("TL", vec![Object::Integer(TITLE_LEADING)]));
            for line in &title_lines {
                ops.extend(text_line(line));
            }
            ops.push(Operation::new("TL", vec![Object::Integer(LEADING)]));
            ops.push(Operation::new("Tf", vec!["F1".into(), Object::Integer(BODY_SIZE)]));
            ops.extend(text_line(&format!(
                "Generated {generated} by the ZaHouse Strategist. Not legal advice."
            )));
            ops.extend(text_line(""));
        } else {
            ops.push(Operation::new("Tf", vec!["F1".into(), Object::Integer(BODY_SIZE)]));
        }
        for line in lines {
            ops.extend(text_line(line));
        }
        ops.push(Operation::new("ET", vec![]));

        // Footer
        ops.extend([
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), Object::Integer(8)]),
            Operation::new(
                "Td",
                vec![Object::Integer(PAGE_WIDTH - MARGIN - 60), Object::Integer(MARGIN / 2)],
            ),
            Operation::new(
                "Tj",
                vec![Object::string_literal(format!("Page {} of {}", index + 1, total))],
            ),
            Operation::new("ET", vec![]),
        ]);

        let content = Content { operations: ops };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().context("encoding page content")?,
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let pages_dict = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => total as i64,
        "Resources" => resources_id,
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(PAGE_WIDTH),
            Object::Integer(PAGE_HEIGHT),
        ],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut out = Vec::new();
    doc.save_to(&mut out).context("writing PDF")?;
    Ok(out)
}
