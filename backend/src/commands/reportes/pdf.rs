use crate::error::{FecanboError, FecanboResult};
use printpdf::*;
use std::io::BufWriter;

const PAGE_W: f32 = 210.0;
const PAGE_H: f32 = 297.0;
const MARGIN_X: f32 = 20.0;
const TOP_Y: f32 = 275.0;
const BOTTOM_Y: f32 = 20.0;
const LINE_H: f32 = 5.5;
const BODY_SIZE: f32 = 10.0;
const MAX_CHARS: usize = 95;

/// Plain ASCII for download file names: accents are folded to their base
/// letter and anything else becomes `?`.
pub fn fold_ascii(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            'á' | 'à' | 'ä' | 'â' => 'a',
            'é' | 'è' | 'ë' | 'ê' => 'e',
            'í' | 'ì' | 'ï' | 'î' => 'i',
            'ó' | 'ò' | 'ö' | 'ô' => 'o',
            'ú' | 'ù' | 'ü' | 'û' => 'u',
            'Á' | 'À' | 'Ä' | 'Â' => 'A',
            'É' | 'È' | 'Ë' | 'Ê' => 'E',
            'Í' | 'Ì' | 'Ï' | 'Î' => 'I',
            'Ó' | 'Ò' | 'Ö' | 'Ô' => 'O',
            'Ú' | 'Ù' | 'Ü' | 'Û' => 'U',
            'ñ' => 'n',
            'Ñ' => 'N',
            'º' | '°' => 'o',
            c if c.is_ascii() => c,
            _ => '?',
        })
        .collect()
}

/// Built-in fonts are written with WinAnsiEncoding, which silently drops
/// characters it has no code for. Latin-1 text is kept as is, common
/// typographic punctuation is mapped to ASCII and the rest becomes `?`.
pub fn to_win_ansi(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{2013}' | '\u{2014}' => '-',
            '\u{201C}' | '\u{201D}' => '"',
            '\u{2018}' | '\u{2019}' => '\'',
            c if c.is_ascii() || ('\u{A0}'..='\u{FF}').contains(&c) => c,
            _ => '?',
        })
        .collect()
}

/// Greedy word wrap at `width` characters.
pub fn wrap_line(line: &str, width: usize) -> Vec<String> {
    if line.chars().count() <= width {
        return vec![line.to_string()];
    }
    let mut out = Vec::new();
    let mut current = String::new();
    for word in line.split_whitespace() {
        let needed = current.chars().count() + word.chars().count() + usize::from(!current.is_empty());
        if needed > width && !current.is_empty() {
            out.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

fn pdf_err(e: impl std::fmt::Display) -> FecanboError {
    FecanboError::Internal(format!("No se pudo generar el PDF: {}", e))
}

/// Renders the plain-text document on A4 pages. The first two lines (header
/// and title) are set in bold.
pub fn render_pdf(titulo: &str, texto: &str) -> FecanboResult<Vec<u8>> {
    let (doc, page1, layer1) =
        PdfDocument::new(to_win_ansi(titulo), Mm(PAGE_W), Mm(PAGE_H), "Layer 1");
    let font = doc.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_err)?;
    let bold = doc.add_builtin_font(BuiltinFont::HelveticaBold).map_err(pdf_err)?;

    let mut layer = doc.get_page(page1).get_layer(layer1);
    let mut y = TOP_Y;

    for (idx, raw) in texto.lines().enumerate() {
        let (size, face) = match idx {
            0 => (15.0, &bold),
            1 => (12.0, &bold),
            _ => (BODY_SIZE, &font),
        };
        for line in wrap_line(&to_win_ansi(raw), MAX_CHARS) {
            if y < BOTTOM_Y {
                let (page, next_layer) = doc.add_page(Mm(PAGE_W), Mm(PAGE_H), "Continued");
                layer = doc.get_page(page).get_layer(next_layer);
                y = TOP_Y;
            }
            if line.starts_with("====") {
                let rule = Line::from_iter(
                    std::iter::once((Point::new(Mm(MARGIN_X), Mm(y + 1.5)), false)).chain(
                        std::iter::once((Point::new(Mm(PAGE_W - MARGIN_X), Mm(y + 1.5)), false)),
                    ),
                );
                layer.set_outline_thickness(0.5);
                layer.add_line(rule);
            } else if !line.is_empty() {
                layer.use_text(line, size, Mm(MARGIN_X), Mm(y), face);
            }
            y -= if idx == 0 { LINE_H + 2.0 } else { LINE_H };
        }
    }

    let mut writer = BufWriter::new(Vec::new());
    doc.save(&mut writer).map_err(pdf_err)?;
    writer.into_inner().map_err(pdf_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_ascii() {
        assert_eq!(
            fold_ascii("Federación Cannábica Bonaerense - Añejo Ü"),
            "Federacion Cannabica Bonaerense - Anejo U"
        );
        assert_eq!(fold_ascii("Dosis: 2 gotas → noche"), "Dosis: 2 gotas ? noche");
    }

    #[test]
    fn test_pdf_text_keeps_latin1_accents() {
        assert_eq!(
            to_win_ansi("Federación Cannábica Bonaerense – Añejo Ü, 25°"),
            "Federación Cannábica Bonaerense - Añejo Ü, 25°"
        );
        assert_eq!(to_win_ansi("“Floración” → curado"), "\"Floración\" ? curado");
    }

    #[test]
    fn test_wrap_line() {
        assert_eq!(wrap_line("corto", 10), vec!["corto"]);
        assert_eq!(
            wrap_line("riego diario con agua declorada", 12),
            vec!["riego diario", "con agua", "declorada"]
        );
    }

    #[test]
    fn test_render_produces_pdf_bytes() {
        let texto = "FECANBO\nReporte\n\n========\nNombre: Carpa Norte\n".repeat(40);
        let bytes = render_pdf("Reporte de Cultivo Medicinal", &texto).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        assert!(bytes.len() > 500);
    }
}
