use fontdb::{Database, Family, Query, Stretch, Style, Weight};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;
use ttf_parser::Face;

static FONT_BOOK: Lazy<Mutex<FontBook>> = Lazy::new(|| Mutex::new(FontBook::new()));

/// Width of `text` rendered in the first installed face of `font_family`, or `None`
/// when no face resolves.
pub fn measure_text_width(text: &str, font_size: f32, font_family: &str) -> Option<f32> {
    if text.is_empty() || font_size <= 0.0 {
        return Some(0.0);
    }
    let mut book = FONT_BOOK.lock().ok()?;
    book.face(font_family)?.width(text, font_size)
}

pub fn average_char_width(font_family: &str, font_size: f32) -> Option<f32> {
    if font_size <= 0.0 {
        return None;
    }
    let sample = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
    let width = measure_text_width(sample, font_size, font_family)?;
    Some(width / sample.len() as f32)
}

/// System font database plus the faces already resolved per CSS family list.
struct FontBook {
    db: Database,
    system_loaded: bool,
    faces: HashMap<String, Option<FaceMetrics>>,
}

impl FontBook {
    fn new() -> Self {
        Self {
            db: Database::new(),
            system_loaded: false,
            faces: HashMap::new(),
        }
    }

    fn face(&mut self, font_family: &str) -> Option<&mut FaceMetrics> {
        let key = family_key(font_family);
        if !self.faces.contains_key(&key) {
            let face = self.resolve(font_family);
            debug!(family = %key, found = face.is_some(), "resolved font face");
            self.faces.insert(key.clone(), face);
        }
        self.faces.get_mut(&key)?.as_mut()
    }

    fn resolve(&mut self, font_family: &str) -> Option<FaceMetrics> {
        if !self.system_loaded {
            self.db.load_system_fonts();
            self.system_loaded = true;
        }

        let names = split_families(font_family);
        let families: Vec<Family<'_>> = names.iter().map(CssFamily::as_fontdb).collect();
        let query = Query {
            families: &families,
            weight: Weight::NORMAL,
            stretch: Stretch::Normal,
            style: Style::Normal,
        };
        let id = self.db.query(&query)?;
        self.db
            .with_face_data(id, |data, index| FaceMetrics::parse(data.to_vec(), index))
            .flatten()
    }
}

enum CssFamily {
    Generic(Family<'static>),
    Named(String),
}

impl CssFamily {
    fn as_fontdb(&self) -> Family<'_> {
        match self {
            CssFamily::Generic(family) => *family,
            CssFamily::Named(name) => Family::Name(name.as_str()),
        }
    }
}

fn split_families(font_family: &str) -> Vec<CssFamily> {
    let mut out: Vec<CssFamily> = font_family
        .split(',')
        .map(|part| part.trim().trim_matches('"').trim_matches('\''))
        .filter(|name| !name.is_empty())
        .map(|name| match name.to_ascii_lowercase().as_str() {
            "serif" => CssFamily::Generic(Family::Serif),
            "sans-serif" | "system-ui" | "-apple-system" | "ui-sans-serif" => {
                CssFamily::Generic(Family::SansSerif)
            }
            "monospace" | "ui-monospace" => CssFamily::Generic(Family::Monospace),
            "cursive" => CssFamily::Generic(Family::Cursive),
            "fantasy" => CssFamily::Generic(Family::Fantasy),
            _ => CssFamily::Named(name.to_string()),
        })
        .collect();
    if out.is_empty() {
        out.push(CssFamily::Generic(Family::SansSerif));
    }
    out
}

/// Horizontal advances of one face, in font units.
struct FaceMetrics {
    data: Vec<u8>,
    index: u32,
    units_per_em: f32,
    ascii: [u16; 128],
    others: HashMap<char, Option<u16>>,
}

impl FaceMetrics {
    fn parse(data: Vec<u8>, index: u32) -> Option<Self> {
        let (units_per_em, ascii) = {
            let face = Face::parse(&data, index).ok()?;
            let mut ascii = [0u16; 128];
            for byte in 0u8..128 {
                ascii[byte as usize] = advance_of(&face, byte as char).unwrap_or(0);
            }
            (face.units_per_em().max(1) as f32, ascii)
        };
        Some(Self {
            data,
            index,
            units_per_em,
            ascii,
            others: HashMap::new(),
        })
    }

    fn width(&mut self, text: &str, font_size: f32) -> Option<f32> {
        let scale = font_size / self.units_per_em;
        let missing = font_size * 0.56;
        let mut face: Option<Face<'_>> = None;
        let mut width = 0.0f32;
        for ch in text.chars() {
            let advance = match ch {
                '\n' => continue,
                '\t' => self.ascii[b' ' as usize].saturating_mul(4),
                _ if ch.is_ascii() => self.ascii[ch as usize],
                _ => match self.others.get(&ch) {
                    Some(cached) => cached.unwrap_or(0),
                    None => {
                        if face.is_none() {
                            face = Some(Face::parse(&self.data, self.index).ok()?);
                        }
                        let advance = face.as_ref().and_then(|face| advance_of(face, ch));
                        self.others.insert(ch, advance);
                        advance.unwrap_or(0)
                    }
                },
            };
            if advance == 0 {
                width += missing;
            } else {
                width += advance as f32 * scale;
            }
        }
        Some(width)
    }
}

fn advance_of(face: &Face<'_>, ch: char) -> Option<u16> {
    face.glyph_index(ch)
        .and_then(|glyph| face.glyph_hor_advance(glyph))
}

fn family_key(font_family: &str) -> String {
    let trimmed = font_family.trim();
    if trimmed.is_empty() {
        "sans-serif".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_has_no_width() {
        assert_eq!(measure_text_width("", 16.0, "sans-serif"), Some(0.0));
        assert_eq!(measure_text_width("abc", 0.0, "sans-serif"), Some(0.0));
    }

    #[test]
    fn average_width_needs_positive_size() {
        assert_eq!(average_char_width("sans-serif", 0.0), None);
    }

    #[test]
    fn family_lists_map_generic_names() {
        let families = split_families("\"trebuchet ms\", system-ui, monospace");
        assert!(matches!(&families[0], CssFamily::Named(name) if name == "trebuchet ms"));
        assert!(matches!(families[1], CssFamily::Generic(Family::SansSerif)));
        assert!(matches!(families[2], CssFamily::Generic(Family::Monospace)));
        assert!(matches!(split_families(" , ")[0], CssFamily::Generic(Family::SansSerif)));
    }

    #[test]
    fn measured_width_grows_with_text_when_a_font_exists() {
        // Hosts without fonts fall back elsewhere; nothing to compare then.
        let (Some(short), Some(long)) = (
            measure_text_width("ab", 16.0, "sans-serif"),
            measure_text_width("abcd", 16.0, "sans-serif"),
        ) else {
            return;
        };
        assert!(long > short);
    }
}
