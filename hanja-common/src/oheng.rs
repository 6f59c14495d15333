//! Five-element (Oheng) and yin-yang vocabulary
//!
//! Canonical enums shared by the pipeline, the persistence layer and the
//! read API, plus the two classical derivation rules used as secondary
//! evidence:
//!
//! - **Stroke rule**: last digit of the stroke count
//!   (1-2 wood, 3-4 fire, 5-6 earth, 7-8 metal, 9-0 water)
//! - **Sound rule**: initial consonant of the Hangul reading
//!   (ㄱㄲㅋ wood, ㄴㄷㄸㄹㅌ fire, ㅇㅎ earth, ㅅㅆㅈㅉㅊ metal, ㅁㅂㅃㅍ water)
//!
//! Canonical string forms are the lowercase English names; these are what the
//! batch files and the database store.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Five-element classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Element {
    Wood,
    Fire,
    Earth,
    Metal,
    Water,
}

impl Element {
    /// All elements in generating-cycle order
    pub const ALL: [Element; 5] = [
        Element::Wood,
        Element::Fire,
        Element::Earth,
        Element::Metal,
        Element::Water,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Element::Wood => "wood",
            Element::Fire => "fire",
            Element::Earth => "earth",
            Element::Metal => "metal",
            Element::Water => "water",
        }
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Element {
    type Err = String;

    /// Parses the canonical lowercase form only.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "wood" => Ok(Element::Wood),
            "fire" => Ok(Element::Fire),
            "earth" => Ok(Element::Earth),
            "metal" => Ok(Element::Metal),
            "water" => Ok(Element::Water),
            other => Err(format!("'{}' is not a canonical element", other)),
        }
    }
}

/// Yin-yang polarity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum YinYang {
    Yin,
    Yang,
}

impl YinYang {
    pub fn as_str(&self) -> &'static str {
        match self {
            YinYang::Yin => "yin",
            YinYang::Yang => "yang",
        }
    }
}

impl fmt::Display for YinYang {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for YinYang {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "yin" => Ok(YinYang::Yin),
            "yang" => Ok(YinYang::Yang),
            other => Err(format!("'{}' is not a canonical yin-yang value", other)),
        }
    }
}

/// Valid stroke count range (inclusive)
pub const MIN_STROKES: i64 = 1;
pub const MAX_STROKES: i64 = 50;

/// Element suggested by the stroke count's last digit
pub fn stroke_element(strokes: u32) -> Element {
    match strokes % 10 {
        1 | 2 => Element::Wood,
        3 | 4 => Element::Fire,
        5 | 6 => Element::Earth,
        7 | 8 => Element::Metal,
        _ => Element::Water,
    }
}

/// Polarity implied by stroke parity (odd = yang, even = yin)
pub fn stroke_yin_yang(strokes: u32) -> YinYang {
    if strokes % 2 == 1 {
        YinYang::Yang
    } else {
        YinYang::Yin
    }
}

const HANGUL_SYLLABLE_BASE: u32 = 0xAC00;
const HANGUL_SYLLABLE_LAST: u32 = 0xD7A3;
/// Syllables per initial consonant (21 medials x 28 finals)
const SYLLABLES_PER_INITIAL: u32 = 588;

/// Element suggested by the initial consonant of a Hangul reading
///
/// Returns `None` when the reading does not start with a precomposed Hangul
/// syllable (e.g. romanized readings).
pub fn sound_element(reading: &str) -> Option<Element> {
    let first = reading.trim().chars().next()? as u32;
    if !(HANGUL_SYLLABLE_BASE..=HANGUL_SYLLABLE_LAST).contains(&first) {
        return None;
    }

    let initial = (first - HANGUL_SYLLABLE_BASE) / SYLLABLES_PER_INITIAL;
    let element = match initial {
        // ㄱ ㄲ ㅋ
        0 | 1 | 15 => Element::Wood,
        // ㄴ ㄷ ㄸ ㄹ ㅌ
        2 | 3 | 4 | 5 | 16 => Element::Fire,
        // ㅇ ㅎ
        11 | 18 => Element::Earth,
        // ㅅ ㅆ ㅈ ㅉ ㅊ
        9 | 10 | 12 | 13 | 14 => Element::Metal,
        // ㅁ ㅂ ㅃ ㅍ
        6 | 7 | 8 | 17 => Element::Water,
        _ => return None,
    };
    Some(element)
}

/// CJK ideograph blocks accepted as dictionary characters
const CJK_BLOCKS: &[(u32, u32)] = &[
    (0x4E00, 0x9FFF),   // CJK Unified Ideographs
    (0x3400, 0x4DBF),   // Extension A
    (0x20000, 0x2A6DF), // Extension B
    (0x2A700, 0x2B73F), // Extension C
    (0x2B740, 0x2B81F), // Extension D
    (0x2B820, 0x2CEAF), // Extension E
    (0x2CEB0, 0x2EBEF), // Extension F
    (0x30000, 0x3134F), // Extension G
    (0xF900, 0xFAFF),   // Compatibility Ideographs
    (0x2F800, 0x2FA1F), // Compatibility Ideographs Supplement
];

/// True when `c` falls in one of the CJK ideograph blocks
pub fn is_cjk_ideograph(c: char) -> bool {
    let code = c as u32;
    CJK_BLOCKS
        .iter()
        .any(|(start, end)| (*start..=*end).contains(&code))
}

/// Returns the single CJK ideograph in `s`, or `None` if `s` is not exactly one
pub fn single_cjk_char(s: &str) -> Option<char> {
    let mut chars = s.chars();
    let c = chars.next()?;
    if chars.next().is_some() || !is_cjk_ideograph(c) {
        return None;
    }
    Some(c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_roundtrip_canonical() {
        for element in Element::ALL {
            assert_eq!(element.as_str().parse::<Element>().unwrap(), element);
        }
        assert!("Wood".parse::<Element>().is_err());
    }

    #[test]
    fn test_element_serde_lowercase() {
        let json = serde_json::to_string(&Element::Metal).unwrap();
        assert_eq!(json, "\"metal\"");
        assert!(serde_json::from_str::<Element>("\"xyz\"").is_err());
    }

    #[test]
    fn test_stroke_element_last_digit() {
        assert_eq!(stroke_element(1), Element::Wood);
        assert_eq!(stroke_element(12), Element::Wood);
        assert_eq!(stroke_element(4), Element::Fire);
        assert_eq!(stroke_element(15), Element::Earth);
        assert_eq!(stroke_element(8), Element::Metal);
        assert_eq!(stroke_element(10), Element::Water);
        assert_eq!(stroke_element(19), Element::Water);
    }

    #[test]
    fn test_stroke_yin_yang_parity() {
        assert_eq!(stroke_yin_yang(15), YinYang::Yang);
        assert_eq!(stroke_yin_yang(8), YinYang::Yin);
    }

    #[test]
    fn test_sound_element_initials() {
        assert_eq!(sound_element("가"), Some(Element::Wood));
        assert_eq!(sound_element("금"), Some(Element::Wood));
        assert_eq!(sound_element("화"), Some(Element::Earth));
        assert_eq!(sound_element("현"), Some(Element::Earth));
        assert_eq!(sound_element("수"), Some(Element::Metal));
        assert_eq!(sound_element("목"), Some(Element::Water));
        assert_eq!(sound_element("토"), Some(Element::Fire));
        assert_eq!(sound_element("xian"), None);
        assert_eq!(sound_element(""), None);
    }

    #[test]
    fn test_single_cjk_char() {
        assert_eq!(single_cjk_char("賢"), Some('賢'));
        assert_eq!(single_cjk_char("㐀"), Some('㐀'));
        assert_eq!(single_cjk_char("賢明"), None);
        assert_eq!(single_cjk_char("a"), None);
        assert_eq!(single_cjk_char("현"), None);
        assert_eq!(single_cjk_char(""), None);
    }
}
