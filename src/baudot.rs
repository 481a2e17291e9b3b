//! ITA2 / US-TTY Baudot encoding.
//!
//! Letters occupy codes 0..=25 in letters mode. Figures mode reuses the same
//! 5-bit space for digits and punctuation, so the encoder keeps track of the
//! current shift and only emits `FIGS` / `LTRS` when the mode changes.
//! Codes 26..=33 are the control characters and the two line test patterns.

pub const LETTER_A: u8 = 0;
pub const LETTER_Z: u8 = 25;
pub const NULL: u8 = 26;
pub const LF: u8 = 27;
pub const SPACE: u8 = 28;
pub const CR: u8 = 29;
/// Shift up into figures mode.
pub const FIGS: u8 = 30;
/// Shift down into letters mode.
pub const LTRS: u8 = 31;
/// Steady space, line open.
pub const OPEN: u8 = 32;
/// Steady mark, line closed.
pub const CLOSED: u8 = 33;

/// Figures-mode codes for the digits 0-9.
pub const DIGITS: [u8; 10] = [15, 16, 22, 4, 17, 19, 24, 20, 8, 14];

pub const DASH: u8 = 0;
pub const QUESTION: u8 = 1;
pub const COLON: u8 = 2;
pub const DOLLAR: u8 = 3;
pub const BELL: u8 = 6;
pub const APOSTROPHE: u8 = 9;
pub const LEFT_PAREN: u8 = 10;
pub const RIGHT_PAREN: u8 = 11;
pub const PERIOD: u8 = 12;
pub const COMMA: u8 = 13;
pub const SEMICOLON: u8 = 21;
pub const SOLIDUS: u8 = 23;
pub const QUOTE: u8 = 25;

/// Bits on the wire per character: one start bit, five data bits, two stop bits.
pub const BITS_PER_CHARACTER: usize = 8;

const FRAMES: [[u8; BITS_PER_CHARACTER]; 34] = [
    [0, 1, 1, 0, 0, 0, 1, 1], // A
    [0, 1, 0, 0, 1, 1, 1, 1], // B
    [0, 0, 1, 1, 1, 0, 1, 1], // C
    [0, 1, 0, 0, 1, 0, 1, 1], // D
    [0, 1, 0, 0, 0, 0, 1, 1], // E / 3
    [0, 1, 0, 1, 1, 0, 1, 1], // F
    [0, 0, 1, 0, 1, 1, 1, 1], // G
    [0, 0, 0, 1, 0, 1, 1, 1], // H
    [0, 0, 1, 1, 0, 0, 1, 1], // I / 8
    [0, 1, 1, 0, 1, 0, 1, 1], // J
    [0, 1, 1, 1, 1, 0, 1, 1], // K
    [0, 0, 1, 0, 0, 1, 1, 1], // L
    [0, 0, 0, 1, 1, 1, 1, 1], // M / .
    [0, 0, 0, 1, 1, 0, 1, 1], // N
    [0, 0, 0, 0, 1, 1, 1, 1], // O / 9
    [0, 0, 1, 1, 0, 1, 1, 1], // P / 0
    [0, 1, 1, 1, 0, 1, 1, 1], // Q / 1
    [0, 0, 1, 0, 1, 0, 1, 1], // R / 4
    [0, 1, 0, 1, 0, 0, 1, 1], // S
    [0, 0, 0, 0, 0, 1, 1, 1], // T / 5
    [0, 1, 1, 1, 0, 0, 1, 1], // U / 7
    [0, 0, 1, 1, 1, 1, 1, 1], // V
    [0, 1, 1, 0, 0, 1, 1, 1], // W / 2
    [0, 1, 0, 1, 1, 1, 1, 1], // X / /
    [0, 1, 0, 1, 0, 1, 1, 1], // Y / 6
    [0, 1, 0, 0, 0, 1, 1, 1], // Z
    [0, 0, 0, 0, 0, 0, 1, 1], // NULL
    [0, 0, 1, 0, 0, 0, 1, 1], // LF
    [0, 0, 0, 1, 0, 0, 1, 1], // SPACE
    [0, 0, 0, 0, 1, 0, 1, 1], // CR
    [0, 1, 1, 0, 1, 1, 1, 1], // FIGS
    [0, 1, 1, 1, 1, 1, 1, 1], // LTRS
    [0, 0, 0, 0, 0, 0, 0, 0], // OPEN
    [1, 1, 1, 1, 1, 1, 1, 1], // CLOSED
];

/// Start, data and stop bits for `code`, `true` being mark.
/// Returns `None` for values outside the code table.
pub fn frame_bits(code: u8) -> Option<[bool; BITS_PER_CHARACTER]> {
    FRAMES
        .get(code as usize)
        .map(|frame| frame.map(|bit| bit == 1))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Shift {
    #[default]
    Letters,
    Figures,
}

fn punctuation(c: char) -> Option<u8> {
    let code = match c {
        '-' => DASH,
        '?' => QUESTION,
        ':' => COLON,
        '$' => DOLLAR,
        '\u{7}' => BELL,
        '\'' | '`' => APOSTROPHE,
        '(' => LEFT_PAREN,
        ')' => RIGHT_PAREN,
        '.' => PERIOD,
        ',' => COMMA,
        ';' => SEMICOLON,
        '/' => SOLIDUS,
        '"' => QUOTE,
        _ => return None,
    };
    Some(code)
}

/// Encodes one character, emitting a shift code first when the character
/// lives in the other mode. Characters with no Baudot equivalent become `NULL`.
pub fn encode(c: char, shift: &mut Shift) -> Vec<u8> {
    let mut codes = Vec::with_capacity(2);

    if let Some(code) = punctuation(c) {
        if *shift == Shift::Letters {
            codes.push(FIGS);
            *shift = Shift::Figures;
        }
        codes.push(code);
        return codes;
    }

    match c {
        ' ' => codes.push(SPACE),
        '\n' => codes.extend_from_slice(&[CR, LF]),
        '0'..='9' => {
            if *shift == Shift::Letters {
                codes.push(FIGS);
                *shift = Shift::Figures;
            }
            codes.push(DIGITS[c as usize - '0' as usize]);
        }
        'a'..='z' | 'A'..='Z' => {
            if *shift == Shift::Figures {
                codes.push(LTRS);
                *shift = Shift::Letters;
            }
            codes.push(c.to_ascii_uppercase() as u8 - b'A');
        }
        // Raw codes pass straight through.
        c if (NULL as u32..=CLOSED as u32).contains(&(c as u32)) => codes.push(c as u8),
        _ => codes.push(NULL),
    }

    codes
}

/// Characters that occupy a column on the printer.
pub fn is_printable(c: char) -> bool {
    c.is_ascii_graphic() || c.is_ascii_whitespace()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoded {
    pub codes: Vec<u8>,
    /// The column limit was reached and `CR LF CR` was appended.
    pub line_wrapped: bool,
}

/// Codec state carried across a whole transmission: the current shift and
/// the printer column, which forces a line wrap at `column_limit`.
#[derive(Debug, Clone)]
pub struct BaudotEncoder {
    shift: Shift,
    column: usize,
    column_limit: usize,
}

impl BaudotEncoder {
    pub fn new(column_limit: usize) -> Self {
        Self {
            shift: Shift::Letters,
            column: 0,
            column_limit,
        }
    }

    pub fn shift(&self) -> Shift {
        self.shift
    }

    pub fn column(&self) -> usize {
        self.column
    }

    /// Back to letters mode at the left margin.
    pub fn reset(&mut self) {
        self.shift = Shift::Letters;
        self.column = 0;
    }

    /// Carriage return handled by the caller outside `encode_char`.
    pub fn reset_column(&mut self) {
        self.column = 0;
    }

    pub fn encode_char(&mut self, c: char) -> Encoded {
        let mut codes = encode(c, &mut self.shift);
        let mut line_wrapped = false;

        if is_printable(c) {
            self.column += 1;
            if c == '\n' || c == '\r' {
                self.column = 0;
            }
        }

        if self.column >= self.column_limit {
            codes.extend_from_slice(&[CR, LF, CR]);
            self.column = 0;
            line_wrapped = true;
        }

        Encoded { codes, line_wrapped }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::COLUMN_LIMIT;

    fn decode_letter(code: u8) -> Option<char> {
        (code <= LETTER_Z).then(|| (b'A' + code) as char)
    }

    fn count_shifts(codes: &[u8]) -> usize {
        codes.iter().filter(|&&c| c == FIGS || c == LTRS).count()
    }

    #[test]
    fn test_letter_roundtrip() {
        for c in ('a'..='z').chain('A'..='Z') {
            let mut shift = Shift::Letters;
            let codes = encode(c, &mut shift);
            assert_eq!(codes.len(), 1);
            assert_eq!(decode_letter(codes[0]), Some(c.to_ascii_uppercase()));
        }
    }

    #[test]
    fn test_no_redundant_shifts() {
        let mut shift = Shift::Letters;
        let codes: Vec<u8> = "RYRYRY".chars().flat_map(|c| encode(c, &mut shift)).collect();
        assert_eq!(count_shifts(&codes), 0);

        let mut shift = Shift::Letters;
        let codes: Vec<u8> = "123-456".chars().flat_map(|c| encode(c, &mut shift)).collect();
        assert_eq!(count_shifts(&codes), 1);
        assert_eq!(codes[0], FIGS);
    }

    #[test]
    fn test_one_shift_per_transition() {
        let mut shift = Shift::Letters;
        let codes: Vec<u8> = "AB12CD3E".chars().flat_map(|c| encode(c, &mut shift)).collect();
        assert_eq!(count_shifts(&codes), 4);
        assert_eq!(shift, Shift::Letters);
    }

    #[test]
    fn test_space_keeps_shift() {
        let mut shift = Shift::Figures;
        assert_eq!(encode(' ', &mut shift), vec![SPACE]);
        assert_eq!(shift, Shift::Figures);
    }

    #[test]
    fn test_digit_after_letter() {
        let mut shift = Shift::Letters;
        encode('K', &mut shift);
        assert_eq!(encode('5', &mut shift), vec![FIGS, 19]);
        assert_eq!(encode('5', &mut shift), vec![19]);
    }

    #[test]
    fn test_punctuation_and_newline() {
        let mut shift = Shift::Letters;
        assert_eq!(encode('?', &mut shift), vec![FIGS, QUESTION]);
        assert_eq!(encode('`', &mut shift), vec![APOSTROPHE]);
        assert_eq!(encode('\n', &mut shift), vec![CR, LF]);
        assert_eq!(encode('a', &mut shift), vec![LTRS, 0]);
    }

    #[test]
    fn test_raw_codes_and_unmapped() {
        let mut shift = Shift::Letters;
        assert_eq!(encode(char::from(CLOSED), &mut shift), vec![CLOSED]);
        assert_eq!(encode(char::from(LTRS), &mut shift), vec![LTRS]);
        assert_eq!(encode('@', &mut shift), vec![NULL]);
        assert_eq!(encode('é', &mut shift), vec![NULL]);
        assert_eq!(shift, Shift::Letters);
    }

    #[test]
    fn test_column_wrap() {
        let mut encoder = BaudotEncoder::new(COLUMN_LIMIT);
        let mut codes = Vec::new();
        let mut wraps = 0;
        for _ in 0..77 {
            let encoded = encoder.encode_char('E');
            wraps += encoded.line_wrapped as usize;
            codes.extend(encoded.codes);
            if encoded.line_wrapped {
                assert_eq!(encoder.column(), 0);
            }
        }
        assert_eq!(wraps, 1);
        assert_eq!(codes.windows(3).filter(|w| *w == [CR, LF, CR]).count(), 1);
        assert_eq!(encoder.column(), 1);
    }

    #[test]
    fn test_newline_resets_column() {
        let mut encoder = BaudotEncoder::new(COLUMN_LIMIT);
        for c in "HELLO\nAB".chars() {
            encoder.encode_char(c);
        }
        assert_eq!(encoder.column(), 2);
    }

    #[test]
    fn test_frame_bits() {
        let a = frame_bits(LETTER_A).unwrap();
        assert_eq!(a, [false, true, true, false, false, false, true, true]);
        assert_eq!(frame_bits(CLOSED).unwrap(), [true; 8]);
        assert_eq!(frame_bits(OPEN).unwrap(), [false; 8]);
        assert!(frame_bits(34).is_none());

        for code in 0..OPEN {
            let bits = frame_bits(code).unwrap();
            assert!(!bits[0], "start bit of {}", code);
            assert!(bits[6] && bits[7], "stop bits of {}", code);
        }
    }
}
