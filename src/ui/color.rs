/// Accepts "#rgb", "#rgba", "#rrggbb", "#rrggbbaa" (or without '#').
/// Panics on invalid input; use only with trusted literals.
/// Evaluated at compile time when assigned to a const.
pub const fn rgba_hex(s: &str) -> [f32; 4] {
    let bytes = s.as_bytes();

    let (bytes, len) = if !bytes.is_empty() && bytes[0] == b'#' {
        let (_, rem) = bytes.split_at(1);
        (rem, s.len() - 1)
    } else {
        (bytes, s.len())
    };

    const fn val(b: u8) -> u8 {
        match b {
            b'0'..=b'9' => b - b'0',
            b'a'..=b'f' => 10 + (b - b'a'),
            b'A'..=b'F' => 10 + (b - b'A'),
            _ => panic!("invalid hex digit in color string"),
        }
    }

    const fn byte2(h: u8, l: u8) -> u8 {
        (val(h) << 4) | val(l)
    }

    // F -> FF
    const fn rep(n: u8) -> u8 {
        (val(n) << 4) | val(n)
    }

    let (r, g, b, a) = match len {
        3 => (rep(bytes[0]), rep(bytes[1]), rep(bytes[2]), 0xFF),
        4 => (rep(bytes[0]), rep(bytes[1]), rep(bytes[2]), rep(bytes[3])),
        6 => (
            byte2(bytes[0], bytes[1]),
            byte2(bytes[2], bytes[3]),
            byte2(bytes[4], bytes[5]),
            0xFF,
        ),
        8 => (
            byte2(bytes[0], bytes[1]),
            byte2(bytes[2], bytes[3]),
            byte2(bytes[4], bytes[5]),
            byte2(bytes[6], bytes[7]),
        ),
        _ => panic!("color hex string must be 3, 4, 6, or 8 digits"),
    };

    [
        r as f32 / 255.0,
        g as f32 / 255.0,
        b as f32 / 255.0,
        a as f32 / 255.0,
    ]
}

#[macro_export]
macro_rules! rgba_const {
    ($vis:vis $name:ident, $hex:literal $(,)?) => {
        $vis const $name: [f32; 4] = $crate::ui::color::rgba_hex($hex);
    };
}

/* =========================== STAGE PALETTE =========================== */

rgba_const!(pub LANE_BG, "#1E1E1E");
rgba_const!(pub HIT_LINE, "#FFFFFF");
rgba_const!(pub NOTE, "#FFFFFF");
rgba_const!(pub SCORE_TEXT, "#FFFFFF");

rgba_const!(pub JUDGE_PERFECT, "#FF64FF");
rgba_const!(pub JUDGE_GREAT, "#FFFF64");
rgba_const!(pub JUDGE_GOOD, "#64FFFF");
rgba_const!(pub JUDGE_BAD, "#64FF64");
rgba_const!(pub JUDGE_MISS, "#FF6464");

#[cfg(test)]
mod tests {
    use super::rgba_hex;

    #[test]
    fn short_and_long_forms_agree() {
        assert_eq!(rgba_hex("#fff"), rgba_hex("FFFFFFFF"));
        assert_eq!(rgba_hex("#1E1E1E")[3], 1.0);
        let c = rgba_hex("#FF6464");
        assert!((c[1] - 100.0 / 255.0).abs() < 1e-6, "got {c:?}");
    }
}
