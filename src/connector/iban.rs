// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! IBAN validation (ISO 13616): country length and mod-97 checksum.

/// Registered IBAN length per country code.
#[rustfmt::skip]
const IBAN_LENGTHS: &[(&str, usize)] = &[
    ("AD", 24), ("AE", 23), ("AL", 28), ("AT", 20), ("AZ", 28), ("BA", 20),
    ("BE", 16), ("BG", 22), ("BH", 22), ("BR", 29), ("BY", 28), ("CH", 21),
    ("CR", 22), ("CY", 28), ("CZ", 24), ("DE", 22), ("DK", 18), ("DO", 28),
    ("EE", 20), ("EG", 29), ("ES", 24), ("FI", 18), ("FO", 18), ("FR", 27),
    ("GB", 22), ("GE", 22), ("GI", 23), ("GL", 18), ("GR", 27), ("GT", 28),
    ("HR", 21), ("HU", 28), ("IE", 22), ("IL", 23), ("IQ", 23), ("IS", 26),
    ("IT", 27), ("JO", 30), ("KW", 30), ("KZ", 20), ("LB", 28), ("LC", 32),
    ("LI", 21), ("LT", 20), ("LU", 20), ("LV", 21), ("MC", 27), ("MD", 24),
    ("ME", 22), ("MK", 19), ("MR", 27), ("MT", 31), ("MU", 30), ("NL", 18),
    ("NO", 15), ("PK", 24), ("PL", 28), ("PS", 29), ("PT", 25), ("QA", 29),
    ("RO", 24), ("RS", 22), ("SA", 24), ("SC", 31), ("SE", 24), ("SI", 19),
    ("SK", 24), ("SM", 27), ("ST", 25), ("SV", 28), ("TL", 23), ("TN", 24),
    ("TR", 26), ("UA", 29), ("VA", 22), ("VG", 24), ("XK", 20),
];

fn expected_length(country: &str) -> Option<usize> {
    IBAN_LENGTHS
        .iter()
        .find(|(code, _)| *code == country)
        .map(|(_, len)| *len)
}

/// Electronic form of an IBAN: no whitespace, upper case.
pub fn normalize(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Whether `raw` is a well-formed IBAN with a correct checksum.
///
/// Checked in its [`normalize`]d form.
pub fn is_valid(raw: &str) -> bool {
    let iban = normalize(raw);

    if iban.len() < 5 || !iban.chars().all(|c| c.is_ascii_alphanumeric()) {
        return false;
    }
    let (country, rest) = iban.split_at(2);
    if !country.chars().all(|c| c.is_ascii_alphabetic())
        || !rest[..2].chars().all(|c| c.is_ascii_digit())
    {
        return false;
    }
    if expected_length(country) != Some(iban.len()) {
        return false;
    }

    mod97(rest[2..].chars().chain(country.chars()).chain(rest[..2].chars())) == 1
}

/// Remainder mod 97 of the number formed by replacing letters with 10..35.
fn mod97(chars: impl Iterator<Item = char>) -> u32 {
    chars.fold(0u32, |acc, c| match c.to_digit(36) {
        Some(v) if v >= 10 => (acc * 100 + v) % 97,
        Some(v) => (acc * 10 + v) % 97,
        None => acc,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_yields_electronic_form() {
        assert_eq!(normalize("de89 3704 0044\t0532 0130 00"), "DE89370400440532013000");
        assert_eq!(normalize("DE89370400440532013000"), "DE89370400440532013000");
    }

    #[test]
    fn accepts_valid_ibans() {
        for iban in [
            "DE49500105178844289951",
            "DE89370400440532013000",
            "GB82WEST12345698765432",
            "FR1420041010050500013M02606",
            "NL91ABNA0417164300",
        ] {
            assert!(is_valid(iban), "{iban} should be valid");
        }
    }

    #[test]
    fn tolerates_spaces_and_lowercase() {
        assert!(is_valid("DE89 3704 0044 0532 0130 00"));
        assert!(is_valid("gb82west12345698765432"));
    }

    #[test]
    fn rejects_bad_checksum() {
        assert!(!is_valid("DE10010000000111106136"));
        assert!(!is_valid("DE10010000000000006136"));
        assert!(!is_valid("DE49500105178844289952"));
    }

    #[test]
    fn rejects_wrong_length_or_shape() {
        assert!(!is_valid("DE100100000001111"));
        assert!(!is_valid("DE4950010517884428995"));
        assert!(!is_valid("1234"));
        assert!(!is_valid(""));
        assert!(!is_valid("ZZ49500105178844289951"));
        assert!(!is_valid("DE49-500105178844289951"));
        assert!(!is_valid("DEXX500105178844289951"));
    }
}
