//! Mobile country code lookups used when deriving the home operator.

/// `(mcc, iso country, smallest MNC digit count)`
#[rustfmt::skip]
const MCC_TABLE: &[(u16, &str, u8)] = &[
    (202, "gr", 2), (204, "nl", 2), (206, "be", 2), (208, "fr", 2), (212, "mc", 2),
    (213, "ad", 2), (214, "es", 2), (216, "hu", 2), (218, "ba", 2), (219, "hr", 2),
    (220, "rs", 2), (222, "it", 2), (225, "va", 2), (226, "ro", 2), (228, "ch", 2),
    (230, "cz", 2), (231, "sk", 2), (232, "at", 2), (234, "gb", 2), (235, "gb", 2),
    (238, "dk", 2), (240, "se", 2), (242, "no", 2), (244, "fi", 2), (246, "lt", 2),
    (247, "lv", 2), (248, "ee", 2), (250, "ru", 2), (255, "ua", 2), (257, "by", 2),
    (259, "md", 2), (260, "pl", 2), (262, "de", 2), (266, "gi", 2), (268, "pt", 2),
    (270, "lu", 2), (272, "ie", 2), (274, "is", 2), (276, "al", 2), (278, "mt", 2),
    (280, "cy", 2), (282, "ge", 2), (283, "am", 2), (284, "bg", 2), (286, "tr", 2),
    (288, "fo", 2), (290, "gl", 2), (292, "sm", 2), (293, "si", 2), (294, "mk", 2),
    (295, "li", 2), (297, "me", 2),
    (302, "ca", 3), (308, "pm", 2),
    (310, "us", 3), (311, "us", 3), (312, "us", 3), (313, "us", 3), (314, "us", 3),
    (315, "us", 3), (316, "us", 3),
    (330, "pr", 2), (334, "mx", 3), (338, "jm", 3), (340, "gp", 2), (342, "bb", 3),
    (344, "ag", 3), (346, "ky", 3), (348, "vg", 3), (350, "bm", 2), (352, "gd", 2),
    (354, "ms", 3), (356, "kn", 3), (358, "lc", 3), (360, "vc", 3), (362, "cw", 2),
    (363, "aw", 2), (364, "bs", 2), (365, "ai", 3), (366, "dm", 2), (368, "cu", 2),
    (370, "do", 2), (372, "ht", 2), (374, "tt", 2), (376, "tc", 3),
    (400, "az", 2), (401, "kz", 2), (404, "in", 2), (405, "in", 3), (410, "pk", 2),
    (412, "af", 2), (413, "lk", 2), (414, "mm", 2), (415, "lb", 2), (416, "jo", 2),
    (417, "sy", 2), (418, "iq", 2), (419, "kw", 2), (420, "sa", 2), (421, "ye", 2),
    (422, "om", 2), (424, "ae", 2), (425, "il", 2), (426, "bh", 2), (427, "qa", 2),
    (428, "mn", 2), (429, "np", 2), (432, "ir", 2), (434, "uz", 2), (436, "tj", 2),
    (437, "kg", 2), (438, "tm", 2), (440, "jp", 2), (441, "jp", 2), (450, "kr", 2),
    (452, "vn", 2), (454, "hk", 2), (455, "mo", 2), (456, "kh", 2), (457, "la", 2),
    (460, "cn", 2), (466, "tw", 2), (470, "bd", 2), (472, "mv", 2),
    (502, "my", 2), (505, "au", 2), (510, "id", 2), (515, "ph", 2), (520, "th", 2),
    (525, "sg", 2), (528, "bn", 2), (530, "nz", 2),
    (602, "eg", 2), (603, "dz", 2), (604, "ma", 2), (605, "tn", 2), (606, "ly", 2),
    (608, "sn", 2), (612, "ci", 2), (620, "gh", 2), (621, "ng", 2), (639, "ke", 2),
    (640, "tz", 2), (641, "ug", 2), (655, "za", 2),
    (702, "bz", 2), (704, "gt", 2), (706, "sv", 2), (708, "hn", 3), (710, "ni", 2),
    (712, "cr", 2), (714, "pa", 2), (716, "pe", 2), (722, "ar", 3), (724, "br", 2),
    (730, "cl", 2), (732, "co", 3), (734, "ve", 2), (736, "bo", 2), (740, "ec", 2),
    (744, "py", 2), (748, "uy", 2),
];

fn lookup(mcc: u16) -> Option<&'static (u16, &'static str, u8)> {
    MCC_TABLE
        .binary_search_by_key(&mcc, |(code, _, _)| *code)
        .ok()
        .map(|i| &MCC_TABLE[i])
}

/// ISO 3166 alpha-2 country code for `mcc`.
pub fn iso_country(mcc: u16) -> Option<&'static str> {
    lookup(mcc).map(|(_, iso, _)| *iso)
}

/// Smallest MNC digit count used in `mcc`; 2 when the country is unknown.
pub fn smallest_mnc_digits(mcc: u16) -> u8 {
    lookup(mcc).map(|(_, _, digits)| *digits).unwrap_or(2)
}

/// MCC of a subscriber id or operator code.
pub fn parse_mcc(digits: &str) -> Option<u16> {
    digits.get(..3)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_sorted() {
        assert!(MCC_TABLE.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn test_lookups() {
        assert_eq!(iso_country(310), Some("us"));
        assert_eq!(smallest_mnc_digits(310), 3);
        assert_eq!(iso_country(234), Some("gb"));
        assert_eq!(smallest_mnc_digits(234), 2);
        assert_eq!(iso_country(999), None);
        assert_eq!(smallest_mnc_digits(999), 2);
    }

    #[test]
    fn test_parse_mcc() {
        assert_eq!(parse_mcc("310260123"), Some(310));
        assert_eq!(parse_mcc("31"), None);
        assert_eq!(parse_mcc("ab0"), None);
    }
}
