/// GST arithmetic and document numbering
///
/// All amounts are integer paise. Tax is computed per line and summed, with
/// half-up rounding to the paisa. Intra-state supplies split the tax into
/// equal CGST and SGST halves (each rounded on its own); inter-state
/// supplies carry the whole tax as IGST.
///
/// # Example
///
/// ```
/// use bizacc_shared::gst::{compute_line, GstRate, SupplyType};
///
/// let rate = GstRate::new(18).unwrap();
/// let tax = compute_line(100_000, rate, SupplyType::IntraState);
/// assert_eq!(tax.cgst_paise, 9_000);
/// assert_eq!(tax.sgst_paise, 9_000);
/// assert_eq!(tax.total_paise(), 118_000);
/// ```

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Standard GST slabs in percent
pub const GST_SLABS: [u8; 5] = [0, 5, 12, 18, 28];

const GSTIN_CHARSET: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GstError {
    #[error("{0}% is not a GST slab")]
    InvalidRate(u8),

    #[error("GSTIN must be 15 characters, got {0}")]
    GstinLength(usize),

    #[error("GSTIN has an invalid format")]
    GstinFormat,

    #[error("GSTIN state code {0} is not valid")]
    GstinStateCode(String),

    #[error("GSTIN check digit mismatch: expected {expected}, found {found}")]
    GstinChecksum { expected: char, found: char },
}

/// A GST rate restricted to the standard slabs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct GstRate(u8);

impl GstRate {
    pub fn new(percent: u8) -> Result<Self, GstError> {
        if GST_SLABS.contains(&percent) {
            Ok(Self(percent))
        } else {
            Err(GstError::InvalidRate(percent))
        }
    }

    pub fn percent(&self) -> u8 {
        self.0
    }
}

impl Default for GstRate {
    fn default() -> Self {
        Self(18)
    }
}

impl TryFrom<u8> for GstRate {
    type Error = GstError;

    fn try_from(percent: u8) -> Result<Self, Self::Error> {
        Self::new(percent)
    }
}

impl From<GstRate> for u8 {
    fn from(rate: GstRate) -> u8 {
        rate.0
    }
}

/// Whether supplier and place of supply are in the same state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupplyType {
    IntraState,
    InterState,
}

impl SupplyType {
    /// Classifies a supply by state codes (e.g. `"27"` for Maharashtra)
    ///
    /// An unknown place of supply is treated as intra-state.
    pub fn between(supplier_state: &str, place_of_supply: Option<&str>) -> Self {
        match place_of_supply {
            Some(place) if !place.is_empty() && place != supplier_state => SupplyType::InterState,
            _ => SupplyType::IntraState,
        }
    }
}

/// Tax on one taxable amount
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxBreakdown {
    pub taxable_paise: i64,
    pub cgst_paise: i64,
    pub sgst_paise: i64,
    pub igst_paise: i64,
}

impl TaxBreakdown {
    pub fn tax_paise(&self) -> i64 {
        self.cgst_paise + self.sgst_paise + self.igst_paise
    }

    pub fn total_paise(&self) -> i64 {
        self.taxable_paise + self.tax_paise()
    }
}

impl std::ops::Add for TaxBreakdown {
    type Output = TaxBreakdown;

    fn add(self, other: TaxBreakdown) -> TaxBreakdown {
        TaxBreakdown {
            taxable_paise: self.taxable_paise + other.taxable_paise,
            cgst_paise: self.cgst_paise + other.cgst_paise,
            sgst_paise: self.sgst_paise + other.sgst_paise,
            igst_paise: self.igst_paise + other.igst_paise,
        }
    }
}

impl std::iter::Sum for TaxBreakdown {
    fn sum<I: Iterator<Item = TaxBreakdown>>(iter: I) -> Self {
        iter.fold(TaxBreakdown::default(), |acc, t| acc + t)
    }
}

/// Tax on one line
pub fn compute_line(taxable_paise: i64, rate: GstRate, supply: SupplyType) -> TaxBreakdown {
    let rate = i64::from(rate.percent());

    match supply {
        SupplyType::IntraState => {
            let half = div_round_half_up(taxable_paise * rate, 200);
            TaxBreakdown {
                taxable_paise,
                cgst_paise: half,
                sgst_paise: half,
                igst_paise: 0,
            }
        }
        SupplyType::InterState => TaxBreakdown {
            taxable_paise,
            cgst_paise: 0,
            sgst_paise: 0,
            igst_paise: div_round_half_up(taxable_paise * rate, 100),
        },
    }
}

/// `numerator / denominator` rounded half away from zero
fn div_round_half_up(numerator: i64, denominator: i64) -> i64 {
    let magnitude = (numerator.abs() * 2 + denominator) / (denominator * 2);
    if numerator < 0 {
        -magnitude
    } else {
        magnitude
    }
}

/// Validates a GSTIN: state code, PAN, entity number, `Z`, check character
pub fn validate_gstin(gstin: &str) -> Result<(), GstError> {
    let bytes = gstin.as_bytes();
    if bytes.len() != 15 {
        return Err(GstError::GstinLength(gstin.chars().count()));
    }

    let well_formed = bytes[..2].iter().all(u8::is_ascii_digit)
        && bytes[2..7].iter().all(u8::is_ascii_uppercase)
        && bytes[7..11].iter().all(u8::is_ascii_digit)
        && bytes[11].is_ascii_uppercase()
        && (bytes[12].is_ascii_digit() || bytes[12].is_ascii_uppercase())
        && bytes[13] == b'Z'
        && (bytes[14].is_ascii_digit() || bytes[14].is_ascii_uppercase());
    if !well_formed {
        return Err(GstError::GstinFormat);
    }

    let state = &gstin[..2];
    match state.parse::<u8>() {
        Ok(code) if (1..=38).contains(&code) || code == 97 => {}
        _ => return Err(GstError::GstinStateCode(state.to_string())),
    }

    let expected = gstin_check_char(&gstin[..14]).ok_or(GstError::GstinFormat)?;
    let found = bytes[14] as char;
    if expected != found {
        return Err(GstError::GstinChecksum { expected, found });
    }

    Ok(())
}

/// Check character for the first 14 characters of a GSTIN
pub fn gstin_check_char(body: &str) -> Option<char> {
    let mut sum = 0u32;
    for (i, byte) in body.bytes().enumerate() {
        let value = GSTIN_CHARSET.iter().position(|c| *c == byte)? as u32;
        let product = value * if i % 2 == 0 { 1 } else { 2 };
        sum += product / 36 + product % 36;
    }
    let check = (36 - sum % 36) % 36;
    Some(GSTIN_CHARSET[check as usize] as char)
}

/// State code prefix of a GSTIN
pub fn state_code(gstin: &str) -> Option<&str> {
    gstin.get(..2)
}

/// Prefixes of sequentially numbered documents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberSeries {
    Invoice,
    Quotation,
}

impl NumberSeries {
    pub fn prefix(&self) -> &'static str {
        match self {
            NumberSeries::Invoice => "INV",
            NumberSeries::Quotation => "QUO",
        }
    }

    /// Next number after the highest one already issued
    ///
    /// Numbers from other series or in other formats are ignored.
    pub fn next<'a>(&self, issued: impl IntoIterator<Item = &'a str>) -> String {
        let prefix = format!("{}-", self.prefix());
        let highest = issued
            .into_iter()
            .filter_map(|n| n.strip_prefix(prefix.as_str()))
            .filter_map(|n| n.parse::<u32>().ok())
            .max()
            .unwrap_or(0);

        format!("{}{:04}", prefix, highest + 1)
    }
}

impl fmt::Display for NumberSeries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_must_be_a_slab() {
        for slab in GST_SLABS {
            assert!(GstRate::new(slab).is_ok());
        }
        assert_eq!(GstRate::new(15), Err(GstError::InvalidRate(15)));
        assert!(serde_json::from_str::<GstRate>("7").is_err());
        assert_eq!(serde_json::from_str::<GstRate>("28").unwrap().percent(), 28);
    }

    #[test]
    fn test_intra_state_splits_tax() {
        let tax = compute_line(12_345, GstRate::new(5).unwrap(), SupplyType::IntraState);
        // 12345 * 2.5% = 308.625 → 309 each
        assert_eq!(tax.cgst_paise, 309);
        assert_eq!(tax.sgst_paise, 309);
        assert_eq!(tax.igst_paise, 0);
        assert_eq!(tax.total_paise(), 12_345 + 618);
    }

    #[test]
    fn test_inter_state_uses_igst() {
        let tax = compute_line(12_345, GstRate::new(5).unwrap(), SupplyType::InterState);
        // 617.25 → 617
        assert_eq!(tax.igst_paise, 617);
        assert_eq!(tax.cgst_paise + tax.sgst_paise, 0);
    }

    #[test]
    fn test_rounding_is_half_up() {
        assert_eq!(div_round_half_up(5, 10), 1);
        assert_eq!(div_round_half_up(4, 10), 0);
        assert_eq!(div_round_half_up(-5, 10), -1);
        assert_eq!(div_round_half_up(15, 10), 2);
    }

    #[test]
    fn test_breakdowns_sum() {
        let rate = GstRate::new(18).unwrap();
        let total: TaxBreakdown = [10_000, 20_000]
            .into_iter()
            .map(|amount| compute_line(amount, rate, SupplyType::IntraState))
            .sum();
        assert_eq!(total.taxable_paise, 30_000);
        assert_eq!(total.tax_paise(), 5_400);
    }

    #[test]
    fn test_supply_type_between_states() {
        assert_eq!(SupplyType::between("27", Some("27")), SupplyType::IntraState);
        assert_eq!(SupplyType::between("27", Some("29")), SupplyType::InterState);
        assert_eq!(SupplyType::between("27", None), SupplyType::IntraState);
    }

    #[test]
    fn test_valid_gstins() {
        assert_eq!(validate_gstin("27AAPFU0939F1ZV"), Ok(()));
        assert_eq!(validate_gstin("29AAGCB7383J1Z4"), Ok(()));
        assert_eq!(state_code("29AAGCB7383J1Z4"), Some("29"));
    }

    #[test]
    fn test_invalid_gstins() {
        assert_eq!(validate_gstin("27AAPFU0939F1Z"), Err(GstError::GstinLength(14)));
        assert_eq!(validate_gstin("27aapfu0939F1ZV"), Err(GstError::GstinFormat));
        assert_eq!(
            validate_gstin("99AAPFU0939F1ZV"),
            Err(GstError::GstinStateCode("99".to_string()))
        );
        assert_eq!(
            validate_gstin("27AAPFU0939F1ZA"),
            Err(GstError::GstinChecksum {
                expected: 'V',
                found: 'A'
            })
        );
    }

    #[test]
    fn test_document_numbering() {
        assert_eq!(NumberSeries::Invoice.next(std::iter::empty()), "INV-0001");
        assert_eq!(
            NumberSeries::Invoice.next(["INV-0002", "INV-0010", "QUO-0099", "legacy"]),
            "INV-0011"
        );
        assert_eq!(NumberSeries::Quotation.next(["QUO-0099"]), "QUO-0100");
    }
}
